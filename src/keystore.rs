//! §4.1 KeyStore — maps an issuer entity id to its current set of
//! verification keys.
//!
//! Trust anchors are loaded once at construction and are never mutated
//! (§3, "Anchors' keys are never sourced from chain content"). Every other
//! issuer's keys are acquired only as a side effect of a statement about it
//! verifying successfully one level up the chain (§4.4); imports are
//! additive and idempotent, and are serialized per issuer via a small
//! per-entry lock rather than a single store-wide write lock, so that
//! concurrent chain walks through unrelated issuers do not contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::error::Error;
use crate::model::EntityId;
use crate::model::Jwk;
use crate::model::Jwks;
use crate::model::KeySet;
use crate::model::TrustAnchor;

/// Shared, thread-safe key storage for all issuers seen during resolution.
#[derive(Debug)]
pub struct KeyStore {
    /// Configured at startup, immutable thereafter.
    anchors: HashMap<EntityId, KeySet>,
    /// Keys acquired from verified statements, grown additively.
    acquired: RwLock<HashMap<EntityId, Arc<Mutex<KeySet>>>>,
}

impl KeyStore {
    /// Build a key store seeded with the configured trust anchors.
    pub fn new(trust_anchors: &[TrustAnchor]) -> Self {
        let mut anchors = HashMap::new();
        for anchor in trust_anchors {
            let mut set = KeySet::new();
            set.merge(&anchor.jwks);
            anchors.insert(anchor.entity_id.clone(), set);
        }

        Self {
            anchors,
            acquired: RwLock::new(HashMap::new()),
        }
    }

    /// `true` if `entity_id` is a configured trust anchor.
    pub fn is_anchor(&self, entity_id: &str) -> bool {
        self.anchors.contains_key(entity_id)
    }

    /// The current key set known for `issuer`, or [`Error::UnknownIssuer`]
    /// if none has been configured or acquired yet.
    pub async fn keys_for(&self, issuer: &str) -> Result<KeySet, Error> {
        if let Some(set) = self.anchors.get(issuer) {
            return Ok(set.clone());
        }

        let acquired = self.acquired.read().await;
        match acquired.get(issuer) {
            Some(entry) => Ok(entry.lock().await.clone()),
            None => Err(Error::UnknownIssuer {
                issuer: issuer.to_string(),
            }),
        }
    }

    /// Additively merge `jwks` into the key set known for `issuer`.
    /// Returns the keys that were newly added (empty on a pure repeat
    /// import, making imports idempotent per §5).
    pub async fn import_jwks(&self, issuer: &str, jwks: &Jwks) -> Vec<Jwk> {
        // Anchors never accept keys from chain content.
        if self.anchors.contains_key(issuer) {
            tracing::warn!(issuer, "refusing to import chain-sourced keys for a trust anchor");
            return Vec::new();
        }

        let entry = {
            let acquired = self.acquired.read().await;
            acquired.get(issuer).cloned()
        };

        let entry = match entry {
            Some(entry) => entry,
            None => {
                let mut acquired = self.acquired.write().await;
                acquired
                    .entry(issuer.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(KeySet::new())))
                    .clone()
            }
        };

        let mut set = entry.lock().await;
        let added = set.merge(jwks);
        if !added.is_empty() {
            tracing::debug!(issuer, added = added.len(), "imported new federation keys");
        }
        added
    }

    /// Select the candidate keys a JWS claiming `iss` with header `kid` could
    /// have been signed with.
    pub async fn verify_keys_for_jws(&self, iss: &str, kid: &str) -> Result<Vec<Jwk>, Error> {
        let set = self.keys_for(iss).await?;
        let keys: Vec<Jwk> = set.by_kid(kid).into_iter().cloned().collect();
        if keys.is_empty() {
            return Err(Error::NoCorrespondingKidInStore {
                issuer: iss.to_string(),
                kid: kid.to_string(),
            });
        }
        Ok(keys)
    }
}
