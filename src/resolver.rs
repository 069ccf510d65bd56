//! §4.6 TrustChainResolver — composes the collector, verifier, and policy
//! engine into the `resolve(entity_id, entity_type)` operation callers
//! actually want.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crate::cache::TtlCache;
use crate::clock::now_unix;
use crate::collector::ChainCollector;
use crate::config::FederationConfig;
use crate::error::Error;
use crate::fetch::StatementFetcher;
use crate::http_client::HttpClient;
use crate::keystore::KeyStore;
use crate::model::EffectiveMetadata;
use crate::model::EntityId;
use crate::model::EntityType;
use crate::model::VerifiedChain;
use crate::policy::PolicyEngine;
use crate::verifier::ChainVerifier;

/// The result of a successful `resolve()` call (§4.6).
#[derive(Debug, Clone)]
pub struct ResolvedTrustChain {
    pub chain: VerifiedChain,
    pub effective_metadata: EffectiveMetadata,
    pub exp: i64,
}

/// Selects one verified chain among several survivors, per the priority
/// rule in §4.6.
fn select_chain(chains: Vec<VerifiedChain>, priority: Option<&[EntityId]>) -> VerifiedChain {
    if let Some(priority) = priority {
        for candidate_anchor in priority {
            if let Some(pos) = chains.iter().position(|c| &c.anchor == candidate_anchor) {
                return chains.into_iter().nth(pos).unwrap();
            }
        }
    }

    if chains.len() == 1 {
        return chains.into_iter().next().unwrap();
    }

    chains
        .into_iter()
        .min_by(|a, b| a.anchor.cmp(&b.anchor))
        .expect("caller guarantees at least one verified chain")
}

type FetchKey = (EntityId, EntityId);
type ResolveKey = (EntityId, EntityType);

/// The composed, user-facing trust-chain resolution service.
pub struct TrustChainResolver {
    config: FederationConfig,
    keystore: KeyStore,
    fetcher: Arc<StatementFetcher>,
    fetch_cache: TtlCache<FetchKey, String>,
    resolve_cache: TtlCache<ResolveKey, ResolvedTrustChain>,
}

impl TrustChainResolver {
    pub fn new(config: FederationConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let keystore = KeyStore::new(config.trust_anchors());
        let fetcher = Arc::new(StatementFetcher::new(http_client, config.http_timeout()));

        Self {
            config,
            keystore,
            fetcher,
            fetch_cache: TtlCache::new(),
            resolve_cache: TtlCache::new(),
        }
    }

    pub fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    pub fn fetcher(&self) -> &Arc<StatementFetcher> {
        &self.fetcher
    }

    pub fn fetch_cache(&self) -> &TtlCache<FetchKey, String> {
        &self.fetch_cache
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    /// Evict a cached resolution and the leaf's own cached configuration
    /// fetch, forcing the next `resolve()` call for `entity_id`/`entity_type`
    /// to re-walk the chain from scratch (§5: cache entries are "evicted by
    /// TTL or explicit invalidation") — for example after an out-of-band
    /// signal that an entity's statement changed before its `exp`.
    pub async fn invalidate(&self, entity_id: &str, entity_type: EntityType) {
        self.resolve_cache
            .invalidate(&(entity_id.to_string(), entity_type))
            .await;
        self.fetch_cache
            .invalidate(&(entity_id.to_string(), entity_id.to_string()))
            .await;
    }

    /// Resolve the effective metadata for `entity_id` as `entity_type`.
    ///
    /// `deadline`, if given, bounds the whole call (§5); on expiry, in-flight
    /// fetches are dropped and [`Error::Deadline`] is returned. No partial
    /// result is ever returned.
    pub async fn resolve(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        deadline: Option<Duration>,
    ) -> Result<ResolvedTrustChain, Error> {
        let work = self.resolve_inner(entity_id, entity_type);

        match deadline {
            Some(d) => tokio::time::timeout(d, work).await.map_err(|_| Error::Deadline)?,
            None => work.await,
        }
    }

    async fn resolve_inner(
        &self,
        entity_id: &str,
        entity_type: EntityType,
    ) -> Result<ResolvedTrustChain, Error> {
        let key = (entity_id.to_string(), entity_type);
        let priority = self.config.priority();

        self.resolve_cache
            .get_or_populate(key, || async move {
                let collector = ChainCollector::new(
                    self.fetcher.clone(),
                    &self.keystore,
                    &self.fetch_cache,
                    self.config.max_chain_depth(),
                    self.config.allowed_delta(),
                );

                let candidates = collector.collect(entity_id).await?;

                let verifier = ChainVerifier::new(&self.keystore, self.config.allowed_delta());
                let mut verified = Vec::new();
                for candidate in &candidates {
                    match verifier.verify(candidate).await {
                        Ok(chain) => verified.push(chain),
                        Err(e) => {
                            tracing::debug!(entity_id, error = %e, "candidate chain failed verification, discarding");
                        }
                    }
                }

                if verified.is_empty() {
                    return Err(Error::NoTrustPath);
                }

                let chosen = select_chain(verified, priority);
                let effective_metadata = PolicyEngine::apply(&chosen, entity_type)?;

                let exp = chosen.exp;
                let remaining = (exp - now_unix()).max(0) as u64;
                let expires_at = Instant::now() + Duration::from_secs(remaining);

                let result = ResolvedTrustChain {
                    chain: chosen,
                    effective_metadata,
                    exp,
                };

                Ok((result, expires_at))
            })
            .await
    }
}
