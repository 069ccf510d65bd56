//! Federation engine configuration (§6) and its builder.
//!
//! Loading these values from a config file, environment, or CLI flags is out
//! of scope (§1) and is the embedder's job; this only accepts already
//! -parsed Rust values. The builder follows the same consuming-`self`
//! accumulation pattern the teacher crate used for `KeyRegistryBuilder`,
//! minus the network I/O (anchor keys are supplied directly rather than
//! fetched, so `build()` here is infallible and synchronous), and the same
//! `Deref`/`DerefMut` escape hatch onto the field being accumulated — here
//! `trust_anchors`, the builder's one growing collection, in place of the
//! teacher's `uris` map.

use std::ops::Deref;
use std::ops::DerefMut;
use std::time::Duration;

use crate::model::EntityId;
use crate::model::Jwks;
use crate::model::TrustAnchor;

/// Default clock-skew tolerance (§6).
pub const DEFAULT_ALLOWED_DELTA: Duration = Duration::from_secs(300);
/// Default maximum chain walk depth (§6, §4.3).
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 10;
/// Default per-request HTTP timeout (§5).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// The configuration the trust-chain engine consumes.
#[derive(Debug, Clone)]
pub struct FederationConfig {
    pub(crate) trust_anchors: Vec<TrustAnchor>,
    pub(crate) priority: Option<Vec<EntityId>>,
    pub(crate) allowed_delta: Duration,
    pub(crate) max_chain_depth: usize,
    pub(crate) http_timeout: Duration,
}

impl FederationConfig {
    pub fn builder() -> FederationConfigBuilder {
        FederationConfigBuilder::default()
    }

    pub fn trust_anchors(&self) -> &[TrustAnchor] {
        &self.trust_anchors
    }

    pub fn priority(&self) -> Option<&[EntityId]> {
        self.priority.as_deref()
    }

    pub fn allowed_delta(&self) -> Duration {
        self.allowed_delta
    }

    pub fn max_chain_depth(&self) -> usize {
        self.max_chain_depth
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
}

/// Accumulates trust anchors and tuning knobs before producing an
/// immutable [`FederationConfig`].
///
/// Dereferences to the accumulating `trust_anchors` vector, mirroring the
/// teacher's `KeyRegistryBuilder` (`Deref`/`DerefMut` onto its `uris` map),
/// for callers who want direct access instead of going through
/// [`add_trust_anchor`](FederationConfigBuilder::add_trust_anchor).
pub struct FederationConfigBuilder {
    trust_anchors: Vec<TrustAnchor>,
    priority: Option<Vec<EntityId>>,
    allowed_delta: Duration,
    max_chain_depth: usize,
    http_timeout: Duration,
}

impl Deref for FederationConfigBuilder {
    type Target = Vec<TrustAnchor>;

    fn deref(&self) -> &Self::Target {
        &self.trust_anchors
    }
}

impl DerefMut for FederationConfigBuilder {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.trust_anchors
    }
}

impl Default for FederationConfigBuilder {
    fn default() -> Self {
        Self {
            trust_anchors: Vec::new(),
            priority: None,
            allowed_delta: DEFAULT_ALLOWED_DELTA,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl FederationConfigBuilder {
    /// Add a configured trust anchor. If an entry for this `entity_id`
    /// already exists, it is replaced.
    pub fn add_trust_anchor<I>(mut self, entity_id: I, jwks: Jwks) -> Self
    where
        EntityId: From<I>,
    {
        let entity_id = EntityId::from(entity_id);
        self.trust_anchors.retain(|a| a.entity_id != entity_id);
        self.trust_anchors.push(TrustAnchor { entity_id, jwks });
        self
    }

    /// Set the anchor priority list used by the resolver's tie-break rule
    /// (§4.6).
    pub fn priority(mut self, priority: Vec<EntityId>) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn allowed_delta(mut self, delta: Duration) -> Self {
        self.allowed_delta = delta;
        self
    }

    pub fn max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn build(self) -> FederationConfig {
        FederationConfig {
            trust_anchors: self.trust_anchors,
            priority: self.priority,
            allowed_delta: self.allowed_delta,
            max_chain_depth: self.max_chain_depth,
            http_timeout: self.http_timeout,
        }
    }
}
