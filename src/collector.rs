//! §4.3 ChainCollector — walks `authority_hints` and fetch endpoints to
//! assemble every candidate chain from a leaf entity to a configured trust
//! anchor.
//!
//! The recursion mirrors the design notes (§9): rather than the source's
//! dynamic `upstream_get`/`superior_get` callback, each step is parameterized
//! by the small set of capabilities it actually needs (a [`StatementFetcher`]
//! and a way to recognize anchors), and cycle protection is a `(iss, sub)`
//! visited-set cloned per branch rather than shared across siblings.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crate::cache::TtlCache;
use crate::clock::now_unix;
use crate::error::Error;
use crate::fetch::decode_unverified_payload;
use crate::fetch::federation_endpoint;
use crate::fetch::StatementFetcher;
use crate::keystore::KeyStore;
use crate::model::CandidateChain;
use crate::model::EntityId;

/// Cache entries are keyed by the `(iss, sub)` pair the fetch was for; a
/// fetch of an entity's own configuration is cached under `(id, id)`.
type FetchKey = (EntityId, EntityId);

/// Walks the federation graph, assembling candidate chains.
pub struct ChainCollector<'a> {
    fetcher: Arc<StatementFetcher>,
    keystore: &'a KeyStore,
    fetch_cache: &'a TtlCache<FetchKey, String>,
    max_depth: usize,
    allowed_delta: Duration,
}

impl<'a> ChainCollector<'a> {
    pub fn new(
        fetcher: Arc<StatementFetcher>,
        keystore: &'a KeyStore,
        fetch_cache: &'a TtlCache<FetchKey, String>,
        max_depth: usize,
        allowed_delta: Duration,
    ) -> Self {
        Self {
            fetcher,
            keystore,
            fetch_cache,
            max_depth,
            allowed_delta,
        }
    }

    fn expiry_for(&self, jws: &str) -> Instant {
        let remaining = decode_unverified_payload(jws)
            .map(|p| (p.exp - now_unix()).max(0) as u64)
            .unwrap_or(0);
        Instant::now() + Duration::from_secs(remaining) + self.allowed_delta
    }

    async fn fetch_configuration_cached(&self, entity_id: &str) -> Result<String, Error> {
        let key = (entity_id.to_string(), entity_id.to_string());
        let fetcher = self.fetcher.clone();
        let entity_id_owned = entity_id.to_string();
        self.fetch_cache
            .get_or_populate(key, || async move {
                let jws = fetcher.fetch_configuration(&entity_id_owned).await?;
                let expiry = self.expiry_for(&jws);
                Ok((jws, expiry))
            })
            .await
    }

    async fn fetch_statement_cached(
        &self,
        fetch_endpoint: &str,
        iss: &str,
        sub: &str,
    ) -> Result<String, Error> {
        let key = (iss.to_string(), sub.to_string());
        let fetcher = self.fetcher.clone();
        let (fetch_endpoint, iss_owned, sub_owned) =
            (fetch_endpoint.to_string(), iss.to_string(), sub.to_string());
        self.fetch_cache
            .get_or_populate(key, || async move {
                let jws = fetcher.fetch(&fetch_endpoint, &iss_owned, &sub_owned).await?;
                let expiry = self.expiry_for(&jws);
                Ok((jws, expiry))
            })
            .await
    }

    /// Collect every candidate chain from `leaf_id` to a configured trust
    /// anchor. Fails only if zero chains complete (§4.3's failure
    /// semantics): [`Error::MaxDepthExceeded`] if the only paths were pruned
    /// by the depth limit, [`Error::NoTrustPath`] otherwise. Individual
    /// branch failures are pruned and logged.
    pub async fn collect(&self, leaf_id: &str) -> Result<Vec<CandidateChain>, Error> {
        let leaf_jws = self.fetch_configuration_cached(leaf_id).await?;
        let leaf_payload = decode_unverified_payload(&leaf_jws)?;

        if self.keystore.is_anchor(leaf_id) {
            return Ok(vec![CandidateChain::new(vec![leaf_jws])]);
        }

        let hints = leaf_payload.authority_hints.clone().unwrap_or_default();
        if hints.is_empty() {
            tracing::warn!(leaf_id, "leaf has no authority_hints and is not a trust anchor");
            return Err(Error::NoTrustPath);
        }

        let mut visited = HashSet::new();
        let depth_exceeded = AtomicBool::new(false);
        let prefixes = self
            .collect_superior_statements(leaf_id, &hints, &mut visited, 1, &depth_exceeded)
            .await?;

        let chains: Vec<CandidateChain> = prefixes
            .into_iter()
            .map(|mut statements| {
                statements.push(leaf_jws.clone());
                CandidateChain::new(statements)
            })
            .collect();

        if chains.is_empty() {
            if depth_exceeded.load(Ordering::Relaxed) {
                Err(Error::MaxDepthExceeded)
            } else {
                Err(Error::NoTrustPath)
            }
        } else {
            Ok(chains)
        }
    }

    /// Returns every chain of statements vouching for `subject`
    /// (anchor-first), *not* including `subject`'s own self-signed
    /// configuration — the caller appends that itself.
    ///
    /// Recurses into itself one level per authority hop, so the future is
    /// boxed explicitly (a self-recursive `async fn` has no statically
    /// known size).
    fn collect_superior_statements<'b>(
        &'b self,
        subject: &'b str,
        hints: &'b [EntityId],
        visited: &'b mut HashSet<FetchKey>,
        depth: usize,
        depth_exceeded: &'b AtomicBool,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<String>>, Error>> + Send + 'b>> {
        Box::pin(async move {
        if depth > self.max_depth {
            tracing::warn!(subject, depth, "max_chain_depth exceeded, pruning branch");
            depth_exceeded.store(true, Ordering::Relaxed);
            return Ok(Vec::new());
        }

        let mut results = Vec::new();

        for hint in hints {
            let key = (hint.clone(), subject.to_string());
            if visited.contains(&key) {
                tracing::debug!(superior = %hint, subject, "cycle detected, pruning branch");
                continue;
            }
            visited.insert(key);

            let hint_config_jws = match self.fetch_configuration_cached(hint).await {
                Ok(jws) => jws,
                Err(e) => {
                    tracing::warn!(superior = %hint, error = %e, "failed to fetch authority configuration, pruning branch");
                    continue;
                }
            };

            let hint_payload = match decode_unverified_payload(&hint_config_jws) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(superior = %hint, error = %e, "malformed authority configuration, pruning branch");
                    continue;
                }
            };

            let fetch_endpoint = match federation_endpoint(&hint_payload, "federation_fetch_endpoint")
            {
                Some(endpoint) => endpoint,
                None => {
                    tracing::warn!(superior = %hint, "authority has no federation_fetch_endpoint, pruning branch");
                    continue;
                }
            };

            let statement_jws = match self.fetch_statement_cached(&fetch_endpoint, hint, subject).await
            {
                Ok(jws) => jws,
                Err(e) => {
                    tracing::warn!(superior = %hint, subject, error = %e, "failed to fetch statement, pruning branch");
                    continue;
                }
            };

            if self.keystore.is_anchor(hint) {
                results.push(vec![statement_jws]);
                continue;
            }

            let upstream_hints = hint_payload.authority_hints.clone().unwrap_or_default();
            if upstream_hints.is_empty() {
                tracing::debug!(superior = %hint, "dead end: not an anchor and no authority_hints");
                continue;
            }

            let mut branch_visited = visited.clone();
            let prefixes = self
                .collect_superior_statements(
                    hint,
                    &upstream_hints,
                    &mut branch_visited,
                    depth + 1,
                    depth_exceeded,
                )
                .await?;

            for mut prefix in prefixes {
                prefix.push(statement_jws.clone());
                results.push(prefix);
            }
        }

        Ok(results)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::TrustAnchor;
    use crate::test_support;

    fn keystore_with_anchor() -> KeyStore {
        KeyStore::new(&[TrustAnchor {
            entity_id: test_support::ANCHOR.to_string(),
            jwks: test_support::jwks(),
        }])
    }

    #[tokio::test]
    async fn collects_the_full_anchor_to_leaf_chain() {
        let client = test_support::three_tier_federation();
        let keystore = keystore_with_anchor();
        let fetch_cache = TtlCache::new();
        let fetcher = Arc::new(StatementFetcher::new(Arc::new(client), Duration::from_secs(5)));
        let collector = ChainCollector::new(fetcher, &keystore, &fetch_cache, 10, Duration::from_secs(300));

        let chains = collector.collect(test_support::RP).await.unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 3);
    }

    #[tokio::test]
    async fn leaf_with_no_authority_hints_has_no_trust_path() {
        let client = test_support::MockHttpClient::new().with_configuration(
            "https://orphan.example.com",
            &test_support::bare_statement("https://orphan.example.com", "https://orphan.example.com"),
        );
        let keystore = keystore_with_anchor();
        let fetch_cache = TtlCache::new();
        let fetcher = Arc::new(StatementFetcher::new(Arc::new(client), Duration::from_secs(5)));
        let collector = ChainCollector::new(fetcher, &keystore, &fetch_cache, 10, Duration::from_secs(300));

        let err = collector.collect("https://orphan.example.com").await.unwrap_err();
        assert!(matches!(err, Error::NoTrustPath));
    }

    #[tokio::test]
    async fn a_leaf_that_is_itself_the_anchor_is_a_single_statement_chain() {
        let keystore = keystore_with_anchor();
        let mut anchor_config = test_support::bare_statement(test_support::ANCHOR, test_support::ANCHOR);
        anchor_config.iat = test_support::now_unix() - 10;
        let client = test_support::MockHttpClient::new()
            .with_configuration(test_support::ANCHOR, &anchor_config);
        let fetch_cache = TtlCache::new();
        let fetcher = Arc::new(StatementFetcher::new(Arc::new(client), Duration::from_secs(5)));
        let collector = ChainCollector::new(fetcher, &keystore, &fetch_cache, 10, Duration::from_secs(300));

        let chains = collector.collect(test_support::ANCHOR).await.unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 1);
    }

    #[tokio::test]
    async fn a_failed_superior_fetch_prunes_the_branch() {
        // The intermediate's own configuration is never registered on the
        // client, so fetching it 404s; the branch through it is pruned and
        // no chain survives (there is only one authority hint here).
        let mut rp_config = test_support::bare_statement(test_support::RP, test_support::RP);
        rp_config.authority_hints = Some(vec![test_support::INTERMEDIATE.to_string()]);
        let client = test_support::MockHttpClient::new().with_configuration(test_support::RP, &rp_config);

        let keystore = keystore_with_anchor();
        let fetch_cache = TtlCache::new();
        let fetcher = Arc::new(StatementFetcher::new(Arc::new(client), Duration::from_secs(5)));
        let collector = ChainCollector::new(fetcher, &keystore, &fetch_cache, 10, Duration::from_secs(300));

        let err = collector.collect(test_support::RP).await.unwrap_err();
        assert!(matches!(err, Error::NoTrustPath));
    }

    #[tokio::test]
    async fn max_chain_depth_prunes_branches_beyond_the_limit() {
        let client = test_support::three_tier_federation();
        let keystore = keystore_with_anchor();
        let fetch_cache = TtlCache::new();
        let fetcher = Arc::new(StatementFetcher::new(Arc::new(client), Duration::from_secs(5)));
        // Depth 1 allows only one hop of superior-walking, not enough to
        // reach the anchor two hops up from the leaf.
        let collector = ChainCollector::new(fetcher, &keystore, &fetch_cache, 1, Duration::from_secs(300));

        let err = collector.collect(test_support::RP).await.unwrap_err();
        assert!(matches!(err, Error::MaxDepthExceeded));
    }
}
