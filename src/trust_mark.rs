//! §4.7 TrustMarkVerifier — verifies a trust mark's signature against the
//! resolved trust chain of its issuer, plus (§B.2) the original's structural
//! constraint that a non-self-signed mark's issuer chain has no
//! intermediate beyond the trust anchor.

use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::Validation;

use crate::clock::now_unix;
use crate::error::Error;
use crate::fetch::federation_endpoint;
use crate::model::EntityType;
use crate::model::TrustMarkPayload;
use crate::resolver::TrustChainResolver;

/// Verifies signed trust marks using the key material discovered while
/// resolving their issuer's trust chain.
pub struct TrustMarkVerifier<'a> {
    resolver: &'a TrustChainResolver,
}

impl<'a> TrustMarkVerifier<'a> {
    pub fn new(resolver: &'a TrustChainResolver) -> Self {
        Self { resolver }
    }

    /// Verify `trust_mark`. Returns the parsed payload on success; on *any*
    /// failure (malformed mark, expired, unresolvable issuer, signature
    /// mismatch, inactive status) returns `None` — the caller treats absence
    /// as "mark not accepted" (§4.7).
    pub async fn verify(&self, trust_mark: &str, check_status: bool) -> Option<TrustMarkPayload> {
        match self.verify_inner(trust_mark, check_status).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(error = %e, "trust mark rejected");
                None
            }
        }
    }

    async fn verify_inner(
        &self,
        trust_mark: &str,
        check_status: bool,
    ) -> Result<TrustMarkPayload, Error> {
        let payload = jsonwebtoken::dangerous_insecure_decode::<TrustMarkPayload>(trust_mark)?
            .claims;

        if let Some(exp) = payload.exp {
            if exp < now_unix() {
                return Err(Error::Expired { index: 0 });
            }
        }

        // Resolving the issuer's federation_entity chain both establishes
        // that the issuer is itself part of the federation and populates the
        // KeyStore with the issuer's current keys (§4.7.2).
        let resolved = self
            .resolver
            .resolve(&payload.iss, EntityType::FederationEntity, None)
            .await?;

        // §B.2: a non-self-signed trust mark's issuer chain must not have an
        // intermediate beyond the trust anchor.
        if !payload.is_self_signed() && resolved.chain.iss_path.len() > 2 {
            return Err(Error::PolicyViolation {
                claim: "trust_mark.iss".to_string(),
                reason: "issuer's trust chain has an intermediate beyond the trust anchor"
                    .to_string(),
            });
        }

        let header = decode_header(trust_mark)?;
        let kid = header.kid.clone().ok_or(Error::NoKidPresent)?;
        let candidates = self
            .resolver
            .keystore()
            .verify_keys_for_jws(&payload.iss, &kid)
            .await?;

        let mut last_err = None;
        let mut verified = false;
        for key in &candidates {
            let decoding_key = match key.decoding_key(header.alg) {
                Ok(k) => k,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            let mut validation = Validation::new(header.alg);
            validation.validate_exp = false;
            match decode::<TrustMarkPayload>(trust_mark, &decoding_key, &validation) {
                Ok(_) => {
                    verified = true;
                    break;
                }
                Err(e) => last_err = Some(e.into()),
            }
        }

        if !verified {
            return Err(Error::SignatureInvalid {
                index: 0,
                message: last_err
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no candidate key verified the trust mark".to_string()),
            });
        }

        if check_status {
            let leaf = resolved.chain.leaf();
            let status_endpoint = federation_endpoint(leaf, "federation_status_endpoint")
                .ok_or_else(|| Error::FetchFormatError {
                    url: payload.iss.clone(),
                    message: "issuer has no federation_status_endpoint".to_string(),
                })?;

            let status = self
                .resolver
                .fetcher()
                .fetch_trust_mark_status(&status_endpoint, trust_mark)
                .await?;

            if !status.active {
                return Err(Error::PolicyViolation {
                    claim: "trust_mark.status".to_string(),
                    reason: "status endpoint reports the mark is not active".to_string(),
                });
            }
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::FederationConfig;
    use crate::model::TrustMarkPayload;
    use crate::test_support;

    fn config() -> FederationConfig {
        FederationConfig::builder()
            .add_trust_anchor(test_support::ANCHOR, test_support::jwks())
            .build()
    }

    fn mark(iss: &str, sub: &str) -> TrustMarkPayload {
        TrustMarkPayload {
            iss: iss.to_string(),
            sub: sub.to_string(),
            id: "https://marks.example.org/certified".to_string(),
            iat: test_support::now_unix() - 10,
            exp: Some(test_support::now_unix() + 3600),
            logo_uri: None,
            reference: None,
        }
    }

    #[tokio::test]
    async fn accepts_a_self_signed_mark_from_a_direct_anchor_subordinate() {
        // RP sits directly under the anchor here, so its chain's iss_path
        // has exactly 2 entries and the self-signed mark is accepted.
        let mut rp_config = test_support::bare_statement(test_support::RP, test_support::RP);
        rp_config.authority_hints = Some(vec![test_support::ANCHOR.to_string()]);
        let mut anchor_config =
            test_support::bare_statement(test_support::ANCHOR, test_support::ANCHOR);
        let anchor_fetch = format!("{}/fetch", test_support::ANCHOR);
        anchor_config.metadata = {
            let mut m = std::collections::HashMap::new();
            let mut fe = crate::model::Metadata::new();
            fe.insert(
                "federation_fetch_endpoint".to_string(),
                serde_json::Value::String(anchor_fetch.clone()),
            );
            m.insert(crate::model::EntityType::FederationEntity, fe);
            Some(m)
        };
        let mut anchor_about_rp = test_support::bare_statement(test_support::ANCHOR, test_support::RP);
        anchor_about_rp.jwks = Some(test_support::jwks());

        let client = test_support::MockHttpClient::new()
            .with_configuration(test_support::RP, &rp_config)
            .with_configuration(test_support::ANCHOR, &anchor_config)
            .with_statement(&anchor_fetch, test_support::ANCHOR, test_support::RP, &anchor_about_rp);

        let resolver = TrustChainResolver::new(config(), Arc::new(client));
        let verifier = TrustMarkVerifier::new(&resolver);

        let trust_mark = test_support::sign(&mark(test_support::RP, test_support::RP));
        let verified = verifier.verify(&trust_mark, false).await;
        assert!(verified.is_some());
    }

    #[tokio::test]
    async fn rejects_an_expired_mark() {
        let resolver = TrustChainResolver::new(config(), Arc::new(test_support::three_tier_federation()));
        let verifier = TrustMarkVerifier::new(&resolver);

        let mut expired = mark(test_support::RP, test_support::RP);
        expired.exp = Some(test_support::now_unix() - 100);

        let trust_mark = test_support::sign(&expired);
        assert!(verifier.verify(&trust_mark, false).await.is_none());
    }

    #[tokio::test]
    async fn rejects_a_tampered_mark() {
        let resolver = TrustChainResolver::new(config(), Arc::new(test_support::three_tier_federation()));
        let verifier = TrustMarkVerifier::new(&resolver);

        let trust_mark = test_support::sign_tampered(&mark(test_support::RP, test_support::RP));
        assert!(verifier.verify(&trust_mark, false).await.is_none());
    }

    #[tokio::test]
    async fn rejects_a_non_self_signed_mark_whose_issuer_chain_has_an_extra_intermediate() {
        // RP's own federation_entity chain is anchor -> intermediate -> rp
        // (3 elements, iss_path length 3); a non-self-signed mark it issues
        // violates the B.2 constraint.
        let client = test_support::three_tier_federation();
        let resolver = TrustChainResolver::new(config(), Arc::new(client));
        let verifier = TrustMarkVerifier::new(&resolver);

        let trust_mark =
            test_support::sign(&mark(test_support::RP, "https://subject.example.org"));
        assert!(verifier.verify(&trust_mark, false).await.is_none());
    }
}
