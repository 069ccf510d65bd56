//! §4.4 ChainVerifier — verifies a candidate chain anchor-down-to-leaf,
//! propagating discovered subordinate keys as it goes. This is the security
//! heart of the engine: a subordinate's keys are never trusted until the
//! statement asserting them has itself verified (§4.4).

use std::time::Duration;

use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::Validation;

use crate::clock::now_unix;
use crate::error::Error;
use crate::fetch::decode_unverified_payload;
use crate::keystore::KeyStore;
use crate::model::CandidateChain;
use crate::model::VerifiedChain;

/// Verifies candidate chains against the trust anchors and key material
/// known to a [`KeyStore`].
pub struct ChainVerifier<'a> {
    keystore: &'a KeyStore,
    allowed_delta: Duration,
}

impl<'a> ChainVerifier<'a> {
    pub fn new(keystore: &'a KeyStore, allowed_delta: Duration) -> Self {
        Self {
            keystore,
            allowed_delta,
        }
    }

    /// Verify one candidate chain, anchor-first. Returns the verified chain
    /// on success, or the first error encountered (the caller treats this as
    /// "prune this branch", per §4.3's failure semantics).
    pub async fn verify(&self, candidate: &CandidateChain) -> Result<VerifiedChain, Error> {
        if candidate.is_empty() {
            return Err(Error::InvalidChain {
                message: "empty candidate chain".to_string(),
            });
        }

        let n = candidate.len();
        let delta = self.allowed_delta.as_secs() as i64;
        let mut verified_chain = Vec::with_capacity(n);

        // Pass 1: read the unverified payloads to check iss/sub linkage and
        // the anchor precondition before spending any signature-verification
        // work.
        let payloads: Vec<_> = candidate
            .statements
            .iter()
            .map(|jws| decode_unverified_payload(jws))
            .collect::<Result<Vec<_>, _>>()?;

        if !self.keystore.is_anchor(&payloads[0].iss) {
            return Err(Error::UntrustedAnchor {
                iss: payloads[0].iss.clone(),
            });
        }

        for i in 0..n {
            if i > 0 && payloads[i].iss != payloads[i - 1].sub {
                return Err(Error::InvalidChain {
                    message: format!(
                        "chain linkage broken at index {i}: iss '{}' does not match previous sub '{}'",
                        payloads[i].iss, payloads[i - 1].sub
                    ),
                });
            }
        }

        let leaf = &payloads[n - 1];
        if !leaf.is_self_signed() {
            return Err(Error::InvalidChain {
                message: "leaf statement is not self-signed (iss != sub)".to_string(),
            });
        }

        // Pass 2: verify signatures in order, anchor to leaf, importing keys
        // as each statement verifies.
        for (i, jws) in candidate.statements.iter().enumerate() {
            let header = decode_header(jws)?;
            let kid = header.kid.clone().ok_or(Error::NoKidPresent)?;
            let iss = &payloads[i].iss;

            let candidates = self.keystore.verify_keys_for_jws(iss, &kid).await?;

            let mut last_err: Option<Error> = None;
            let mut verified_payload = None;
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
                match decode::<crate::model::EntityStatementPayload>(jws, &decoding_key, &validation)
                {
                    Ok(data) => {
                        verified_payload = Some(data.claims);
                        break;
                    }
                    Err(e) => last_err = Some(e.into()),
                }
            }

            let payload = match verified_payload {
                Some(p) => p,
                None => {
                    return Err(Error::SignatureInvalid {
                        index: i,
                        message: last_err
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "no candidate key verified the signature".to_string()),
                    })
                }
            };

            let t = now_unix();
            if t > payload.exp + delta {
                return Err(Error::Expired { index: i });
            }
            if t < payload.iat - delta {
                return Err(Error::NotYetValid { index: i });
            }

            if let Some(constraints) = &payload.constraints {
                if let Some(max_path_length) = constraints.max_path_length {
                    let remaining_hops = (n - 1 - i) as u32;
                    if remaining_hops > max_path_length {
                        return Err(Error::ConstraintViolation {
                            index: i,
                            message: format!(
                                "max_path_length={max_path_length} exceeded by {remaining_hops} remaining hops"
                            ),
                        });
                    }
                }
            }

            let is_leaf = i == n - 1;
            match &payload.jwks {
                Some(jwks) => {
                    self.keystore.import_jwks(&payload.sub, jwks).await;
                }
                None if !is_leaf => {
                    return Err(Error::MissingSigningJwks { index: i });
                }
                None => {}
            }

            verified_chain.push(payload);
        }

        let exp = verified_chain.iter().map(|s| s.exp).min().unwrap_or(0);
        let anchor = verified_chain[0].iss.clone();
        let mut iss_path: Vec<_> = verified_chain.iter().map(|s| s.iss.clone()).collect();
        iss_path.reverse();

        Ok(VerifiedChain {
            anchor,
            iss_path,
            exp,
            verified_chain,
        })
    }
}
