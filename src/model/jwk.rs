//! `JWK`/`JWKS` representations, per [RFC7517](https://datatracker.ietf.org/doc/html/rfc7517).
//!
//! This is the wire type carried inside an entity statement's `jwks` claim.
//! Unlike the teacher crate's `Key` (which only ever expected `RSA`/`RS256`
//! keys from a handful of `OAuth2` providers), entity statements may be
//! signed with either `RS256` or `ES256` (§6 of the design), so both the RSA
//! `n`/`e` and the EC `crv`/`x`/`y` fields are carried, and only the ones
//! relevant to the key's declared `kty` are expected to be populated.

use derivative::Derivative;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;

/// A `JWK` key type.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    RSA,
    EC,
}

/// A `JWK`'s declared usage.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Use {
    sig,
    enc,
}

/// A single `JWK`, restricted to the fields the `RS256`/`ES256` algorithms
/// this engine supports (§6) actually need.
///
/// `PartialEq`/`Hash` are derived over `(kty, use, kid)` only, via
/// `derivative` — the key-material fields (`n`/`e`/`crv`/`x`/`y`/`alg`) are
/// excluded, so two `Jwk`s are "the same key" for the additive merge in §3
/// exactly when their identity tuple matches, regardless of how the rest of
/// the key was encoded.
#[derive(Debug, Clone, Derivative, Serialize, Deserialize)]
#[derivative(PartialEq, Eq, Hash)]
pub struct Jwk {
    pub kty: KeyType,
    pub kid: String,
    #[serde(rename = "use", default)]
    pub r#use: Option<Use>,
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    pub alg: Option<Algorithm>,

    /// RSA modulus, base64url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    pub n: Option<String>,
    /// RSA public exponent, base64url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    pub e: Option<String>,

    /// EC curve name (`P-256` for `ES256`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    pub crv: Option<String>,
    /// EC x coordinate, base64url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    pub x: Option<String>,
    /// EC y coordinate, base64url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    pub y: Option<String>,
}

impl Jwk {
    /// Build the [`DecodingKey`] this `JWK` represents, for the algorithm
    /// declared on the JWS header being verified.
    pub fn decoding_key(&self, alg: Algorithm) -> crate::error::Result<DecodingKey> {
        match (self.kty, alg) {
            (KeyType::RSA, Algorithm::RS256) => {
                let n = self.n.as_deref().ok_or_else(|| Error::Jws {
                    message: format!("RSA key {} missing 'n'", self.kid),
                })?;
                let e = self.e.as_deref().ok_or_else(|| Error::Jws {
                    message: format!("RSA key {} missing 'e'", self.kid),
                })?;
                Ok(DecodingKey::from_rsa_components(n, e)?)
            }
            (KeyType::EC, Algorithm::ES256) => {
                let x = self.x.as_deref().ok_or_else(|| Error::Jws {
                    message: format!("EC key {} missing 'x'", self.kid),
                })?;
                let y = self.y.as_deref().ok_or_else(|| Error::Jws {
                    message: format!("EC key {} missing 'y'", self.kid),
                })?;
                Ok(DecodingKey::from_ec_components(x, y)?)
            }
            _ => Err(Error::Jws {
                message: format!(
                    "key {} (kty={:?}) cannot be used with algorithm {:?}",
                    self.kid, self.kty, alg
                ),
            }),
        }
    }
}

/// A `JWK` set, as carried in an entity statement's `jwks` claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// The monotonically growing key set an issuer's statements have revealed,
/// per §3 ("KeyStore contents").
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<Jwk>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additive merge: a key is added only if its identity (`kty`, `use`,
    /// `kid` — see [`Jwk`]'s `PartialEq`) is not already present.
    pub fn merge(&mut self, jwks: &Jwks) -> Vec<Jwk> {
        let mut added = Vec::new();
        for key in &jwks.keys {
            if !self.keys.contains(key) {
                added.push(key.clone());
                self.keys.push(key.clone());
            }
        }
        added
    }

    pub fn by_kid(&self, kid: &str) -> Vec<&Jwk> {
        self.keys.iter().filter(|k| k.kid == kid).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }
}
