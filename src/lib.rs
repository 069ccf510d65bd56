//! `federation_trust` is the relying-party side of an OpenID Connect /
//! OAuth2 federation: a hierarchical trust fabric in which entities publish
//! signed entity statements about themselves and their subordinates, and in
//! which a client dynamically discovers and verifies a chain of such
//! statements ending at a trust anchor whose keys it knows a priori.
//!
//! Five cooperating components do the work:
//!
//! - [`keystore`] maps an issuer id to its current verification keys.
//! - [`fetch`] retrieves entity statements, configurations, subordinate
//!   lists, and trust mark status over HTTP.
//! - [`collector`] walks `authority_hints` to assemble every candidate chain
//!   from a leaf to a configured trust anchor.
//! - [`verifier`] verifies a candidate chain's signatures anchor-down,
//!   propagating subordinate keys as it goes.
//! - [`policy`] merges `metadata_policy` top-down and applies it to a leaf's
//!   declared metadata.
//!
//! [`resolver::TrustChainResolver`] composes the first four into
//! `resolve(entity_id, entity_type)`, and [`trust_mark::TrustMarkVerifier`]
//! builds on the resolver to verify trust marks.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use federation_trust::config::FederationConfig;
//! use federation_trust::http_client::HyperHttpClient;
//! use federation_trust::model::EntityType;
//! use federation_trust::model::Jwks;
//! use federation_trust::resolver::TrustChainResolver;
//!
//! # async fn run() -> federation_trust::error::Result<()> {
//! let config = FederationConfig::builder()
//!     .add_trust_anchor("https://anchor.example.org", Jwks::default())
//!     .build();
//!
//! let resolver = TrustChainResolver::new(config, Arc::new(HyperHttpClient::default()));
//!
//! let resolved = resolver
//!     .resolve("https://rp.example.com", EntityType::OpenidRelyingParty, None)
//!     .await?;
//!
//! println!("resolved via anchor {}", resolved.chain.anchor);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod collector;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http_client;
pub mod keystore;
pub mod model;
pub mod policy;
pub mod resolver;
pub mod trust_mark;
pub mod verifier;

#[cfg(test)]
mod test_support;

pub mod prelude {
    //! Convenience re-exports for when working with this crate.

    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::model::EntityType;
    pub use crate::resolver::ResolvedTrustChain;
    pub use crate::resolver::TrustChainResolver;
    pub use crate::trust_mark::TrustMarkVerifier;
}
