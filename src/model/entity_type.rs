//! The closed set of federation entity types.
//!
//! The wire format spells these as snake_case strings inside `metadata` and
//! `metadata_policy` maps (`"openid_relying_party"`, `"oauth_client"`, ...).
//! Per the design notes this is a closed tagged variant at the protocol
//! level, so it is modeled as an enum with an explicit schema hook rather
//! than looked up by a dynamic string key everywhere it is used.

use derive_more::Display;
use serde::Deserialize;
use serde::Serialize;

/// One of the entity types a federation statement may declare metadata or
/// policy for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
pub enum EntityType {
    #[serde(rename = "openid_relying_party")]
    #[display(fmt = "openid_relying_party")]
    OpenidRelyingParty,
    #[serde(rename = "openid_provider")]
    #[display(fmt = "openid_provider")]
    OpenidProvider,
    #[serde(rename = "oauth_client")]
    #[display(fmt = "oauth_client")]
    OauthClient,
    #[serde(rename = "oauth_authorization_server")]
    #[display(fmt = "oauth_authorization_server")]
    OauthAuthorizationServer,
    #[serde(rename = "federation_entity")]
    #[display(fmt = "federation_entity")]
    FederationEntity,
    #[serde(rename = "trust_mark_issuer")]
    #[display(fmt = "trust_mark_issuer")]
    TrustMarkIssuer,
}

impl EntityType {
    /// The wire-format name, as it appears as a JSON object key inside
    /// `metadata`/`metadata_policy`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenidRelyingParty => "openid_relying_party",
            Self::OpenidProvider => "openid_provider",
            Self::OauthClient => "oauth_client",
            Self::OauthAuthorizationServer => "oauth_authorization_server",
            Self::FederationEntity => "federation_entity",
            Self::TrustMarkIssuer => "trust_mark_issuer",
        }
    }
}
