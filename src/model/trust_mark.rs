//! Trust mark payload (§3, §4.7).

use serde::Deserialize;
use serde::Serialize;

use crate::model::entity_statement::EntityId;

/// The decoded payload of a signed trust mark JWS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustMarkPayload {
    /// The trust mark issuer's entity id.
    pub iss: EntityId,
    /// The entity id the mark is about.
    pub sub: EntityId,
    /// The trust mark identifier URL.
    pub id: String,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl TrustMarkPayload {
    /// `true` when the mark is self-issued (`iss == sub`).
    pub fn is_self_signed(&self) -> bool {
        self.iss == self.sub
    }
}

/// The status-endpoint response shape (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct TrustMarkStatus {
    pub active: bool,
}
