//! The entity statement payload and the chain types built from it (§3).

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::model::entity_type::EntityType;
use crate::model::jwk::Jwks;
use crate::policy::PolicyOperators;

pub type EntityId = String;

/// A single entity type's declared metadata: claim name -> value.
pub type Metadata = Map<String, Value>;

/// A single entity type's policy: claim name -> operators.
pub type PolicyMap = HashMap<String, PolicyOperators>;

/// Constraints carried on an entity statement, restricting the chains that
/// may be built through it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    /// Maximum number of remaining hops (not counting this statement) from
    /// here down to the leaf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_path_length: Option<u32>,
}

/// The decoded payload of a compact-JWS entity statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStatementPayload {
    pub iss: EntityId,
    pub sub: EntityId,
    pub iat: i64,
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<Jwks>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_hints: Option<Vec<EntityId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<EntityType, Metadata>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_policy: Option<HashMap<EntityType, PolicyMap>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_marks: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

impl EntityStatementPayload {
    /// `true` when this is a self-signed entity configuration (`iss == sub`).
    pub fn is_self_signed(&self) -> bool {
        self.iss == self.sub
    }
}

/// A configured root of trust: an entity id and the keys known a priori for
/// it. Immutable once the engine is constructed (§3, "Lifecycles").
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    pub entity_id: EntityId,
    pub jwks: Jwks,
}

/// An ordered sequence of compact-JWS entity statement strings, anchor to
/// leaf, not yet verified.
#[derive(Debug, Clone, Default)]
pub struct CandidateChain {
    pub statements: Vec<String>,
}

impl CandidateChain {
    pub fn new(statements: Vec<String>) -> Self {
        Self { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// A candidate chain whose signatures, expiry, and `iss`/`sub` linkage have
/// all been verified (§3, "Verified Chain").
#[derive(Debug, Clone)]
pub struct VerifiedChain {
    /// The issuer id of the first (anchor) statement.
    pub anchor: EntityId,
    /// Leaf id, ..., anchor id.
    pub iss_path: Vec<EntityId>,
    /// The minimum `exp` across all members.
    pub exp: i64,
    /// The parsed payloads, in anchor-to-leaf order.
    pub verified_chain: Vec<EntityStatementPayload>,
}

impl VerifiedChain {
    pub fn leaf(&self) -> &EntityStatementPayload {
        self.verified_chain
            .last()
            .expect("a verified chain always has at least one statement")
    }
}

/// Effective metadata for one entity type: the result of applying the
/// merged policy chain to the leaf's declared metadata (§3, §4.5).
pub type EffectiveMetadata = Map<String, Value>;
