//! The data model of the federation trust fabric: entity statements, trust
//! anchors, chains, keys, and trust marks (§3).

pub mod entity_statement;
pub mod entity_type;
pub mod jwk;
pub mod trust_mark;

pub use entity_statement::CandidateChain;
pub use entity_statement::Constraints;
pub use entity_statement::EffectiveMetadata;
pub use entity_statement::EntityId;
pub use entity_statement::EntityStatementPayload;
pub use entity_statement::Metadata;
pub use entity_statement::PolicyMap;
pub use entity_statement::TrustAnchor;
pub use entity_statement::VerifiedChain;
pub use entity_type::EntityType;
pub use jwk::Jwk;
pub use jwk::Jwks;
pub use jwk::KeySet;
pub use jwk::KeyType;
pub use jwk::Use;
pub use trust_mark::TrustMarkPayload;
pub use trust_mark::TrustMarkStatus;
