//! The error taxonomy for the trust-chain engine.
//!
//! Mirrors the error table in the design: transient fetch/verify failures are
//! local to one candidate branch and never unwind past the collector, while
//! [`Error::PolicyViolation`] and [`Error::Deadline`] are fatal for the whole
//! resolution. Every variant that wraps a lower-level failure keeps enough of
//! the original message for operator diagnosis.

use std::fmt;

/// The crate-wide [`Result`](std::result::Result), with the `Err` type
/// locked to [`Error`] for convenience.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
pub enum Error {
    /// A fetch exceeded its per-request timeout.
    FetchTimeout { url: String },

    /// A fetch endpoint answered with a non-2xx status.
    FetchHttpError { url: String, status: u16 },

    /// A fetch response could not be parsed as a compact JWS / JSON body.
    FetchFormatError { url: String, message: String },

    /// The first statement in a candidate chain was not issued by a
    /// configured trust anchor.
    UntrustedAnchor { iss: String },

    /// Signature verification failed for the statement at `index` (0 = anchor
    /// end of the chain).
    SignatureInvalid { index: usize, message: String },

    /// The statement at `index` has expired (subject to `allowed_delta`).
    Expired { index: usize },

    /// The statement at `index` is not yet valid (subject to `allowed_delta`).
    NotYetValid { index: usize },

    /// A non-leaf statement did not carry the `jwks` needed to verify its
    /// subordinate.
    MissingSigningJwks { index: usize },

    /// A `constraints.max_path_length` on the statement at `index` was
    /// violated by the remaining chain depth.
    ConstraintViolation { index: usize, message: String },

    /// Applying the merged metadata policy to a claim failed.
    PolicyViolation { claim: String, reason: String },

    /// No candidate chain survived collection and verification.
    NoTrustPath,

    /// The overall resolution deadline elapsed.
    Deadline,

    /// A key was requested for an issuer the key store has never seen.
    UnknownIssuer { issuer: String },

    /// A chain's `iss`/`sub` linkage, or leaf self-signature, was malformed.
    InvalidChain { message: String },

    /// A JWS header or payload could not be decoded at all.
    Jws { message: String },

    /// A URI used to build a fetch request was invalid.
    InvalidUri,

    /// A JWS `typ` header was present but not a recognized entity-statement
    /// or JWT type.
    UnrecognizedJwsType,

    /// A JWS header had no `kid`.
    NoKidPresent,

    /// No key under the expected issuer matched the JWS `kid`.
    NoCorrespondingKidInStore { issuer: String, kid: String },

    /// The maximum chain walk depth was exceeded (cycle guard).
    MaxDepthExceeded,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchTimeout { url } => write!(f, "timed out fetching {url}"),
            Self::FetchHttpError { url, status } => {
                write!(f, "fetch of {url} failed with HTTP {status}")
            }
            Self::FetchFormatError { url, message } => {
                write!(f, "malformed response from {url}: {message}")
            }
            Self::UntrustedAnchor { iss } => {
                write!(f, "chain does not terminate in a configured trust anchor: {iss}")
            }
            Self::SignatureInvalid { index, message } => {
                write!(f, "signature invalid at chain index {index}: {message}")
            }
            Self::Expired { index } => write!(f, "statement at chain index {index} has expired"),
            Self::NotYetValid { index } => {
                write!(f, "statement at chain index {index} is not yet valid")
            }
            Self::MissingSigningJwks { index } => {
                write!(f, "missing signing jwks at chain index {index}")
            }
            Self::ConstraintViolation { index, message } => {
                write!(f, "constraint violated at chain index {index}: {message}")
            }
            Self::PolicyViolation { claim, reason } => {
                write!(f, "policy violation on claim '{claim}': {reason}")
            }
            Self::NoTrustPath => write!(f, "no trust path to any configured anchor"),
            Self::Deadline => write!(f, "resolution deadline exceeded"),
            Self::UnknownIssuer { issuer } => write!(f, "unknown issuer: {issuer}"),
            Self::InvalidChain { message } => write!(f, "malformed chain: {message}"),
            Self::Jws { message } => write!(f, "malformed JWS: {message}"),
            Self::InvalidUri => write!(f, "invalid uri"),
            Self::UnrecognizedJwsType => write!(f, "unrecognized JWS type"),
            Self::NoKidPresent => write!(f, "no kid present in JWS header"),
            Self::NoCorrespondingKidInStore { issuer, kid } => {
                write!(f, "no key matching kid '{kid}' for issuer {issuer}")
            }
            Self::MaxDepthExceeded => write!(f, "maximum chain walk depth exceeded"),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Jws {
            message: e.to_string(),
        }
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(_: http::uri::InvalidUri) -> Self {
        Self::InvalidUri
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Jws {
            message: e.to_string(),
        }
    }
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Self {
        Self::FetchFormatError {
            url: String::new(),
            message: e.to_string(),
        }
    }
}
