//! The one clock reading used throughout the engine for `iat`/`exp`/
//! `allowed_delta` comparisons (§3, §4.4, §4.7).

/// The current time as Unix seconds, the same unit entity statement and
/// trust mark timestamps are carried in.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
