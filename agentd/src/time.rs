//! RFC 3339 timestamp rendering for task snapshots and log lines.
//!
//! Task state is serialize-only (snapshots go out over the API and webhooks,
//! nothing is ever read back in), so only the serialize halves exist.

use chrono::{DateTime, Utc};
use serde::Serializer;
use std::time::SystemTime;

/// Formats a `SystemTime` as an RFC 3339 UTC string.
pub fn to_rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

/// Serializes a `SystemTime` as an RFC 3339 string.
pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&to_rfc3339(*time))
}

/// Serialization for `Option<SystemTime>` fields.
pub mod option {
    use serde::Serializer;
    use std::time::SystemTime;

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => serializer.serialize_some(&super::to_rfc3339(*t)),
            None => serializer.serialize_none(),
        }
    }
}
