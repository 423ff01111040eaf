//! Lenient serde for revived date fields.
//!
//! Designated date fields travel as RFC 3339 strings in the persisted
//! envelope. On read they are revived into `DateTime<Utc>` values; a value
//! that fails to parse becomes `None` with a warning log instead of failing
//! the whole load.
//!
//! Use with `#[serde(default, with = "revive")]` on an
//! `Option<DateTime<Utc>>` field.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Serializes the date as an RFC 3339 string, or `null` when unset.
pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => serializer.serialize_none(),
    }
}

/// Revives an RFC 3339 string into a date, coercing missing, null, or
/// unparsable values to `None`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|text| match DateTime::parse_from_rfc3339(&text) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(err) => {
            tracing::warn!(value = %text, %err, "unparsable stored date; treating as unset");
            None
        }
    }))
}
