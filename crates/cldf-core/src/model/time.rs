//! # Timestamps
//!
//! One fixed textual form for every instant in the archive: RFC 3339 with an
//! explicit `+HH:MM` offset and the shortest exact fractional seconds.
//! Offsets are preserved as written so a read/write cycle is lossless.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};

/// An instant as carried by the archive.
pub type Timestamp = DateTime<FixedOffset>;

/// Render a timestamp in the canonical form.
#[must_use]
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parse a timestamp.
///
/// Accepts RFC 3339 with any offset. Older exporters wrote local times with
/// no offset at all; those are read as UTC.
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts);
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Current time, in UTC.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now().fixed_offset()
}

/// `#[serde(with = "timestamp")]` for required fields.
pub mod timestamp {
    use super::{Timestamp, format_timestamp, parse_timestamp};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_timestamp(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{text}'")))
    }
}

/// `#[serde(default, with = "optional_timestamp")]` for optional fields.
pub mod optional_timestamp {
    use super::{Timestamp, format_timestamp, parse_timestamp};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(
        ts: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&format_timestamp(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => parse_timestamp(&text)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{text}'"))),
            None => Ok(None),
        }
    }
}
