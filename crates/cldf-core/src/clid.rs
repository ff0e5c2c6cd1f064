//! # CLID - Global Identifiers
//!
//! A CLID names one entity across every archive it ever appears in:
//!
//! ```text
//! clid:<entityType>:<uuid>
//! ```
//!
//! - `entityType` is drawn from [`EntityType`] (matched exactly, lowercase)
//! - `uuid` is canonical hyphenated hex, 36 characters, normalized to lowercase
//!
//! Random CLIDs use UUID v4. Name-based CLIDs (see [`Clid::from_name`]) use
//! UUID v5 under a fixed namespace, so identical input produces the same
//! identifier on every device.
//!
//! This module has no dependency on the entity model.

use crate::primitives::{
    CLID_NAMESPACE, CLID_SHORT_FORM_LEN, CLID_URL_BASE, CLID_V5_NAMESPACE,
};
use crate::types::{CldfError, ClidSegment};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ENTITY TYPE
// =============================================================================

/// Entity types a CLID can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityType {
    Location,
    Sector,
    Route,
    Session,
    Climb,
    Media,
    Ascent,
}

impl EntityType {
    pub const ALL: [Self; 7] = [
        Self::Location,
        Self::Sector,
        Self::Route,
        Self::Session,
        Self::Climb,
        Self::Media,
        Self::Ascent,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Sector => "sector",
            Self::Route => "route",
            Self::Session => "session",
            Self::Climb => "climb",
            Self::Media => "media",
            Self::Ascent => "ascent",
        }
    }

    /// Exact lookup; CLID type segments are always lowercase.
    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == segment)
    }

    fn valid_values() -> String {
        Self::ALL.map(Self::as_str).join(", ")
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CLID
// =============================================================================

/// A parsed, validated global identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Clid {
    entity_type: EntityType,
    uuid: Uuid,
}

impl Clid {
    /// Build from parts. Any uuid value is structurally valid.
    #[must_use]
    pub const fn new(entity_type: EntityType, uuid: Uuid) -> Self {
        Self { entity_type, uuid }
    }

    /// Fresh random identifier (UUID v4).
    #[must_use]
    pub fn generate(entity_type: EntityType) -> Self {
        Self::new(entity_type, Uuid::new_v4())
    }

    /// Deterministic identifier from a name (UUID v5).
    ///
    /// The namespace is fixed for the whole format, so two devices that
    /// describe a thing with the same `name` agree on its CLID.
    #[must_use]
    pub fn from_name(entity_type: EntityType, name: &str) -> Self {
        Self::new(
            entity_type,
            Uuid::new_v5(&CLID_V5_NAMESPACE, name.as_bytes()),
        )
    }

    /// Parse the text form, naming the segment that failed.
    pub fn parse(text: &str) -> Result<Self, CldfError> {
        let fail = |segment, reason: String| CldfError::Identifier {
            segment,
            value: text.to_string(),
            reason,
        };

        let segments: Vec<&str> = text.split(':').collect();
        let [namespace, entity_type, uuid] = segments[..] else {
            return Err(fail(
                ClidSegment::Layout,
                format!("expected 3 ':'-separated segments, found {}", segments.len()),
            ));
        };

        if namespace != CLID_NAMESPACE {
            return Err(fail(
                ClidSegment::Namespace,
                format!("expected '{CLID_NAMESPACE}', found '{namespace}'"),
            ));
        }

        let Some(entity_type) = EntityType::from_segment(entity_type) else {
            return Err(fail(
                ClidSegment::EntityType,
                format!(
                    "unknown entity type '{entity_type}'; valid values: {}",
                    EntityType::valid_values()
                ),
            ));
        };

        if !is_canonical_uuid(uuid) {
            return Err(fail(
                ClidSegment::Uuid,
                "expected 36-character hyphenated hex (8-4-4-4-12)".to_string(),
            ));
        }
        let uuid = Uuid::parse_str(uuid).map_err(|e| fail(ClidSegment::Uuid, e.to_string()))?;

        Ok(Self::new(entity_type, uuid))
    }

    /// `true` if `parse` would succeed.
    #[must_use]
    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_ok()
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Always `clid`.
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        CLID_NAMESPACE
    }

    /// First eight hex characters of the uuid.
    #[must_use]
    pub fn short_form(&self) -> String {
        let mut hex = self.uuid.simple().to_string();
        hex.truncate(CLID_SHORT_FORM_LEN);
        hex
    }

    /// Canonical share URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{CLID_URL_BASE}{}", self.short_form())
    }
}

/// 8-4-4-4-12 hex groups, either case.
fn is_canonical_uuid(text: &str) -> bool {
    const HYPHENS: [usize; 4] = [8, 13, 18, 23];
    text.len() == 36
        && text.char_indices().all(|(i, c)| {
            if HYPHENS.contains(&i) {
                c == '-'
            } else {
                c.is_ascii_hexdigit()
            }
        })
}

impl fmt::Display for Clid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{CLID_NAMESPACE}:{}:{}",
            self.entity_type,
            self.uuid.hyphenated()
        )
    }
}

impl FromStr for Clid {
    type Err = CldfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Clid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Clid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(de::Error::custom)
    }
}

// =============================================================================
// TESTS
// =============================================================================
