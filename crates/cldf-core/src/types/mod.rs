//! # Core Type Definitions
//!
//! Types shared by every engine component:
//! - Record kinds (`RecordKind`) naming the archive collections
//! - Processing policy (`Mode`)
//! - Error taxonomy (`CldfError`)
//!
//! ## Determinism Guarantees
//!
//! `RecordKind` implements `Ord` in dependency order (a kind only points at
//! kinds that sort before it, tags excepted), so every pass that iterates
//! kinds in order produces findings in the same order on every run.

use crate::primitives;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// RECORD KINDS
// =============================================================================

/// The entity collections an archive holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
    Location,
    Sector,
    Route,
    Session,
    Tag,
    Climb,
    Media,
}

impl RecordKind {
    /// All kinds in dependency order.
    pub const ALL: [Self; 7] = [
        Self::Location,
        Self::Sector,
        Self::Route,
        Self::Session,
        Self::Tag,
        Self::Climb,
        Self::Media,
    ];

    /// Singular lowercase name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Sector => "sector",
            Self::Route => "route",
            Self::Session => "session",
            Self::Tag => "tag",
            Self::Climb => "climb",
            Self::Media => "media",
        }
    }

    /// Container member holding this collection.
    #[must_use]
    pub const fn document(self) -> &'static str {
        match self {
            Self::Location => primitives::LOCATIONS_JSON,
            Self::Sector => primitives::SECTORS_JSON,
            Self::Route => primitives::ROUTES_JSON,
            Self::Session => primitives::SESSIONS_JSON,
            Self::Tag => primitives::TAGS_JSON,
            Self::Climb => primitives::CLIMBS_JSON,
            Self::Media => primitives::MEDIA_METADATA_JSON,
        }
    }

    /// Top-level key wrapping the array inside the document.
    #[must_use]
    pub const fn collection_key(self) -> &'static str {
        match self {
            Self::Location => "locations",
            Self::Sector => "sectors",
            Self::Route => "routes",
            Self::Session => "sessions",
            Self::Tag => "tags",
            Self::Climb => "climbs",
            Self::Media => "media",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MODE
// =============================================================================

/// Whether integrity and referential failures abort or degrade into a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Any error aborts the operation.
    #[default]
    Strict,
    /// Errors are recorded; offending entities are dropped where needed.
    Lenient,
}

impl Mode {
    #[must_use]
    pub const fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

// =============================================================================
// CLID SEGMENTS
// =============================================================================

/// Which part of a CLID failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClidSegment {
    /// Wrong number of `:`-separated segments.
    Layout,
    Namespace,
    EntityType,
    Uuid,
}

impl fmt::Display for ClidSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Layout => "layout",
            Self::Namespace => "namespace",
            Self::EntityType => "entityType",
            Self::Uuid => "uuid",
        })
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur anywhere in the engine.
///
/// - No silent failures
/// - Use `Result<T, CldfError>` for fallible operations
/// - The engine never panics; every error is a value the caller can inspect
///
/// Errors are `Clone + PartialEq` so validation and merge reports can carry
/// them as typed findings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CldfError {
    /// The container is unreadable or a mandatory document is missing.
    #[error("Structure error: {0}")]
    Structure(String),

    /// A document's digest does not match the checksums document.
    #[error("Integrity error in {document}: {detail}")]
    Integrity { document: String, detail: String },

    /// A foreign key points at an entity that does not exist.
    #[error("Referential error: {entity} {id} references missing {target} {missing} ({field})")]
    Referential {
        entity: RecordKind,
        id: u32,
        field: &'static str,
        target: RecordKind,
        missing: u32,
    },

    /// A required field is missing or a field value is invalid.
    #[error("Schema error in {document}: {detail}")]
    Schema { document: String, detail: String },

    /// A CLID is malformed; `segment` names the part that failed.
    #[error("Identifier error in {segment} of '{value}': {reason}")]
    Identifier {
        segment: ClidSegment,
        value: String,
        reason: String,
    },

    /// Merge could not resolve a foreign key or a conflict.
    #[error("Merge conflict: {0}")]
    MergeConflict(String),

    /// Codec configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred (app layer only; the engine works on bytes).
    #[error("I/O error: {0}")]
    Io(String),
}

impl CldfError {
    pub(crate) fn schema(document: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Schema {
            document: document.into(),
            detail: detail.into(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
