//! # cldf-core
//!
//! The archive engine for the Climbing Log Data Format.
//!
//! A CLDF archive is a zip container of JSON documents (a manifest, one
//! document per entity collection, optional embedded media) sealed by a
//! checksums document. This crate owns every interpretation of that
//! container:
//! - `model` → the entity model and the immutable [`Archive`] value
//! - `clid` → globally unique, type-tagged identifiers
//! - `formats` → container packing, digests and JSON documents
//! - `codec` → archive ⇄ bytes under a strict or lenient policy
//! - `verifier` → checksum, structural and referential validation
//! - `merge` → combining archives with id remapping and deduplication
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - Deterministic: the same input always yields the same bytes and reports
//! - Values in, values out: no operation mutates an archive in place

// =============================================================================
// MODULES
// =============================================================================

pub mod clid;
pub mod codec;
pub mod config;
pub mod formats;
pub mod merge;
pub mod model;
pub mod primitives;
pub mod types;
pub mod verifier;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use clid::{Clid, EntityType};
pub use types::{CldfError, ClidSegment, Mode, RecordKind};

// =============================================================================
// RE-EXPORTS: Entity Model
// =============================================================================

pub use model::{
    Archive, ArchiveBuilder, Author, BelayType, ClidAssignment, Climb, ClimbType, Coordinates,
    DateRange, ExportOptions, FinishType, FirstAscent, Grade, GradeSystem, Location, Manifest,
    MediaDesignation, MediaItem, MediaSource, MediaStrategy, MediaType, Platform,
    PredefinedTagKey, Record, RockType, Route, RouteGrades, RouteType, Sector, Session,
    SessionType, Stats, Tag, TagRef, TerrainType, Timestamp, Weather, assign_missing_clids,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use codec::{Codec, ReadOutcome};
pub use config::CodecConfig;
pub use formats::{Container, DigestAlgorithm};
pub use merge::{MergeEngine, MergeReport};
pub use verifier::{ChecksumResult, ValidationReport, Verifier, validate, verify_checksums};
