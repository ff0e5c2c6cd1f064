//! # Entity Model
//!
//! Typed records, the closed enumerations they use, and the [`Archive`]
//! value that holds them.
//!
//! - `entities`: the records themselves and their field-level invariants
//! - `enums`: every string-keyed enumeration of the format
//! - `record`: the `Record` trait shared by all collections
//! - `archive`: manifest, collections, archive value and builder
//! - `identity`: CLID derivation and assignment
//! - `time`: the timestamp text form

pub mod archive;
pub mod entities;
pub mod enums;
pub mod identity;
pub mod record;
pub mod time;

pub use archive::{
    Archive, ArchiveBuilder, Author, Collections, DateRange, ExportOptions, Manifest, Stats,
};
pub use entities::{
    Climb, Coordinates, FirstAscent, Grade, Location, MediaItem, Route, RouteGrades, Sector,
    Session, Tag, TagRef, Weather,
};
pub use enums::{
    BelayType, ClimbType, FinishType, GradeSystem, MediaDesignation, MediaSource, MediaStrategy,
    MediaType, Platform, PredefinedTagKey, RockType, RouteType, SessionType, TerrainType,
};
pub use identity::{ClidAssignment, assign_missing_clids};
pub use record::{Record, Reference, Relink};
pub use time::Timestamp;
