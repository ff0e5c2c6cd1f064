//! # Archive Value
//!
//! An [`Archive`] is an immutable value: a manifest, the seven entity
//! collections and any embedded media files. Changes go through an
//! [`ArchiveBuilder`], which validates each record at the boundary and
//! hands back a new archive.
//!
//! ## Local IDs
//!
//! The builder assigns archive-local ids per collection, starting at 1 and
//! strictly increasing. An id is never handed out twice within one archive
//! instance, even after the record holding it is removed.

use crate::model::enums::{MediaStrategy, Platform};
use crate::model::record::Record;
use crate::model::time::{Timestamp, timestamp};
use crate::model::entities::{Climb, Location, MediaItem, Route, Sector, Session, Tag};
use crate::primitives::{FORMAT_TAG, FORMAT_VERSION, MEDIA_DIR_PREFIX};
use crate::types::{CldfError, RecordKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// MANIFEST
// =============================================================================

/// Archive header: format identity, provenance and per-entity counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub format: String,
    #[serde(with = "timestamp")]
    pub creation_date: Timestamp,
    pub app_version: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_options: Option<ExportOptions>,
}

impl Manifest {
    /// Current format version and tag, empty stats.
    #[must_use]
    pub fn new(app_version: impl Into<String>, platform: Platform, creation_date: Timestamp) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            format: FORMAT_TAG.to_string(),
            creation_date,
            app_version: app_version.into(),
            platform,
            author: None,
            source: None,
            stats: Stats::default(),
            export_options: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    #[serde(default)]
    pub include_media: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_strategy: Option<MediaStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Per-collection counts declared by the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub climbs_count: u32,
    pub sessions_count: u32,
    pub locations_count: u32,
    pub routes_count: u32,
    pub sectors_count: u32,
    pub tags_count: u32,
    pub media_count: u32,
}

impl Stats {
    #[must_use]
    pub const fn count(&self, kind: RecordKind) -> u32 {
        match kind {
            RecordKind::Location => self.locations_count,
            RecordKind::Sector => self.sectors_count,
            RecordKind::Route => self.routes_count,
            RecordKind::Session => self.sessions_count,
            RecordKind::Tag => self.tags_count,
            RecordKind::Climb => self.climbs_count,
            RecordKind::Media => self.media_count,
        }
    }

    fn slot(&mut self, kind: RecordKind) -> &mut u32 {
        match kind {
            RecordKind::Location => &mut self.locations_count,
            RecordKind::Sector => &mut self.sectors_count,
            RecordKind::Route => &mut self.routes_count,
            RecordKind::Session => &mut self.sessions_count,
            RecordKind::Tag => &mut self.tags_count,
            RecordKind::Climb => &mut self.climbs_count,
            RecordKind::Media => &mut self.media_count,
        }
    }

    fn of(collections: &Collections) -> Self {
        let mut stats = Self::default();
        for kind in RecordKind::ALL {
            *stats.slot(kind) = u32::try_from(collections.len(kind)).unwrap_or(u32::MAX);
        }
        stats
    }
}

// =============================================================================
// COLLECTIONS
// =============================================================================

/// The entity collections, in storage order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collections {
    pub(crate) locations: Vec<Location>,
    pub(crate) sectors: Vec<Sector>,
    pub(crate) routes: Vec<Route>,
    pub(crate) sessions: Vec<Session>,
    pub(crate) climbs: Vec<Climb>,
    pub(crate) tags: Vec<Tag>,
    pub(crate) media: Vec<MediaItem>,
}

impl Collections {
    #[must_use]
    pub fn len(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Location => self.locations.len(),
            RecordKind::Sector => self.sectors.len(),
            RecordKind::Route => self.routes.len(),
            RecordKind::Session => self.sessions.len(),
            RecordKind::Tag => self.tags.len(),
            RecordKind::Climb => self.climbs.len(),
            RecordKind::Media => self.media.len(),
        }
    }

    /// Largest id present for each kind.
    fn max_ids(&self) -> BTreeMap<RecordKind, u32> {
        fn max<T: Record>(records: &[T]) -> u32 {
            records.iter().map(Record::id).max().unwrap_or(0)
        }
        BTreeMap::from([
            (RecordKind::Location, max(&self.locations)),
            (RecordKind::Sector, max(&self.sectors)),
            (RecordKind::Route, max(&self.routes)),
            (RecordKind::Session, max(&self.sessions)),
            (RecordKind::Tag, max(&self.tags)),
            (RecordKind::Climb, max(&self.climbs)),
            (RecordKind::Media, max(&self.media)),
        ])
    }
}

// =============================================================================
// ARCHIVE
// =============================================================================

/// A complete climbing log held in memory.
#[derive(Debug, Clone)]
pub struct Archive {
    manifest: Manifest,
    collections: Collections,
    media_files: BTreeMap<String, Vec<u8>>,
    /// Last id handed out per kind.
    issued: BTreeMap<RecordKind, u32>,
}

/// Equality covers content only; the id sequence is bookkeeping.
impl PartialEq for Archive {
    fn eq(&self, other: &Self) -> bool {
        self.manifest == other.manifest
            && self.collections == other.collections
            && self.media_files == other.media_files
    }
}

impl Archive {
    /// Start an empty archive.
    #[must_use]
    pub fn builder(manifest: Manifest) -> ArchiveBuilder {
        ArchiveBuilder {
            archive: Self::from_parts(manifest, Collections::default(), BTreeMap::new()),
        }
    }

    /// Assemble decoded parts without validation; the verifier judges them.
    pub(crate) fn from_parts(
        manifest: Manifest,
        collections: Collections,
        media_files: BTreeMap<String, Vec<u8>>,
    ) -> Self {
        let issued = collections.max_ids();
        Self {
            manifest,
            collections,
            media_files,
            issued,
        }
    }

    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn locations(&self) -> &[Location] {
        &self.collections.locations
    }

    #[must_use]
    pub fn sectors(&self) -> &[Sector] {
        &self.collections.sectors
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.collections.routes
    }

    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.collections.sessions
    }

    #[must_use]
    pub fn climbs(&self) -> &[Climb] {
        &self.collections.climbs
    }

    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.collections.tags
    }

    #[must_use]
    pub fn media(&self) -> &[MediaItem] {
        &self.collections.media
    }

    /// Embedded media bytes keyed by container path (`media/...`).
    #[must_use]
    pub const fn media_files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.media_files
    }

    /// Any collection, by record type.
    #[must_use]
    pub fn records<T: Record>(&self) -> &[T] {
        T::within(&self.collections)
    }

    /// In-place access for crate passes that touch fields the builder's
    /// checks don't cover, such as CLIDs.
    pub(crate) fn records_mut<T: Record>(&mut self) -> &mut Vec<T> {
        T::within_mut(&mut self.collections)
    }

    /// First record of type `T` with local id `id`.
    #[must_use]
    pub fn get<T: Record>(&self, id: u32) -> Option<&T> {
        self.records::<T>().iter().find(|r| r.id() == id)
    }

    #[must_use]
    pub const fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Counts of the collections as they actually are.
    #[must_use]
    pub fn stats(&self) -> Stats {
        Stats::of(&self.collections)
    }

    /// Same archive with manifest stats matching the collections.
    #[must_use]
    pub fn with_recomputed_stats(mut self) -> Self {
        self.manifest.stats = self.stats();
        self
    }

    /// Continue editing; ids keep counting from where this archive left off.
    #[must_use]
    pub fn into_builder(self) -> ArchiveBuilder {
        ArchiveBuilder { archive: self }
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Produces a new [`Archive`] one validated change at a time.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    archive: Archive,
}

impl ArchiveBuilder {
    /// Add a record, assigning it the next local id of its kind.
    ///
    /// The record's own `id` is ignored. Field-level problems and a CLID of
    /// the wrong entity type are rejected here, before the record is stored.
    pub fn add<T: Record>(&mut self, mut record: T) -> Result<u32, CldfError> {
        let next = self
            .archive
            .issued
            .get(&T::KIND)
            .copied()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| {
                CldfError::schema(T::KIND.document(), format!("{} id space exhausted", T::KIND))
            })?;
        record.set_id(next);
        record.check()?;
        record.check_clid()?;

        self.archive.issued.insert(T::KIND, next);
        T::within_mut(&mut self.archive.collections).push(record);
        Ok(next)
    }

    /// Remove a record by id. Its id is not reused.
    pub fn remove<T: Record>(&mut self, id: u32) -> Option<T> {
        let records = T::within_mut(&mut self.archive.collections);
        let index = records.iter().position(|r| r.id() == id)?;
        Some(records.remove(index))
    }

    /// Replace a record in place, keeping its id.
    pub fn replace<T: Record>(&mut self, record: T) -> Result<(), CldfError> {
        record.check()?;
        record.check_clid()?;
        let id = record.id();
        let records = T::within_mut(&mut self.archive.collections);
        let slot = records.iter_mut().find(|r| r.id() == id).ok_or_else(|| {
            CldfError::schema(T::KIND.document(), format!("{} {id} does not exist", T::KIND))
        })?;
        *slot = record;
        Ok(())
    }

    /// Embed raw media bytes under `media/`.
    pub fn embed_media_file(
        &mut self,
        path: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<(), CldfError> {
        let path = path.into();
        check_media_path(&path)?;
        self.archive.media_files.insert(path, bytes);
        Ok(())
    }

    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.archive.manifest
    }

    /// Finish; manifest stats are recomputed from the collections.
    #[must_use]
    pub fn build(self) -> Archive {
        self.archive.with_recomputed_stats()
    }
}

/// Embedded paths live under `media/` and never escape it.
pub(crate) fn check_media_path(path: &str) -> Result<(), CldfError> {
    let rest = path.strip_prefix(MEDIA_DIR_PREFIX).unwrap_or_default();
    let escapes = rest
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == "..");
    if rest.is_empty() || escapes || path.contains('\\') {
        return Err(CldfError::schema(
            crate::primitives::MEDIA_METADATA_JSON,
            format!("embedded media path '{path}' must be a relative file under {MEDIA_DIR_PREFIX}"),
        ));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
