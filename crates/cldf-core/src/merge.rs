//! # Merge Engine
//!
//! Combines any number of archives into one whose local ids are unique per
//! collection and whose references all resolve.
//!
//! Kinds are merged in dependency order (locations, sectors, routes,
//! sessions, tags, climbs, media), so when a record is relinked every id it
//! can point to already has its new value in the remap table. Within one
//! archive records are taken in ascending id order; archives are taken in
//! input order. The output is a pure function of the input list.
//!
//! ## Deduplication
//!
//! - Records sharing a CLID collapse into the first one seen.
//! - Tags collapse by case-insensitive name; predefined tags also by key.
//!
//! A collapsed record maps onto its survivor, so whatever referenced it
//! follows along.
//!
//! ## Modes
//!
//! Strict merges refuse inputs that fail validation and abort on the first
//! reference that cannot be resolved. Lenient merges drop the offending
//! record (and, transitively, anything that pointed at it) and list it in
//! the report.

use crate::clid::Clid;
use crate::config::CodecConfig;
use crate::model::archive::Collections;
use crate::model::entities::{Climb, Location, MediaItem, Route, Sector, Session, Tag};
use crate::model::enums::PredefinedTagKey;
use crate::model::record::{Record, Relink};
use crate::model::{Archive, Stats};
use crate::primitives::{FORMAT_TAG, FORMAT_VERSION};
use crate::types::{CldfError, Mode, RecordKind};
use crate::verifier::{errors_as_text, validate};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// REPORT
// =============================================================================

/// What a merge did besides producing the archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Actual collection counts of each input, in input order.
    pub per_archive_counts: Vec<Stats>,
    /// Records whose local id was already taken by an earlier input.
    pub collisions_resolved: u32,
    /// Tags folded into an earlier tag of the same name or key.
    pub tags_deduped: u32,
    /// Records folded into an earlier record with the same CLID.
    pub clid_duplicates: u32,
    /// Records left out of the output, with the reason.
    #[serde(serialize_with = "errors_as_text")]
    pub dropped: Vec<CldfError>,
    pub warnings: Vec<String>,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Entry point for merging.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine {
    mode: Mode,
}

impl MergeEngine {
    #[must_use]
    pub const fn new(mode: Mode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub const fn from_config(config: &CodecConfig) -> Self {
        Self::new(config.mode)
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Merge `archives` in order.
    ///
    /// The manifest is taken from the first input, with the latest creation
    /// date of all inputs and stats recomputed.
    ///
    /// # Errors
    ///
    /// - `MergeConflict` for an empty input list
    /// - Strict mode: the first error of any input that fails validation,
    ///   or a `Referential` error for a reference the merge cannot resolve
    pub fn merge(&self, archives: &[Archive]) -> Result<(Archive, MergeReport), CldfError> {
        let Some(first) = archives.first() else {
            return Err(CldfError::MergeConflict("no archives to merge".to_string()));
        };
        tracing::info!(inputs = archives.len(), mode = ?self.mode, "merge started");

        let mut merger = Merger::new(self.mode);
        for (index, archive) in archives.iter().enumerate() {
            merger.preflight(index, archive)?;
        }

        merger.merge_kind::<Location>(archives)?;
        merger.merge_kind::<Sector>(archives)?;
        merger.merge_kind::<Route>(archives)?;
        merger.merge_kind::<Session>(archives)?;
        merger.merge_tags(archives)?;
        merger.merge_kind::<Climb>(archives)?;
        merger.merge_kind::<MediaItem>(archives)?;

        let mut media_files = BTreeMap::new();
        for (index, archive) in archives.iter().enumerate() {
            for (path, bytes) in archive.media_files() {
                match media_files.get(path) {
                    None => {
                        media_files.insert(path.clone(), bytes.clone());
                    }
                    Some(kept) if kept != bytes => merger.report.warnings.push(format!(
                        "media file '{path}' of archive #{index} differs from an earlier copy; kept the first"
                    )),
                    Some(_) => {}
                }
            }
        }

        let mut manifest = first.manifest().clone();
        manifest.format = FORMAT_TAG.to_string();
        manifest.version = FORMAT_VERSION.to_string();
        manifest.creation_date = archives
            .iter()
            .map(|a| a.manifest().creation_date)
            .max()
            .unwrap_or(manifest.creation_date);

        let Merger {
            collections,
            report,
            ..
        } = merger;
        let merged = Archive::from_parts(manifest, collections, media_files).with_recomputed_stats();

        if let Some(err) = validate(&merged).first_error() {
            return Err(CldfError::MergeConflict(format!(
                "merged archive failed validation: {err}"
            )));
        }

        tracing::info!(
            climbs = merged.climbs().len(),
            sessions = merged.sessions().len(),
            collisions = report.collisions_resolved,
            tags_deduped = report.tags_deduped,
            clid_duplicates = report.clid_duplicates,
            dropped = report.dropped.len(),
            "merge complete"
        );
        Ok((merged, report))
    }
}

// =============================================================================
// REMAP TABLE
// =============================================================================

/// `(input index, kind, old id) -> new id`.
type Table = BTreeMap<(usize, RecordKind, u32), u32>;

/// The remap table seen from one input archive.
struct Remap<'a> {
    table: &'a Table,
    tag_names: &'a BTreeMap<String, String>,
    source: usize,
}

impl Relink for Remap<'_> {
    fn resolve(&self, target: RecordKind, id: u32) -> Option<u32> {
        self.table.get(&(self.source, target, id)).copied()
    }

    fn tag_name(&self, name: &str) -> Option<String> {
        self.tag_names.get(&name.trim().to_lowercase()).cloned()
    }
}

// =============================================================================
// MERGER
// =============================================================================

/// State of one merge in progress.
struct Merger {
    mode: Mode,
    collections: Collections,
    table: Table,
    issued: BTreeMap<RecordKind, u32>,
    /// Surviving record per CLID: (new id, input index).
    clids: BTreeMap<Clid, (u32, usize)>,
    /// Old ids already used by an earlier input, per kind.
    taken: BTreeSet<(RecordKind, u32)>,
    /// Lowercased tag name -> surviving spelling.
    tag_names: BTreeMap<String, String>,
    tag_ids: BTreeMap<String, u32>,
    tag_keys: BTreeMap<PredefinedTagKey, u32>,
    report: MergeReport,
}

impl Merger {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            collections: Collections::default(),
            table: Table::new(),
            issued: BTreeMap::new(),
            clids: BTreeMap::new(),
            taken: BTreeSet::new(),
            tag_names: BTreeMap::new(),
            tag_ids: BTreeMap::new(),
            tag_keys: BTreeMap::new(),
            report: MergeReport::default(),
        }
    }

    fn preflight(&mut self, index: usize, archive: &Archive) -> Result<(), CldfError> {
        self.report.per_archive_counts.push(archive.stats());
        let report = validate(archive);
        if report.valid {
            return Ok(());
        }
        if self.mode.is_strict() {
            let err = report.first_error().cloned().unwrap_or_else(|| {
                CldfError::Structure(format!("archive #{index} failed validation"))
            });
            tracing::warn!(input = index, error = %err, "merge input rejected");
            return Err(err);
        }
        self.report.warnings.push(format!(
            "archive #{index} failed validation with {} error(s); invalid records will be dropped",
            report.errors.len()
        ));
        Ok(())
    }

    /// Strict: abort. Lenient: record and carry on.
    fn reject(&mut self, err: CldfError) -> Result<(), CldfError> {
        if self.mode.is_strict() {
            return Err(err);
        }
        tracing::warn!(error = %err, "record dropped from merge");
        self.report.dropped.push(err);
        Ok(())
    }

    fn next_id(&mut self, kind: RecordKind) -> Result<u32, CldfError> {
        let slot = self.issued.entry(kind).or_insert(0);
        *slot = slot.checked_add(1).ok_or_else(|| {
            CldfError::MergeConflict(format!("{kind} id space exhausted"))
        })?;
        Ok(*slot)
    }

    /// Records of `T` from `archive` in ascending id order, first of each id.
    fn candidates<'a, T: Record>(
        &mut self,
        archive: &'a Archive,
    ) -> Result<Vec<&'a T>, CldfError> {
        let mut records: Vec<&T> = archive.records::<T>().iter().collect();
        records.sort_by_key(|r| r.id());

        let mut seen = BTreeSet::new();
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id()) {
                self.reject(CldfError::schema(
                    T::KIND.document(),
                    format!("duplicate {} id {}", T::KIND, record.id()),
                ))?;
                continue;
            }
            if let Err(err) = record.check().and_then(|()| record.check_clid()) {
                self.reject(err)?;
                continue;
            }
            kept.push(record);
        }
        Ok(kept)
    }

    /// Relink a copy of `record`, or report the reference that didn't resolve.
    fn relinked<T: Record>(&mut self, source: usize, record: &T) -> Result<Option<T>, CldfError> {
        let mut copy = record.clone();
        let remap = Remap {
            table: &self.table,
            tag_names: &self.tag_names,
            source,
        };
        match copy.relink(&remap) {
            Ok(()) => Ok(Some(copy)),
            Err(dangling) => {
                self.reject(CldfError::Referential {
                    entity: T::KIND,
                    id: record.id(),
                    field: dangling.field,
                    target: dangling.target,
                    missing: dangling.id,
                })?;
                Ok(None)
            }
        }
    }

    fn note_collision(&mut self, kind: RecordKind, source: usize, old: u32) {
        if source > 0 && self.taken.contains(&(kind, old)) {
            self.report.collisions_resolved += 1;
        }
    }

    fn merge_kind<T: Record>(&mut self, archives: &[Archive]) -> Result<(), CldfError> {
        for (source, archive) in archives.iter().enumerate() {
            let mut used = Vec::new();
            for record in self.candidates::<T>(archive)? {
                let old = record.id();
                let Some(mut merged) = self.relinked(source, record)? else {
                    continue;
                };
                self.note_collision(T::KIND, source, old);
                used.push(old);

                if let Some(clid) = merged.clid().copied()
                    && let Some(&(survivor_id, survivor_source)) = self.clids.get(&clid)
                {
                    self.table.insert((source, T::KIND, old), survivor_id);
                    self.report.clid_duplicates += 1;
                    merged.set_id(survivor_id);
                    if let Some(survivor) = T::within(&self.collections)
                        .iter()
                        .find(|r| r.id() == survivor_id)
                        && *survivor != merged
                    {
                        let fields = differing_fields(survivor, &merged).join(", ");
                        self.report.warnings.push(format!(
                            "{} {clid}: archive #{source} differs from archive #{survivor_source} in [{fields}]; kept the first",
                            T::KIND
                        ));
                    }
                    tracing::debug!(kind = %T::KIND, %clid, from = old, to = survivor_id, "collapsed by CLID");
                    continue;
                }

                let new = self.next_id(T::KIND)?;
                merged.set_id(new);
                self.table.insert((source, T::KIND, old), new);
                if let Some(clid) = merged.clid().copied() {
                    self.clids.insert(clid, (new, source));
                }
                T::within_mut(&mut self.collections).push(merged);
            }
            self.taken.extend(used.into_iter().map(|id| (T::KIND, id)));
        }
        tracing::debug!(kind = %T::KIND, count = self.collections.len(T::KIND), "kind merged");
        Ok(())
    }

    fn merge_tags(&mut self, archives: &[Archive]) -> Result<(), CldfError> {
        for (source, archive) in archives.iter().enumerate() {
            let mut used = Vec::new();
            for tag in self.candidates::<Tag>(archive)? {
                let old = tag.id;
                self.note_collision(RecordKind::Tag, source, old);
                used.push(old);

                let key = tag.dedup_key();
                let survivor = tag
                    .predefined_tag_key
                    .filter(|_| tag.is_predefined)
                    .and_then(|k| self.tag_keys.get(&k).copied())
                    .or_else(|| self.tag_ids.get(&key).copied());

                if let Some(survivor_id) = survivor {
                    self.table.insert((source, RecordKind::Tag, old), survivor_id);
                    self.report.tags_deduped += 1;
                    // Both the name and the predefined key now lead to the survivor.
                    if tag.is_predefined
                        && let Some(k) = tag.predefined_tag_key
                    {
                        self.tag_keys.entry(k).or_insert(survivor_id);
                    }
                    self.tag_ids.entry(key.clone()).or_insert(survivor_id);
                    if let Some(kept) = self.collections.tags.iter().find(|t| t.id == survivor_id) {
                        let spelling = kept.name.clone();
                        self.tag_names.entry(key).or_insert(spelling);
                    }
                    tracing::debug!(tag = %tag.name, to = survivor_id, "tag deduplicated");
                    continue;
                }

                let new = self.next_id(RecordKind::Tag)?;
                let mut merged = tag.clone();
                merged.id = new;
                self.table.insert((source, RecordKind::Tag, old), new);
                self.tag_names.insert(key.clone(), merged.name.clone());
                self.tag_ids.insert(key, new);
                if merged.is_predefined
                    && let Some(k) = merged.predefined_tag_key
                {
                    self.tag_keys.entry(k).or_insert(new);
                }
                self.collections.tags.push(merged);
            }
            self.taken.extend(used.into_iter().map(|id| (RecordKind::Tag, id)));
        }
        Ok(())
    }
}

/// Top-level JSON fields on which two records disagree.
fn differing_fields<T: Serialize>(a: &T, b: &T) -> Vec<String> {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(Value::Object(a)), Ok(Value::Object(b))) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            keys.into_iter()
                .filter(|k| a.get(*k) != b.get(*k))
                .cloned()
                .collect()
        }
        _ => Vec::new(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clid::EntityType;
    use crate::model::entities::TagRef;
    use crate::model::enums::{ClimbType, FinishType, Platform};
    use crate::model::time::parse_timestamp;
    use crate::model::Manifest;
    use chrono::NaiveDate;

    fn manifest(date: &str) -> Manifest {
        Manifest::new("1.0", Platform::Ios, parse_timestamp(date).unwrap())
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    /// One location, one session, one climb tagged `tag`.
    fn log(location: &str, tag: &str, date: &str) -> Archive {
        let mut b = Archive::builder(manifest(date));
        let loc = b.add(Location::new(location, true)).unwrap();
        let session = b.add(Session::new(day(), loc)).unwrap();
        let tag_id = b.add(Tag::custom(tag)).unwrap();
        let mut climb = Climb::new(session, day(), ClimbType::Boulder, FinishType::Flash);
        climb.tags = Some(vec![TagRef::Id(tag_id)]);
        b.add(climb).unwrap();
        b.build()
    }

    #[test]
    fn empty_input_is_conflict() {
        let err = MergeEngine::default().merge(&[]).unwrap_err();
        assert!(matches!(err, CldfError::MergeConflict(_)));
    }

    #[test]
    fn ids_are_renumbered_and_references_follow() {
        let a = log("Gym", "crimpy", "2024-01-15T10:00:00+00:00");
        let b = log("Crag", "slopey", "2024-02-01T10:00:00+00:00");
        let (merged, report) = MergeEngine::default().merge(&[a, b]).unwrap();

        let ids: Vec<u32> = merged.locations().iter().map(|l| l.id).collect();
        assert_eq!(ids, [1, 2]);
        assert_eq!(merged.sessions()[1].location_id, 2);
        assert_eq!(merged.climbs()[1].session_id, 2);
        assert_eq!(merged.climbs()[1].tags, Some(vec![TagRef::Id(2)]));
        assert!(report.collisions_resolved >= 4);
        assert_eq!(
            merged.manifest().creation_date,
            parse_timestamp("2024-02-01T10:00:00+00:00").unwrap()
        );
        assert_eq!(merged.manifest().stats.climbs_count, 2);
        assert_eq!(report.per_archive_counts.len(), 2);
    }

    #[test]
    fn tags_collapse_case_insensitively() {
        let a = log("Gym", "crimpy", "2024-01-15T10:00:00+00:00");
        let b = log("Crag", "Crimpy", "2024-01-15T10:00:00+00:00");
        let (merged, report) = MergeEngine::default().merge(&[a, b]).unwrap();
        assert_eq!(merged.tags().len(), 1);
        assert_eq!(report.tags_deduped, 1);
        for climb in merged.climbs() {
            assert_eq!(climb.tags, Some(vec![TagRef::Id(1)]));
        }
    }

    #[test]
    fn predefined_key_follows_name_collapse() {
        let custom = log("Gym", "crimpy", "2024-01-15T10:00:00+00:00");

        let mut b = Archive::builder(manifest("2024-01-15T10:00:00+00:00"));
        b.add(Tag::predefined(PredefinedTagKey::Crimpy)).unwrap();

        let mut c = Archive::builder(manifest("2024-01-15T10:00:00+00:00"));
        let mut renamed = Tag::predefined(PredefinedTagKey::Crimpy);
        renamed.name = "Crimps".to_string();
        let renamed_id = c.add(renamed).unwrap();
        let loc = c.add(Location::new("Crag", false)).unwrap();
        let session = c.add(Session::new(day(), loc)).unwrap();
        let mut climb = Climb::new(session, day(), ClimbType::Boulder, FinishType::Top);
        climb.tags = Some(vec![TagRef::Id(renamed_id)]);
        c.add(climb).unwrap();

        let (merged, report) = MergeEngine::default()
            .merge(&[custom, b.build(), c.build()])
            .unwrap();
        assert_eq!(merged.tags().len(), 1);
        assert_eq!(report.tags_deduped, 2);
        assert_eq!(merged.climbs()[1].tags, Some(vec![TagRef::Id(1)]));
    }

    #[test]
    fn tag_names_are_canonicalized() {
        let a = log("Gym", "crimpy", "2024-01-15T10:00:00+00:00");
        let mut b = Archive::builder(manifest("2024-01-15T10:00:00+00:00"));
        let loc = b.add(Location::new("Crag", false)).unwrap();
        let session = b.add(Session::new(day(), loc)).unwrap();
        let mut climb = Climb::new(session, day(), ClimbType::Boulder, FinishType::Top);
        climb.tags = Some(vec![TagRef::from("CRIMPY"), TagRef::from("dyno")]);
        b.add(climb).unwrap();

        let (merged, _) = MergeEngine::default().merge(&[a, b.build()]).unwrap();
        assert_eq!(
            merged.climbs()[1].tags,
            Some(vec![TagRef::from("crimpy"), TagRef::from("dyno")])
        );
    }

    #[test]
    fn shared_clid_collapses_to_first() {
        let clid = Clid::generate(EntityType::Location);
        let mut a = Archive::builder(manifest("2024-01-15T10:00:00+00:00"));
        let mut gym = Location::new("Gym", true);
        gym.clid = Some(clid);
        a.add(gym.clone()).unwrap();

        let mut b = Archive::builder(manifest("2024-01-15T10:00:00+00:00"));
        b.add(Location::new("Filler", true)).unwrap();
        gym.city = Some("Boulder".to_string());
        let gym_b = b.add(gym).unwrap();
        b.add(Session::new(day(), gym_b)).unwrap();

        let (merged, report) = MergeEngine::default()
            .merge(&[a.build(), b.build()])
            .unwrap();
        assert_eq!(merged.locations().len(), 2);
        assert_eq!(report.clid_duplicates, 1);
        assert_eq!(merged.sessions()[0].location_id, 1);
        assert_eq!(merged.locations()[0].city, None);
        assert!(report.warnings.iter().any(|w| w.contains("city")), "{:?}", report.warnings);
    }

    fn dangling() -> Archive {
        let mut b = Archive::builder(manifest("2024-01-15T10:00:00+00:00"));
        let loc = b.add(Location::new("Gym", true)).unwrap();
        b.add(Session::new(day(), loc)).unwrap();
        b.add(Climb::new(1, day(), ClimbType::Boulder, FinishType::Top)).unwrap();
        b.add(Climb::new(5, day(), ClimbType::Boulder, FinishType::Top)).unwrap();
        b.build()
    }

    #[test]
    fn strict_merge_refuses_dangling_reference() {
        let err = MergeEngine::new(Mode::Strict).merge(&[dangling()]).unwrap_err();
        assert!(matches!(
            err,
            CldfError::Referential {
                entity: RecordKind::Climb,
                missing: 5,
                ..
            }
        ));
    }

    #[test]
    fn lenient_merge_drops_dangling_record() {
        let (merged, report) = MergeEngine::new(Mode::Lenient).merge(&[dangling()]).unwrap();
        assert_eq!(merged.climbs().len(), 1);
        assert_eq!(report.dropped.len(), 1);
        assert!(validate(&merged).valid);
    }

    #[test]
    fn lenient_drop_cascades() {
        let mut b = Archive::builder(manifest("2024-01-15T10:00:00+00:00"));
        let session = b.add(Session::new(day(), 99)).unwrap();
        b.add(Climb::new(session, day(), ClimbType::Boulder, FinishType::Top)).unwrap();

        let (merged, report) = MergeEngine::new(Mode::Lenient).merge(&[b.build()]).unwrap();
        assert!(merged.sessions().is_empty());
        assert!(merged.climbs().is_empty());
        assert_eq!(report.dropped.len(), 2);
    }

    #[test]
    fn media_file_conflict_keeps_first() {
        let mut a = Archive::builder(manifest("2024-01-15T10:00:00+00:00"));
        a.embed_media_file("media/a.jpg", vec![1]).unwrap();
        let mut b = Archive::builder(manifest("2024-01-15T10:00:00+00:00"));
        b.embed_media_file("media/a.jpg", vec![2]).unwrap();
        b.embed_media_file("media/b.jpg", vec![3]).unwrap();

        let (merged, report) = MergeEngine::default()
            .merge(&[a.build(), b.build()])
            .unwrap();
        assert_eq!(merged.media_files()["media/a.jpg"], vec![1]);
        assert_eq!(merged.media_files().len(), 2);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn merge_is_deterministic() {
        let inputs = [
            log("Gym", "crimpy", "2024-01-15T10:00:00+00:00"),
            log("Crag", "Crimpy", "2024-01-16T10:00:00+00:00"),
        ];
        let engine = MergeEngine::default();
        assert_eq!(engine.merge(&inputs).unwrap(), engine.merge(&inputs).unwrap());
    }
}
