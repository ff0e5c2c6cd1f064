//! # Integrity Verifier
//!
//! Checksum, structural and referential validation of an archive.
//!
//! Every check runs to completion: one call surfaces every problem in the
//! archive, not just the first. Findings are produced in a fixed order
//! (checksums, decode findings, structure, then per-kind checks in
//! dependency order, references, tags, business rules) so two runs over the
//! same input produce the same report.
//!
//! The verifier never aborts. Whether a finding is fatal is the caller's
//! decision (see [`Mode`](crate::Mode)).

use crate::formats::{ChecksumsDocument, Container, DigestAlgorithm, decode_json};
use crate::model::entities::{Climb, Location, MediaItem, Route, Sector, Session, Tag};
use crate::model::enums::MediaSource;
use crate::model::record::{Record, schema_problem};
use crate::model::time::{self, Timestamp, timestamp};
use crate::model::{Archive, Stats};
use crate::primitives::{CHECKSUMS_JSON, FORMAT_TAG, FORMAT_VERSION, MEDIA_DIR_PREFIX};
use crate::types::{CldfError, Mode, RecordKind};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// REPORT
// =============================================================================

/// Outcome of validating one archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(with = "timestamp")]
    pub timestamp: Timestamp,
    pub structure_valid: bool,
    /// `None` when the container carried no checksums document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_result: Option<ChecksumResult>,
    /// Actual collection sizes.
    pub statistics: Stats,
    #[serde(serialize_with = "errors_as_text")]
    pub errors: Vec<CldfError>,
    pub warnings: Vec<String>,
    pub valid: bool,
}

impl ValidationReport {
    /// First error in report order; what strict callers abort with.
    #[must_use]
    pub fn first_error(&self) -> Option<&CldfError> {
        self.errors.first()
    }
}

pub(crate) fn errors_as_text<S: Serializer>(errors: &[CldfError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(ToString::to_string))
}

/// Per-document checksum verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumResult {
    pub algorithm: String,
    pub valid: bool,
    pub files: BTreeMap<String, bool>,
}

// =============================================================================
// CHECKSUMS
// =============================================================================

/// Result of checking a container against its checksums document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChecksumCheck {
    pub result: Option<ChecksumResult>,
    pub errors: Vec<CldfError>,
    pub warnings: Vec<String>,
}

/// Recompute every listed digest and compare.
///
/// Mismatches and listed-but-missing members are integrity errors naming
/// the member. A member the document doesn't list is an integrity error in
/// strict mode and a warning in lenient mode. Digests compare exactly; the
/// writer only emits lowercase hex.
#[must_use]
pub fn verify_checksums(container: &Container, mode: Mode) -> ChecksumCheck {
    let mut check = ChecksumCheck {
        result: None,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let Some(bytes) = container.get(CHECKSUMS_JSON) else {
        check
            .warnings
            .push(format!("no {CHECKSUMS_JSON}; document integrity not verified"));
        return check;
    };

    let document = decode_json::<ChecksumsDocument>(CHECKSUMS_JSON, bytes).map_err(|e| {
        CldfError::Integrity {
            document: CHECKSUMS_JSON.to_string(),
            detail: e.to_string(),
        }
    });
    let (document, algorithm) = match document.and_then(|d| d.algorithm().map(|a| (d, a))) {
        Ok(parsed) => parsed,
        Err(e) => {
            check.result = Some(ChecksumResult {
                algorithm: String::new(),
                valid: false,
                files: BTreeMap::new(),
            });
            check.errors.push(e);
            return check;
        }
    };

    let files = compare(container, &document, algorithm, &mut check.errors);
    for name in container.names() {
        if name == CHECKSUMS_JSON || document.files.contains_key(name) {
            continue;
        }
        let detail = format!("not listed in {CHECKSUMS_JSON}");
        if mode.is_strict() {
            check.errors.push(CldfError::Integrity {
                document: name.to_string(),
                detail,
            });
        } else {
            check.warnings.push(format!("member '{name}' is {detail}"));
        }
    }

    check.result = Some(ChecksumResult {
        algorithm: algorithm.name().to_string(),
        valid: check.errors.is_empty(),
        files,
    });
    check
}

fn compare(
    container: &Container,
    document: &ChecksumsDocument,
    algorithm: DigestAlgorithm,
    errors: &mut Vec<CldfError>,
) -> BTreeMap<String, bool> {
    let mut files = BTreeMap::new();
    for (name, expected) in &document.files {
        let ok = match container.get(name) {
            None => {
                errors.push(CldfError::Integrity {
                    document: name.clone(),
                    detail: format!("listed in {CHECKSUMS_JSON} but missing from the container"),
                });
                false
            }
            Some(bytes) => {
                let actual = algorithm.digest_hex(bytes);
                let matches = actual == *expected;
                if !matches {
                    errors.push(CldfError::Integrity {
                        document: name.clone(),
                        detail: format!("{algorithm} mismatch: expected {expected}, computed {actual}"),
                    });
                }
                matches
            }
        };
        files.insert(name.clone(), ok);
    }
    files
}

// =============================================================================
// VERIFIER
// =============================================================================

/// Validates one archive, optionally folding in findings from decoding.
#[derive(Debug, Clone)]
pub struct Verifier<'a> {
    archive: &'a Archive,
    file: Option<String>,
    checksums: Option<ChecksumCheck>,
    prior_errors: Vec<CldfError>,
    prior_warnings: Vec<String>,
}

/// Validate an in-memory archive.
#[must_use]
pub fn validate(archive: &Archive) -> ValidationReport {
    Verifier::new(archive).validate()
}

impl<'a> Verifier<'a> {
    #[must_use]
    pub fn new(archive: &'a Archive) -> Self {
        Self {
            archive,
            file: None,
            checksums: None,
            prior_errors: Vec::new(),
            prior_warnings: Vec::new(),
        }
    }

    /// Name the report after the file it came from.
    #[must_use]
    pub fn for_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub(crate) fn with_checksums(mut self, check: ChecksumCheck) -> Self {
        self.checksums = Some(check);
        self
    }

    pub(crate) fn with_findings(mut self, errors: Vec<CldfError>, warnings: Vec<String>) -> Self {
        self.prior_errors.extend(errors);
        self.prior_warnings.extend(warnings);
        self
    }

    /// Run every check.
    #[must_use]
    pub fn validate(self) -> ValidationReport {
        let archive = self.archive;
        let mut findings = Findings::default();

        let checksum_result = self.checksums.and_then(|check| {
            findings.errors.extend(check.errors);
            findings.warnings.extend(check.warnings);
            check.result
        });
        findings.errors.extend(self.prior_errors);
        findings.warnings.extend(self.prior_warnings);

        let structure_valid = findings.structure(archive);

        let mut ids = BTreeMap::new();
        ids.insert(RecordKind::Location, findings.records::<Location>(archive));
        ids.insert(RecordKind::Sector, findings.records::<Sector>(archive));
        ids.insert(RecordKind::Route, findings.records::<Route>(archive));
        ids.insert(RecordKind::Session, findings.records::<Session>(archive));
        ids.insert(RecordKind::Tag, findings.records::<Tag>(archive));
        ids.insert(RecordKind::Climb, findings.records::<Climb>(archive));
        ids.insert(RecordKind::Media, findings.records::<MediaItem>(archive));

        findings.references::<Sector>(archive, &ids);
        findings.references::<Route>(archive, &ids);
        findings.references::<Session>(archive, &ids);
        findings.references::<Climb>(archive, &ids);
        findings.references::<MediaItem>(archive, &ids);

        findings.tag_names(archive.tags());
        findings.business_rules(archive);

        let checksums_ok = checksum_result.as_ref().is_none_or(|c| c.valid);
        let valid = structure_valid && checksums_ok && findings.errors.is_empty();

        for error in &findings.errors {
            tracing::warn!(%error, "validation error");
        }
        for warning in &findings.warnings {
            tracing::debug!(%warning, "validation warning");
        }
        tracing::info!(
            file = self.file.as_deref().unwrap_or("<memory>"),
            valid,
            errors = findings.errors.len(),
            warnings = findings.warnings.len(),
            "archive validated"
        );

        ValidationReport {
            file: self.file,
            timestamp: time::now(),
            structure_valid,
            checksum_result,
            statistics: archive.stats(),
            errors: findings.errors,
            warnings: findings.warnings,
            valid,
        }
    }
}

// =============================================================================
// CHECKS
// =============================================================================

#[derive(Debug, Default)]
struct Findings {
    errors: Vec<CldfError>,
    warnings: Vec<String>,
}

impl Findings {
    /// Manifest identity and stats against the collections.
    fn structure(&mut self, archive: &Archive) -> bool {
        let manifest = archive.manifest();
        let mut ok = true;

        if manifest.format != FORMAT_TAG {
            self.errors.push(CldfError::Structure(format!(
                "manifest format is '{}', expected '{FORMAT_TAG}'",
                manifest.format
            )));
            ok = false;
        }
        let major = |v: &str| v.split('.').next().map(str::to_string);
        if major(&manifest.version) != major(FORMAT_VERSION) {
            self.warnings.push(format!(
                "manifest version {} differs from supported {FORMAT_VERSION}",
                manifest.version
            ));
        }

        let actual = archive.stats();
        for kind in RecordKind::ALL {
            let declared = manifest.stats.count(kind);
            let found = actual.count(kind);
            if declared > 0 && found == 0 {
                self.errors.push(CldfError::Structure(format!(
                    "manifest declares {declared} {kind} records but {} is missing or empty",
                    kind.document()
                )));
                ok = false;
            } else if declared != found {
                self.warnings.push(format!(
                    "manifest stats declare {declared} {kind} records, found {found}"
                ));
            }
        }
        ok
    }

    /// Field invariants, CLID hygiene and id uniqueness for one kind.
    /// Returns the ids present.
    fn records<T: Record>(&mut self, archive: &Archive) -> BTreeSet<u32> {
        let mut ids = BTreeSet::new();
        let mut clids = BTreeMap::new();
        for record in archive.records::<T>() {
            let id = record.id();
            if id == 0 {
                self.errors.push(schema_problem::<T>(id, "id must be a positive integer"));
            } else if !ids.insert(id) {
                self.errors.push(schema_problem::<T>(id, "duplicate id"));
            }
            for problem in record.problems() {
                self.errors.push(schema_problem::<T>(id, &problem));
            }
            if let Err(e) = record.check_clid() {
                self.errors.push(e);
            }
            if let Some(clid) = record.clid()
                && let Some(first) = clids.insert(*clid, id)
            {
                self.errors.push(schema_problem::<T>(
                    id,
                    &format!("CLID {clid} already used by {} {first}", T::KIND),
                ));
            }
        }
        ids
    }

    /// Every foreign key must resolve inside this archive.
    fn references<T: Record>(&mut self, archive: &Archive, ids: &BTreeMap<RecordKind, BTreeSet<u32>>) {
        for record in archive.records::<T>() {
            for reference in record.references() {
                let resolves = ids
                    .get(&reference.target)
                    .is_some_and(|set| set.contains(&reference.id));
                if !resolves {
                    self.errors.push(CldfError::Referential {
                        entity: T::KIND,
                        id: record.id(),
                        field: reference.field,
                        target: reference.target,
                        missing: reference.id,
                    });
                }
            }
        }
    }

    /// Exact duplicates are errors, case-only duplicates are warnings.
    fn tag_names(&mut self, tags: &[Tag]) {
        let mut exact: BTreeMap<&str, u32> = BTreeMap::new();
        let mut folded: BTreeMap<String, &Tag> = BTreeMap::new();
        for tag in tags {
            if let Some(first) = exact.insert(tag.name.as_str(), tag.id) {
                self.errors.push(schema_problem::<Tag>(
                    tag.id,
                    &format!("name '{}' duplicates tag {first}", tag.name),
                ));
                continue;
            }
            if let Some(first) = folded.insert(tag.dedup_key(), tag) {
                self.warnings.push(format!(
                    "tags {} '{}' and {} '{}' differ only by case",
                    first.id, first.name, tag.id, tag.name
                ));
            }
        }
    }

    fn business_rules(&mut self, archive: &Archive) {
        let today = time::now().date_naive();
        let mut per_day: BTreeMap<(chrono::NaiveDate, String), u32> = BTreeMap::new();
        for climb in archive.climbs() {
            if climb.date > today {
                self.warnings
                    .push(format!("climb {} is dated in the future ({})", climb.id, climb.date));
            }
            if let Some(name) = climb.route_name.as_deref().map(str::trim)
                && !name.is_empty()
            {
                *per_day.entry((climb.date, name.to_lowercase())).or_default() += 1;
            }
        }
        for ((date, name), count) in per_day {
            if count > 1 {
                self.warnings
                    .push(format!("route '{name}' logged {count} times on {date}"));
            }
        }

        for item in archive.media() {
            if item.source == Some(MediaSource::Embedded)
                && let Some(path) = item.path.as_deref()
                && path.starts_with(MEDIA_DIR_PREFIX)
                && !archive.media_files().contains_key(path)
            {
                self.warnings.push(format!(
                    "media {} is embedded at '{path}' but the file is not in the archive",
                    item.id
                ));
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::model::enums::{ClimbType, FinishType, Platform};
    use crate::model::time::parse_timestamp;
    use crate::model::{Collections, Manifest, TagRef};
    use chrono::NaiveDate;

    fn manifest() -> Manifest {
        Manifest::new(
            "1.0",
            Platform::Web,
            parse_timestamp("2024-01-15T10:30:00+00:00").unwrap(),
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    /// Bypass the builder to get records the builder would refuse.
    fn raw(collections: Collections) -> Archive {
        Archive::from_parts(manifest(), collections, BTreeMap::new()).with_recomputed_stats()
    }

    fn location(id: u32, name: &str) -> Location {
        let mut l = Location::new(name, false);
        l.id = id;
        l
    }

    fn session(id: u32, location_id: u32) -> Session {
        let mut s = Session::new(day(), location_id);
        s.id = id;
        s
    }

    #[test]
    fn valid_archive_passes() {
        let archive = raw(Collections {
            locations: vec![location(1, "Gym")],
            sessions: vec![session(1, 1)],
            ..Collections::default()
        });
        let report = validate(&archive);
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.structure_valid);
        assert_eq!(report.statistics.sessions_count, 1);
    }

    #[test]
    fn dangling_location_is_referential_error() {
        let archive = raw(Collections {
            locations: vec![location(1, "Gym")],
            sessions: vec![session(3, 99)],
            ..Collections::default()
        });
        let report = validate(&archive);
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![CldfError::Referential {
                entity: RecordKind::Session,
                id: 3,
                field: "locationId",
                target: RecordKind::Location,
                missing: 99,
            }]
        );
    }

    #[test]
    fn referential_check_is_exhaustive() {
        let mut climb = Climb::new(7, day(), ClimbType::Boulder, FinishType::Top);
        climb.id = 1;
        climb.tags = Some(vec![TagRef::Id(4), TagRef::from("free label")]);
        let archive = raw(Collections {
            sessions: vec![session(1, 8), session(2, 9)],
            climbs: vec![climb],
            ..Collections::default()
        });
        let report = validate(&archive);
        let missing: Vec<u32> = report
            .errors
            .iter()
            .filter_map(|e| match e {
                CldfError::Referential { missing, .. } => Some(*missing),
                _ => None,
            })
            .collect();
        assert_eq!(missing, [8, 9, 7, 4]);
    }

    #[test]
    fn stats_mismatch_is_warning_but_missing_document_is_error() {
        let mut declared = manifest();
        declared.stats.locations_count = 3;
        declared.stats.climbs_count = 2;
        let collections = Collections {
            locations: vec![location(1, "Gym")],
            ..Collections::default()
        };
        let archive = Archive::from_parts(declared, collections, BTreeMap::new());
        let report = validate(&archive);
        assert!(!report.structure_valid);
        assert!(report.warnings.iter().any(|w| w.contains("declare 3 location")));
        assert!(matches!(report.errors[0], CldfError::Structure(_)));
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn duplicate_ids_and_clids_are_errors() {
        let clid = crate::Clid::generate(crate::EntityType::Location);
        let mut a = location(1, "A");
        a.clid = Some(clid);
        let mut b = location(1, "B");
        b.clid = Some(clid);
        let report = validate(&raw(Collections {
            locations: vec![a, b],
            ..Collections::default()
        }));
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn tag_name_collisions() {
        let mut a = Tag::custom("Crimpy");
        a.id = 1;
        let mut b = Tag::custom("crimpy");
        b.id = 2;
        let mut c = Tag::custom("crimpy");
        c.id = 3;
        let report = validate(&raw(Collections {
            tags: vec![a, b, c],
            ..Collections::default()
        }));
        assert_eq!(report.errors.len(), 1, "exact duplicate is an error");
        assert_eq!(
            report.warnings.iter().filter(|w| w.contains("only by case")).count(),
            1
        );
    }

    #[test]
    fn business_warnings() {
        let mut future = Climb::new(1, NaiveDate::from_ymd_opt(2999, 1, 1).unwrap(), ClimbType::Route, FinishType::Top);
        future.id = 1;
        let mut first = Climb::new(1, day(), ClimbType::Route, FinishType::Attempt);
        first.id = 2;
        first.route_name = Some("Astroman".to_string());
        let mut second = first.clone();
        second.id = 3;
        second.route_name = Some("astroman ".to_string());
        let report = validate(&raw(Collections {
            locations: vec![location(1, "Yosemite")],
            sessions: vec![session(1, 1)],
            climbs: vec![future, first, second],
            ..Collections::default()
        }));
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("future")));
        assert!(report.warnings.iter().any(|w| w.contains("2 times")));
    }

    #[test]
    fn checksum_verdicts() {
        let mut container = Container::new();
        container.push("manifest.json", b"{}".to_vec()).unwrap();
        container.push("extra.bin", vec![1]).unwrap();
        let doc = ChecksumsDocument::compute(
            DigestAlgorithm::Sha256,
            [("manifest.json", b"{}".as_slice()), ("locations.json", b"[]".as_slice())],
        );
        container
            .push(CHECKSUMS_JSON, serde_json::to_vec(&doc).unwrap())
            .unwrap();

        let check = verify_checksums(&container, Mode::Lenient);
        let result = check.result.unwrap();
        assert!(!result.valid);
        assert!(result.files["manifest.json"]);
        assert!(!result.files["locations.json"]);
        assert_eq!(check.errors.len(), 1);
        assert!(check.warnings.iter().any(|w| w.contains("extra.bin")));

        let check = verify_checksums(&container, Mode::Strict);
        assert_eq!(check.errors.len(), 2);
        assert!(check.errors.iter().any(|e| matches!(
            e,
            CldfError::Integrity { document, .. } if document == "extra.bin"
        )));
        assert!(check.warnings.is_empty());
    }

    #[test]
    fn digests_compare_exactly() {
        let mut container = Container::new();
        container.push("manifest.json", b"{}".to_vec()).unwrap();
        let mut doc =
            ChecksumsDocument::compute(DigestAlgorithm::Sha256, [("manifest.json", b"{}".as_slice())]);
        let digest = doc.files.get_mut("manifest.json").unwrap();
        *digest = digest.to_ascii_uppercase();
        container
            .push(CHECKSUMS_JSON, serde_json::to_vec(&doc).unwrap())
            .unwrap();

        let check = verify_checksums(&container, Mode::Strict);
        assert!(!check.result.unwrap().files["manifest.json"]);
        assert!(matches!(
            &check.errors[0],
            CldfError::Integrity { document, .. } if document == "manifest.json"
        ));
    }

    #[test]
    fn report_serializes_errors_as_text() {
        let archive = raw(Collections {
            sessions: vec![session(1, 2)],
            ..Collections::default()
        });
        let json = serde_json::to_value(validate(&archive)).unwrap();
        assert!(json["errors"][0].as_str().unwrap().contains("Referential"));
        assert_eq!(json["valid"], false);
        assert!(json.get("checksumResult").is_none());
    }
}
