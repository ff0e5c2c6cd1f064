//! # Archive Codec
//!
//! Converts between an [`Archive`] and container bytes.
//!
//! ## Write
//!
//! Members are written in a fixed order: `manifest.json`, the non-empty
//! collection documents, embedded `media/` files sorted by path, and
//! `checksums.json` last. Manifest stats are recomputed from the
//! collections. Writing the same archive twice yields identical bytes.
//!
//! ## Read
//!
//! Checksums are verified before anything is parsed, so a corrupted
//! manifest surfaces as an integrity failure rather than a parse error.
//! Structure and checksum failures fail fast in strict mode; decode,
//! schema and referential findings are collected over the whole archive
//! and strict mode then aborts with the first one in report order.

use crate::config::CodecConfig;
use crate::formats::{
    ChecksumsDocument, Container, decode_collection, decode_json, encode_collection, encode_json,
};
use crate::model::archive::check_media_path;
use crate::model::entities::{Climb, Location, MediaItem, Route, Sector, Session, Tag};
use crate::model::record::Record;
use crate::model::{Archive, Collections, Manifest, Stats};
use crate::primitives::{CHECKSUMS_JSON, MANIFEST_JSON, MEDIA_DIR_PREFIX};
use crate::types::{CldfError, Mode, RecordKind};
use crate::verifier::{ValidationReport, Verifier, validate, verify_checksums};
use std::collections::BTreeMap;

/// A decoded archive and the report produced while reading it.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub archive: Archive,
    pub report: ValidationReport,
}

/// Reads and writes archives under one configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    #[must_use]
    pub const fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &CodecConfig {
        &self.config
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Serialize an archive to container bytes.
    ///
    /// In strict mode an archive that fails validation is refused, so a
    /// dangling reference is never written out.
    pub fn write(&self, archive: &Archive) -> Result<Vec<u8>, CldfError> {
        if self.config.mode.is_strict() {
            let report = validate(archive);
            if let Some(error) = report.first_error() {
                return Err(error.clone());
            }
        }

        let pretty = self.config.pretty;
        let mut manifest = archive.manifest().clone();
        let stats = archive.stats();
        if manifest.stats != stats {
            tracing::debug!("manifest stats recomputed for write");
            manifest.stats = stats;
        }

        let mut container = Container::new();
        container.push(MANIFEST_JSON, encode_json(MANIFEST_JSON, &manifest, pretty)?)?;
        push_collection(&mut container, archive.locations(), pretty)?;
        push_collection(&mut container, archive.sessions(), pretty)?;
        push_collection(&mut container, archive.climbs(), pretty)?;
        push_collection(&mut container, archive.routes(), pretty)?;
        push_collection(&mut container, archive.sectors(), pretty)?;
        push_collection(&mut container, archive.tags(), pretty)?;
        push_collection(&mut container, archive.media(), pretty)?;
        for (path, bytes) in archive.media_files() {
            container.push(path.clone(), bytes.clone())?;
        }

        let checksums = ChecksumsDocument::compute(
            self.config.digest,
            container.members().iter().map(|m| (m.name.as_str(), m.bytes.as_slice())),
        );
        container.push(CHECKSUMS_JSON, encode_json(CHECKSUMS_JSON, &checksums, pretty)?)?;

        let bytes = container.pack()?;
        tracing::info!(
            members = container.members().len(),
            bytes = bytes.len(),
            digest = %self.config.digest,
            "archive written"
        );
        Ok(bytes)
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Decode container bytes under the configured mode.
    pub fn read(&self, bytes: &[u8]) -> Result<ReadOutcome, CldfError> {
        self.decode(bytes, None, self.config.mode)
    }

    /// Like [`read`](Self::read), naming the report after `file`.
    pub fn read_named(&self, bytes: &[u8], file: &str) -> Result<ReadOutcome, CldfError> {
        self.decode(bytes, Some(file), self.config.mode)
    }

    /// A report for any input, however broken; never fails.
    ///
    /// Reads leniently. A container too damaged to decode yields a report
    /// carrying the fatal error.
    #[must_use]
    pub fn inspect(&self, bytes: &[u8], file: &str) -> ValidationReport {
        match self.decode(bytes, Some(file), Mode::Lenient) {
            Ok(outcome) => outcome.report,
            Err(error) => ValidationReport {
                file: Some(file.to_string()),
                timestamp: crate::model::time::now(),
                structure_valid: false,
                checksum_result: None,
                statistics: Stats::default(),
                errors: vec![error],
                warnings: Vec::new(),
                valid: false,
            },
        }
    }

    fn decode(&self, bytes: &[u8], file: Option<&str>, mode: Mode) -> Result<ReadOutcome, CldfError> {
        let container = Container::unpack(bytes)?;
        let Some(manifest_bytes) = container.get(MANIFEST_JSON) else {
            return Err(CldfError::Structure(format!("missing {MANIFEST_JSON}")));
        };

        let checksums = verify_checksums(&container, mode);
        if mode.is_strict()
            && let Some(error) = checksums.errors.first()
        {
            for error in &checksums.errors {
                tracing::warn!(%error, "checksum failure");
            }
            return Err(error.clone());
        }

        let manifest: Manifest = decode_json(MANIFEST_JSON, manifest_bytes)?;

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut collections = Collections::default();
        decode_into::<Location>(&container, &mut collections, &mut errors, &mut warnings);
        decode_into::<Sector>(&container, &mut collections, &mut errors, &mut warnings);
        decode_into::<Route>(&container, &mut collections, &mut errors, &mut warnings);
        decode_into::<Session>(&container, &mut collections, &mut errors, &mut warnings);
        decode_into::<Tag>(&container, &mut collections, &mut errors, &mut warnings);
        decode_into::<Climb>(&container, &mut collections, &mut errors, &mut warnings);
        decode_into::<MediaItem>(&container, &mut collections, &mut errors, &mut warnings);

        let mut media_files = BTreeMap::new();
        for member in container.members() {
            let name = member.name.as_str();
            if name.starts_with(MEDIA_DIR_PREFIX) {
                match check_media_path(name) {
                    Ok(()) => {
                        media_files.insert(name.to_string(), member.bytes.clone());
                    }
                    Err(_) => warnings.push(format!("ignoring unsafe media path '{name}'")),
                }
            } else if !is_known_document(name) {
                warnings.push(format!("ignoring unknown member '{name}'"));
            }
        }

        let archive = Archive::from_parts(manifest, collections, media_files);
        let mut verifier = Verifier::new(&archive)
            .with_checksums(checksums)
            .with_findings(errors, warnings);
        if let Some(file) = file {
            verifier = verifier.for_file(file);
        }
        let report = verifier.validate();

        if mode.is_strict()
            && let Some(error) = report.first_error()
        {
            return Err(error.clone());
        }

        tracing::info!(
            file = file.unwrap_or("<memory>"),
            valid = report.valid,
            climbs = archive.climbs().len(),
            sessions = archive.sessions().len(),
            "archive read"
        );
        Ok(ReadOutcome { archive, report })
    }
}

fn push_collection<T: Record>(
    container: &mut Container,
    records: &[T],
    pretty: bool,
) -> Result<(), CldfError> {
    if records.is_empty() {
        return Ok(());
    }
    container.push(T::KIND.document(), encode_collection(records, pretty)?)
}

/// Decode one collection if present, folding findings into the lists.
fn decode_into<T: Record>(
    container: &Container,
    collections: &mut Collections,
    errors: &mut Vec<CldfError>,
    warnings: &mut Vec<String>,
) {
    let Some(bytes) = container.get(T::KIND.document()) else {
        return;
    };
    match decode_collection::<T>(bytes) {
        Ok(decoded) => {
            errors.extend(decoded.errors);
            warnings.extend(decoded.warnings);
            *T::within_mut(collections) = decoded.records;
        }
        Err(error) => errors.push(error),
    }
}

fn is_known_document(name: &str) -> bool {
    name == MANIFEST_JSON
        || name == CHECKSUMS_JSON
        || RecordKind::ALL.iter().any(|k| k.document() == name)
}

// =============================================================================
// TESTS
// =============================================================================
