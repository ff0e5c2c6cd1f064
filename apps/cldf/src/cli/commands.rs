//! # CLI Command Implementations
//!
//! Each command reads archives from disk, hands the bytes to the engine and
//! prints the result as text or JSON.

use cldf_core::primitives::MAX_CONTAINER_SIZE;
use cldf_core::{
    Archive, CldfError, Clid, Codec, EntityType, MergeEngine, ValidationReport,
    assign_missing_clids,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE HELPERS
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CldfError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CldfError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CldfError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CldfError> {
    let canonical = path.canonicalize().map_err(|e| {
        CldfError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CldfError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path; its parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, CldfError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        CldfError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(CldfError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| CldfError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read an archive file, bounded by the container size limit.
pub fn read_file(path: &Path) -> Result<Vec<u8>, CldfError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_CONTAINER_SIZE as u64)?;
    std::fs::read(&validated).map_err(|e| CldfError::Io(format!("Read file: {}", e)))
}

/// Decode an archive file under the codec's mode.
pub fn read_archive(codec: &Codec, path: &Path) -> Result<Archive, CldfError> {
    let bytes = read_file(path)?;
    let outcome = codec.read_named(&bytes, &path.display().to_string())?;
    for warning in &outcome.report.warnings {
        tracing::warn!(file = %path.display(), "{}", warning);
    }
    Ok(outcome.archive)
}

/// Encode and write an archive.
pub fn write_archive(codec: &Codec, archive: &Archive, path: &Path) -> Result<usize, CldfError> {
    let validated = validate_output_path(path)?;
    let bytes = codec.write(archive)?;
    std::fs::write(&validated, &bytes)
        .map_err(|e| CldfError::Io(format!("Write file: {}", e)))?;
    Ok(bytes.len())
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Report on every file; `false` if any is invalid.
///
/// A file that cannot be read at all still gets a report, so one bad path
/// does not hide the results for the others.
pub fn cmd_validate(codec: &Codec, files: &[PathBuf], json_mode: bool) -> Result<bool, CldfError> {
    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        let name = path.display().to_string();
        let report = match read_file(path) {
            Ok(bytes) => codec.inspect(&bytes, &name),
            Err(e) => {
                let mut report = codec.inspect(&[], &name);
                report.errors = vec![e];
                report
            }
        };
        reports.push(report);
    }

    let all_valid = reports.iter().all(|r| r.valid);

    if json_mode {
        print_json(&reports);
        return Ok(all_valid);
    }

    for report in &reports {
        print_report(report);
    }
    if reports.len() > 1 {
        let failed = reports.iter().filter(|r| !r.valid).count();
        println!("{} of {} archives valid", reports.len() - failed, reports.len());
    }
    Ok(all_valid)
}

fn print_report(report: &ValidationReport) {
    let file = report.file.as_deref().unwrap_or("<memory>");
    let verdict = if report.valid { "VALID" } else { "INVALID" };
    println!("{file}: {verdict}");

    match &report.checksum_result {
        Some(result) => {
            let failed = result.files.values().filter(|ok| !**ok).count();
            println!(
                "  Checksums ({}): {} documents, {} failed",
                result.algorithm,
                result.files.len(),
                failed
            );
        }
        None => println!("  Checksums: not present"),
    }

    let s = &report.statistics;
    println!(
        "  Locations {} | Sectors {} | Routes {} | Sessions {} | Climbs {} | Tags {} | Media {}",
        s.locations_count,
        s.sectors_count,
        s.routes_count,
        s.sessions_count,
        s.climbs_count,
        s.tags_count,
        s.media_count
    );

    for error in &report.errors {
        println!("  error:   {}", error);
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
}

// =============================================================================
// INFO COMMAND
// =============================================================================

/// Show manifest and collection counts.
pub fn cmd_info(codec: &Codec, file: &Path, json_mode: bool) -> Result<(), CldfError> {
    let archive = read_archive(codec, file)?;
    let manifest = archive.manifest();

    if json_mode {
        let output = serde_json::json!({
            "file": file.to_string_lossy(),
            "manifest": manifest,
            "mediaFiles": archive.media_files().keys().collect::<Vec<_>>(),
        });
        print_json(&output);
        return Ok(());
    }

    println!("CLDF Archive");
    println!("============");
    println!("File:        {}", file.display());
    println!("Format:      {} {}", manifest.format, manifest.version);
    println!("Created:     {}", manifest.creation_date.to_rfc3339());
    println!("App:         {} ({})", manifest.app_version, manifest.platform);
    if let Some(name) = manifest.author.as_ref().and_then(|a| a.name.as_deref()) {
        println!("Author:      {}", name);
    }
    println!();
    let s = &manifest.stats;
    println!("Locations:   {}", s.locations_count);
    println!("Sectors:     {}", s.sectors_count);
    println!("Routes:      {}", s.routes_count);
    println!("Sessions:    {}", s.sessions_count);
    println!("Climbs:      {}", s.climbs_count);
    println!("Tags:        {}", s.tags_count);
    println!("Media:       {} ({} embedded files)", s.media_count, archive.media_files().len());

    Ok(())
}

// =============================================================================
// MERGE COMMAND
// =============================================================================

/// Merge inputs in order and write the result.
pub fn cmd_merge(
    codec: &Codec,
    inputs: &[PathBuf],
    output: &Path,
    json_mode: bool,
) -> Result<(), CldfError> {
    let archives = inputs
        .iter()
        .map(|path| read_archive(codec, path))
        .collect::<Result<Vec<_>, _>>()?;

    let (merged, report) = MergeEngine::from_config(codec.config()).merge(&archives)?;
    let written = write_archive(codec, &merged, output)?;

    if json_mode {
        let output = serde_json::json!({
            "output": output.to_string_lossy(),
            "bytes": written,
            "stats": merged.manifest().stats,
            "report": report,
        });
        print_json(&output);
        return Ok(());
    }

    let s = &merged.manifest().stats;
    println!(
        "Merged {} archives into {} ({} bytes)",
        inputs.len(),
        output.display(),
        written
    );
    println!(
        "  {} locations, {} sessions, {} climbs, {} tags",
        s.locations_count, s.sessions_count, s.climbs_count, s.tags_count
    );
    println!(
        "  {} id collisions resolved, {} tags deduplicated, {} CLID duplicates",
        report.collisions_resolved, report.tags_deduped, report.clid_duplicates
    );
    for dropped in &report.dropped {
        println!("  dropped: {}", dropped);
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }

    Ok(())
}

// =============================================================================
// CLID COMMANDS
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClidParts {
    clid: String,
    namespace: &'static str,
    entity_type: &'static str,
    uuid: String,
    short_form: String,
    url: String,
}

impl From<&Clid> for ClidParts {
    fn from(clid: &Clid) -> Self {
        Self {
            clid: clid.to_string(),
            namespace: clid.namespace(),
            entity_type: clid.entity_type().as_str(),
            uuid: clid.uuid().hyphenated().to_string(),
            short_form: clid.short_form(),
            url: clid.url(),
        }
    }
}

/// Print `count` fresh identifiers.
pub fn cmd_clid_generate(entity: EntityType, count: usize, json_mode: bool) {
    let clids: Vec<Clid> = (0..count).map(|_| Clid::generate(entity)).collect();

    if json_mode {
        let parts: Vec<ClidParts> = clids.iter().map(ClidParts::from).collect();
        print_json(&parts);
        return;
    }
    for clid in clids {
        println!("{}", clid);
    }
}

/// Print the parts of a CLID; `false` if it does not parse.
pub fn cmd_clid_parse(text: &str, json_mode: bool) -> bool {
    match Clid::parse(text) {
        Ok(clid) => {
            let parts = ClidParts::from(&clid);
            if json_mode {
                print_json(&parts);
            } else {
                println!("Namespace:   {}", parts.namespace);
                println!("Entity type: {}", parts.entity_type);
                println!("UUID:        {}", parts.uuid);
                println!("Short form:  {}", parts.short_form);
                println!("URL:         {}", parts.url);
            }
            true
        }
        Err(e) => {
            if json_mode {
                print_json(&serde_json::json!({ "clid": text, "error": e.to_string() }));
            } else {
                println!("{}", e);
            }
            false
        }
    }
}

// =============================================================================
// ASSIGN-CLIDS COMMAND
// =============================================================================

/// Fill in missing CLIDs and write the archive to `output`.
///
/// Records that fail their own checks keep no CLID and are listed as
/// warnings; the rest of the archive is still written.
pub fn cmd_assign_clids(codec: &Codec, input: &Path, output: &Path) -> Result<(), CldfError> {
    let archive = read_archive(codec, input)?;
    let outcome = assign_missing_clids(archive);
    let written = write_archive(codec, &outcome.archive, output)?;

    println!(
        "Assigned {} CLIDs; wrote {} bytes to {}",
        outcome.assigned,
        written,
        output.display()
    );
    for warning in &outcome.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}
