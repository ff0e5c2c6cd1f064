//! End-to-end tests for the CLI commands against archives on disk.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use clap::Parser;
use cldf::cli::{Cli, execute, read_archive, resolve_config};
use cldf_core::{
    Archive, CldfError, Climb, ClimbType, Codec, CodecConfig, DigestAlgorithm, FinishType,
    Location, Manifest, Mode, Platform, Session, Tag, TagRef, Timestamp,
};
use cldf_core::model::time::parse_timestamp;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// FIXTURES
// =============================================================================

fn timestamp() -> Timestamp {
    parse_timestamp("2024-01-15T10:30:00+00:00").unwrap()
}

fn log(location: &str) -> Archive {
    let mut b = Archive::builder(Manifest::new("2.4.1", Platform::Ios, timestamp()));
    let loc = b.add(Location::new(location, true)).unwrap();
    let date = timestamp().date_naive();
    let session = b.add(Session::new(date, loc)).unwrap();
    let tag = b.add(Tag::custom("crimpy")).unwrap();
    let mut climb = Climb::new(session, date, ClimbType::Boulder, FinishType::Flash);
    climb.tags = Some(vec![TagRef::Id(tag)]);
    b.add(climb).unwrap();
    b.build()
}

fn write(dir: &TempDir, name: &str, archive: &Archive) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, Codec::default().write(archive).unwrap()).unwrap();
    path
}

fn run(args: &[&str]) -> Result<bool, CldfError> {
    let mut argv = vec!["cldf"];
    argv.extend_from_slice(args);
    execute(Cli::parse_from(argv))
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

// =============================================================================
// COMMAND TESTS
// =============================================================================

#[test]
fn validate_reports_valid_archive() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "gym.cldf", &log("Gym"));
    assert!(run(&["validate", arg(&path)]).unwrap());
    assert!(run(&["--json", "validate", arg(&path)]).unwrap());
}

#[test]
fn validate_flags_garbage() {
    let dir = TempDir::new().unwrap();
    let good = write(&dir, "gym.cldf", &log("Gym"));
    let bad = dir.path().join("bad.cldf");
    std::fs::write(&bad, b"not a zip").unwrap();
    assert!(!run(&["validate", arg(&good), arg(&bad)]).unwrap());
}

#[test]
fn validate_missing_file_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.cldf");
    assert!(!run(&["validate", arg(&missing)]).unwrap());
}

#[test]
fn merge_writes_readable_archive() {
    let dir = TempDir::new().unwrap();
    let a = write(&dir, "a.cldf", &log("Gym"));
    let b = write(&dir, "b.cldf", &log("Crag"));
    let out = dir.path().join("merged.cldf");

    assert!(run(&["merge", arg(&a), arg(&b), "-o", arg(&out)]).unwrap());

    let merged = read_archive(&Codec::default(), &out).unwrap();
    assert_eq!(merged.locations().len(), 2);
    assert_eq!(merged.climbs().len(), 2);
    assert_eq!(merged.tags().len(), 1);
}

#[test]
fn merge_into_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let a = write(&dir, "a.cldf", &log("Gym"));
    let out = dir.path().join("no/such/dir/out.cldf");
    assert!(matches!(
        run(&["merge", arg(&a), "-o", arg(&out)]),
        Err(CldfError::Io(_))
    ));
}

#[test]
fn assign_clids_rewrites_archive() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.cldf", &log("Gym"));
    let out = dir.path().join("out.cldf");

    assert!(run(&["assign-clids", arg(&input), "-o", arg(&out)]).unwrap());

    let archive = read_archive(&Codec::default(), &out).unwrap();
    assert!(archive.locations()[0].clid.is_some());
    assert!(archive.climbs()[0].clid.is_some());
}

#[test]
fn clid_commands() {
    assert!(run(&["clid", "generate", "route", "-n", "2"]).unwrap());
    assert!(run(&["clid", "parse", "clid:route:550e8400-e29b-41d4-a716-446655440000"]).unwrap());
    assert!(!run(&["clid", "parse", "clid:gym:550e8400-e29b-41d4-a716-446655440000"]).unwrap());
    assert!(Cli::try_parse_from(["cldf", "clid", "generate", "gym"]).is_err());
}

// =============================================================================
// CONFIGURATION TESTS
// =============================================================================

#[test]
fn flags_override_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("cldf.toml");
    std::fs::write(&config, "mode = \"lenient\"\npretty = true\n").unwrap();

    let cli = Cli::parse_from(["cldf", "--config", arg(&config), "info", "x.cldf"]);
    let resolved = resolve_config(&cli).unwrap();
    assert_eq!(resolved.mode, Mode::Lenient);
    assert!(resolved.pretty);

    let cli = Cli::parse_from([
        "cldf",
        "--config",
        arg(&config),
        "--strict",
        "--digest",
        "blake3",
        "info",
        "x.cldf",
    ]);
    let resolved = resolve_config(&cli).unwrap();
    assert_eq!(resolved.mode, Mode::Strict);
    assert_eq!(resolved.digest, DigestAlgorithm::Blake3);
}

#[test]
fn bad_config_is_config_error() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("cldf.toml");
    std::fs::write(&config, "compression = 9\n").unwrap();
    let cli = Cli::parse_from(["cldf", "--config", arg(&config), "info", "x.cldf"]);
    assert!(matches!(resolve_config(&cli), Err(CldfError::Config(_))));
    assert_eq!(CodecConfig::default().mode, Mode::Strict);
}

#[test]
fn strict_and_lenient_conflict() {
    assert!(Cli::try_parse_from(["cldf", "--strict", "--lenient", "info", "x.cldf"]).is_err());
}
