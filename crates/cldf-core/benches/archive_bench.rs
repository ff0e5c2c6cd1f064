//! # Archive Benchmarks
//!
//! Performance benchmarks for cldf-core codec, verifier and merge.
//!
//! Run with: `cargo bench -p cldf-core`

use cldf_core::{
    Archive, Climb, ClimbType, Codec, CodecConfig, DigestAlgorithm, FinishType, Location,
    Manifest, MergeEngine, Platform, Session, Tag, TagRef, validate,
};
use chrono::{DateTime, NaiveDate};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// An archive with `sessions` sessions of ten climbs each.
fn create_log(sessions: usize) -> Archive {
    let created = DateTime::parse_from_rfc3339("2024-01-15T10:30:00+00:00").expect("timestamp");
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).expect("date");
    let mut b = Archive::builder(Manifest::new("bench", Platform::Desktop, created));

    let gym = b.add(Location::new("Gym", true)).expect("location");
    let tag = b.add(Tag::custom("crimpy")).expect("tag");
    for _ in 0..sessions {
        let session = b.add(Session::new(date, gym)).expect("session");
        for n in 0..10u32 {
            let mut climb = Climb::new(session, date, ClimbType::Boulder, FinishType::Top);
            climb.attempts = n + 1;
            climb.tags = Some(vec![TagRef::Id(tag)]);
            b.add(climb).expect("climb");
        }
    }
    b.build()
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");

    for size in [10, 100, 1000].iter() {
        let archive = create_log(*size);
        for digest in [DigestAlgorithm::Sha256, DigestAlgorithm::Blake3] {
            let codec = Codec::new(CodecConfig {
                digest,
                ..CodecConfig::default()
            });
            group.bench_with_input(BenchmarkId::new(digest.name(), size), &archive, |b, archive| {
                b.iter(|| black_box(codec.write(archive)));
            });
        }
    }

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    for size in [10, 100, 1000].iter() {
        let bytes = Codec::default().write(&create_log(*size)).expect("write");

        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| black_box(Codec::default().read(bytes)));
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for size in [10, 100, 1000].iter() {
        let archive = create_log(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &archive, |b, archive| {
            b.iter(|| black_box(validate(archive)));
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for size in [10, 100, 500].iter() {
        let inputs = vec![create_log(*size), create_log(*size), create_log(*size)];

        group.bench_with_input(BenchmarkId::from_parameter(size), &inputs, |b, inputs| {
            b.iter(|| black_box(MergeEngine::default().merge(inputs)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_write, bench_read, bench_validate, bench_merge);
criterion_main!(benches);
