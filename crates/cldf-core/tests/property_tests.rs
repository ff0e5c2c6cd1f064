//! # Property-Based Tests
//!
//! Invariants that must hold for arbitrary archives and identifiers:
//! round trips, checksum sensitivity and merge id uniqueness.

use cldf_core::{
    Archive, CldfError, Climb, ClimbType, Clid, Codec, Container, EntityType, FinishType,
    Location, Manifest, MergeEngine, Platform, Session, Tag, TagRef, validate,
};
use chrono::{DateTime, NaiveDate};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// STRATEGIES
// =============================================================================

fn entity_type() -> impl Strategy<Value = EntityType> {
    prop::sample::select(EntityType::ALL.to_vec())
}

/// Shape of a generated log: per location, its sessions; per session, the
/// number of climbs; plus the tag names in use.
#[derive(Debug, Clone)]
struct Shape {
    locations: Vec<(String, bool, Vec<u8>)>,
    tags: Vec<String>,
}

fn shape() -> impl Strategy<Value = Shape> {
    (
        vec(("[A-Z][a-z]{2,10}", any::<bool>(), vec(0u8..4, 0..3)), 1..4),
        vec("[a-z]{3,8}", 0..4),
    )
        .prop_map(|(locations, tags)| Shape { locations, tags })
}

fn build(shape: &Shape) -> Archive {
    let created = DateTime::parse_from_rfc3339("2024-03-01T08:00:00+01:00").expect("timestamp");
    let date = NaiveDate::from_ymd_opt(2024, 2, 20).expect("date");
    let mut b = Archive::builder(Manifest::new("1.0.0", Platform::Android, created));

    let mut seen = BTreeSet::new();
    let mut tag_ids = Vec::new();
    for name in &shape.tags {
        if seen.insert(name.clone()) {
            tag_ids.push(b.add(Tag::custom(name.as_str())).expect("tag"));
        }
    }

    for (name, indoor, sessions) in &shape.locations {
        let location = b.add(Location::new(name.as_str(), *indoor)).expect("location");
        for &climbs in sessions {
            let session = b.add(Session::new(date, location)).expect("session");
            for n in 0..climbs {
                let mut climb = Climb::new(session, date, ClimbType::Boulder, FinishType::Top);
                climb.attempts = u32::from(n) + 1;
                if let Some(tag) = tag_ids.get(usize::from(n)) {
                    climb.tags = Some(vec![TagRef::Id(*tag)]);
                }
                b.add(climb).expect("climb");
            }
        }
    }
    b.build()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Every generated CLID parses back to the same identifier.
    #[test]
    fn clid_round_trip(entity in entity_type()) {
        let clid = Clid::generate(entity);
        let parsed = Clid::parse(&clid.to_string()).expect("parse");
        prop_assert_eq!(parsed, clid);
        prop_assert_eq!(parsed.entity_type(), entity);
        prop_assert_eq!(parsed.short_form(), clid.short_form());
        prop_assert_eq!(parsed.url(), clid.url());
    }

    /// Arbitrary text never panics the parser, and only canonical text passes.
    #[test]
    fn clid_parse_total(text in ".{0,60}") {
        if let Ok(clid) = Clid::parse(&text) {
            prop_assert!(clid.to_string().eq_ignore_ascii_case(&text));
        }
    }

    /// read(write(A)) == A for any well-formed archive.
    #[test]
    fn archive_round_trip(shape in shape()) {
        let archive = build(&shape);
        let codec = Codec::default();
        let bytes = codec.write(&archive).expect("write");
        let outcome = codec.read(&bytes).expect("read");
        prop_assert_eq!(outcome.archive, archive);
        prop_assert!(outcome.report.valid);
    }

    /// Any single flipped bit in any member is caught. Damage to a sealed
    /// document is attributed to it; damage to the checksums document may
    /// surface against whichever entry it broke.
    #[test]
    fn checksum_sensitivity(shape in shape(), pick in any::<prop::sample::Index>(), at in any::<prop::sample::Index>(), bit in 0u8..8) {
        let bytes = Codec::default().write(&build(&shape)).expect("write");
        let mut container = Container::unpack(&bytes).expect("unpack");
        let names: Vec<String> = container.names().map(str::to_string).collect();
        let name = pick.get(&names).clone();
        let member = container.get_mut(&name).expect("member");
        let offset = at.index(member.len());
        member[offset] ^= 1 << bit;

        match Codec::default().read(&container.pack().expect("pack")) {
            Err(CldfError::Integrity { document, .. }) => {
                if name != "checksums.json" {
                    prop_assert_eq!(document, name);
                }
            }
            other => prop_assert!(false, "expected integrity error for {}, got {:?}", name, other),
        }
    }

    /// Merged ids are unique per collection and every reference resolves.
    #[test]
    fn merge_ids_unique(shapes in vec(shape(), 1..4)) {
        let inputs: Vec<Archive> = shapes.iter().map(build).collect();
        let (merged, report) = MergeEngine::default().merge(&inputs).expect("merge");

        let ids: BTreeSet<u32> = merged.climbs().iter().map(|c| c.id).collect();
        prop_assert_eq!(ids.len(), merged.climbs().len());
        let ids: BTreeSet<u32> = merged.sessions().iter().map(|s| s.id).collect();
        prop_assert_eq!(ids.len(), merged.sessions().len());

        let total: usize = inputs.iter().map(|a| a.climbs().len()).sum();
        prop_assert_eq!(merged.climbs().len(), total);
        prop_assert!(report.dropped.is_empty());
        prop_assert!(validate(&merged).valid);
    }
}
