//! # Record Trait
//!
//! Uniform access to the seven entity collections, so the builder, verifier
//! and merge engine are written once instead of once per entity.
//!
//! Foreign keys are described by `references()` and rewritten by `relink()`;
//! both walk the same fields, which keeps what the verifier checks and what
//! the merge engine remaps in lockstep.

use crate::clid::{Clid, EntityType};
use crate::model::archive::Collections;
use crate::model::entities::{Climb, Location, MediaItem, Route, Sector, Session, Tag, TagRef};
use crate::model::enums::MediaDesignation;
use crate::types::{CldfError, RecordKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

// =============================================================================
// REFERENCES
// =============================================================================

/// One foreign key held by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    /// JSON field name carrying the key.
    pub field: &'static str,
    pub target: RecordKind,
    pub id: u32,
}

impl Reference {
    const fn new(field: &'static str, target: RecordKind, id: u32) -> Self {
        Self { field, target, id }
    }
}

/// Maps foreign keys onto their new values during relinking.
pub trait Relink {
    /// New id for `id` of kind `target`, or `None` if it doesn't resolve.
    fn resolve(&self, target: RecordKind, id: u32) -> Option<u32>;

    /// Canonical spelling for a tag referenced by name.
    ///
    /// `None` keeps the name as written.
    fn tag_name(&self, _name: &str) -> Option<String> {
        None
    }
}

fn remap(map: &dyn Relink, field: &'static str, target: RecordKind, id: &mut u32) -> Result<(), Reference> {
    match map.resolve(target, *id) {
        Some(new) => {
            *id = new;
            Ok(())
        }
        None => Err(Reference::new(field, target, *id)),
    }
}

fn remap_opt(
    map: &dyn Relink,
    field: &'static str,
    target: RecordKind,
    id: &mut Option<u32>,
) -> Result<(), Reference> {
    match id {
        Some(id) => remap(map, field, target, id),
        None => Ok(()),
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// An entity that lives in one of the archive collections.
pub trait Record: Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned {
    const KIND: RecordKind;

    fn id(&self) -> u32;

    fn set_id(&mut self, id: u32);

    fn clid(&self) -> Option<&Clid>;

    /// Mutable CLID slot, `None` for records that never carry a CLID.
    fn clid_slot(&mut self) -> Option<&mut Option<Clid>>;

    /// Entity type this record's CLID must carry.
    fn clid_type() -> Option<EntityType>;

    /// Every foreign key in field order.
    fn references(&self) -> Vec<Reference>;

    /// Rewrite every foreign key through `map`.
    ///
    /// Fails with the first key that doesn't resolve.
    fn relink(&mut self, map: &dyn Relink) -> Result<(), Reference>;

    /// Field-level invariant violations.
    fn problems(&self) -> Vec<String>;

    /// Warnings for values the lenient decoders replaced, given the raw JSON.
    fn coerced(_raw: &Value) -> Vec<String> {
        Vec::new()
    }

    #[doc(hidden)]
    fn within(collections: &Collections) -> &[Self];

    #[doc(hidden)]
    fn within_mut(collections: &mut Collections) -> &mut Vec<Self>;

    /// `problems()` as one schema error naming this record and listing
    /// every problem, in the order `problems()` reports them.
    fn check(&self) -> Result<(), CldfError> {
        let problems = self.problems();
        if problems.is_empty() {
            return Ok(());
        }
        Err(schema_problem::<Self>(self.id(), &problems.join("; ")))
    }

    /// A CLID naming another entity type is an identifier error.
    fn check_clid(&self) -> Result<(), CldfError> {
        match (self.clid(), Self::clid_type()) {
            (Some(clid), Some(expected)) if clid.entity_type() != expected => {
                Err(CldfError::Identifier {
                    segment: crate::types::ClidSegment::EntityType,
                    value: clid.to_string(),
                    reason: format!(
                        "{} {} carries a '{}' CLID",
                        Self::KIND,
                        self.id(),
                        clid.entity_type()
                    ),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Schema error for one problem of one record.
pub(crate) fn schema_problem<T: Record>(id: u32, problem: &str) -> CldfError {
    CldfError::schema(T::KIND.document(), format!("{} {id}: {problem}", T::KIND))
}

// =============================================================================
// IMPLEMENTATIONS
// =============================================================================

macro_rules! record_basics {
    ($field:ident, $clid:expr) => {
        fn id(&self) -> u32 {
            self.id
        }

        fn set_id(&mut self, id: u32) {
            self.id = id;
        }

        fn clid(&self) -> Option<&Clid> {
            self.clid.as_ref()
        }

        fn clid_slot(&mut self) -> Option<&mut Option<Clid>> {
            Some(&mut self.clid)
        }

        fn clid_type() -> Option<EntityType> {
            Some($clid)
        }

        fn problems(&self) -> Vec<String> {
            Self::problems(self)
        }

        fn within(collections: &Collections) -> &[Self] {
            &collections.$field
        }

        fn within_mut(collections: &mut Collections) -> &mut Vec<Self> {
            &mut collections.$field
        }
    };
}

impl Record for Location {
    const KIND: RecordKind = RecordKind::Location;
    record_basics!(locations, EntityType::Location);

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    fn relink(&mut self, _map: &dyn Relink) -> Result<(), Reference> {
        Ok(())
    }
}

impl Record for Sector {
    const KIND: RecordKind = RecordKind::Sector;
    record_basics!(sectors, EntityType::Sector);

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new("locationId", RecordKind::Location, self.location_id)]
    }

    fn relink(&mut self, map: &dyn Relink) -> Result<(), Reference> {
        remap(map, "locationId", RecordKind::Location, &mut self.location_id)
    }
}

impl Record for Route {
    const KIND: RecordKind = RecordKind::Route;
    record_basics!(routes, EntityType::Route);

    fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        if let Some(id) = self.location_id {
            refs.push(Reference::new("locationId", RecordKind::Location, id));
        }
        if let Some(id) = self.sector_id {
            refs.push(Reference::new("sectorId", RecordKind::Sector, id));
        }
        refs
    }

    fn relink(&mut self, map: &dyn Relink) -> Result<(), Reference> {
        remap_opt(map, "locationId", RecordKind::Location, &mut self.location_id)?;
        remap_opt(map, "sectorId", RecordKind::Sector, &mut self.sector_id)
    }
}

impl Record for Session {
    const KIND: RecordKind = RecordKind::Session;
    record_basics!(sessions, EntityType::Session);

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new("locationId", RecordKind::Location, self.location_id)]
    }

    fn relink(&mut self, map: &dyn Relink) -> Result<(), Reference> {
        remap(map, "locationId", RecordKind::Location, &mut self.location_id)
    }
}

impl Record for Climb {
    const KIND: RecordKind = RecordKind::Climb;
    record_basics!(climbs, EntityType::Climb);

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::new("sessionId", RecordKind::Session, self.session_id)];
        if let Some(id) = self.route_id {
            refs.push(Reference::new("routeId", RecordKind::Route, id));
        }
        for tag in self.tags.iter().flatten() {
            if let TagRef::Id(id) = tag {
                refs.push(Reference::new("tags", RecordKind::Tag, *id));
            }
        }
        refs
    }

    fn relink(&mut self, map: &dyn Relink) -> Result<(), Reference> {
        remap(map, "sessionId", RecordKind::Session, &mut self.session_id)?;
        remap_opt(map, "routeId", RecordKind::Route, &mut self.route_id)?;
        for tag in self.tags.iter_mut().flatten() {
            match tag {
                TagRef::Id(id) => remap(map, "tags", RecordKind::Tag, id)?,
                TagRef::Name(name) => {
                    if let Some(canonical) = map.tag_name(name) {
                        *name = canonical;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Record for MediaItem {
    const KIND: RecordKind = RecordKind::Media;
    record_basics!(media, EntityType::Media);

    fn references(&self) -> Vec<Reference> {
        self.climb_id
            .map(|id| Reference::new("climbId", RecordKind::Climb, id))
            .into_iter()
            .collect()
    }

    fn relink(&mut self, map: &dyn Relink) -> Result<(), Reference> {
        remap_opt(map, "climbId", RecordKind::Climb, &mut self.climb_id)
    }

    fn coerced(raw: &Value) -> Vec<String> {
        match raw.get("designation").and_then(Value::as_str) {
            Some(text) if MediaDesignation::parse(text).is_none() => vec![format!(
                "media {}: designation '{text}' coerced to '{}'",
                raw.get("id").and_then(Value::as_u64).unwrap_or_default(),
                MediaDesignation::FALLBACK
            )],
            _ => Vec::new(),
        }
    }
}

impl Record for Tag {
    const KIND: RecordKind = RecordKind::Tag;

    fn id(&self) -> u32 {
        self.id
    }

    fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    fn clid(&self) -> Option<&Clid> {
        None
    }

    fn clid_slot(&mut self) -> Option<&mut Option<Clid>> {
        None
    }

    fn clid_type() -> Option<EntityType> {
        None
    }

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    fn relink(&mut self, _map: &dyn Relink) -> Result<(), Reference> {
        Ok(())
    }

    fn problems(&self) -> Vec<String> {
        Self::problems(self)
    }

    fn within(collections: &Collections) -> &[Self] {
        &collections.tags
    }

    fn within_mut(collections: &mut Collections) -> &mut Vec<Self> {
        &mut collections.tags
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::model::enums::{ClimbType, FinishType, RouteType};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    struct Table(BTreeMap<(RecordKind, u32), u32>);

    impl Relink for Table {
        fn resolve(&self, target: RecordKind, id: u32) -> Option<u32> {
            self.0.get(&(target, id)).copied()
        }

        fn tag_name(&self, name: &str) -> Option<String> {
            (name.eq_ignore_ascii_case("crimpy")).then(|| "crimpy".to_string())
        }
    }

    fn climb() -> Climb {
        let mut climb = Climb::new(
            5,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            ClimbType::Boulder,
            FinishType::Top,
        );
        climb.id = 1;
        climb.route_id = Some(2);
        climb.tags = Some(vec![TagRef::Id(3), TagRef::from("Crimpy")]);
        climb
    }

    #[test]
    fn references_list_every_key() {
        let refs = climb().references();
        let fields: Vec<_> = refs.iter().map(|r| r.field).collect();
        assert_eq!(fields, ["sessionId", "routeId", "tags"]);
    }

    #[test]
    fn relink_rewrites_ids_and_tag_names() {
        let table = Table(BTreeMap::from([
            ((RecordKind::Session, 5), 50),
            ((RecordKind::Route, 2), 20),
            ((RecordKind::Tag, 3), 30),
        ]));
        let mut c = climb();
        c.relink(&table).unwrap();
        assert_eq!(c.session_id, 50);
        assert_eq!(c.route_id, Some(20));
        assert_eq!(
            c.tags,
            Some(vec![TagRef::Id(30), TagRef::Name("crimpy".to_string())])
        );
    }

    #[test]
    fn relink_reports_first_dangling_key() {
        let table = Table(BTreeMap::from([((RecordKind::Session, 5), 50)]));
        let err = climb().relink(&table).unwrap_err();
        assert_eq!(err, Reference::new("routeId", RecordKind::Route, 2));
    }

    #[test]
    fn check_lists_every_problem() {
        let mut route = Route::new(" ", RouteType::Boulder);
        route.id = 7;
        route.height = Some(-2.0);
        route.quality_rating = Some(9);

        let Err(CldfError::Schema { document, detail }) = route.check() else {
            panic!("expected schema error");
        };
        assert_eq!(document, "routes.json");
        assert!(detail.starts_with("route 7: "), "{detail}");
        assert!(detail.contains("name is required"), "{detail}");
        assert!(detail.contains("height -2 must be >= 0"), "{detail}");
        assert!(detail.contains("qualityRating 9"), "{detail}");
        assert_eq!(detail.matches("; ").count(), 2, "{detail}");

        assert!(Route::new("Midnight Lightning", RouteType::Boulder).check().is_ok());
    }

    #[test]
    fn check_clid_catches_wrong_type() {
        let mut location = Location::new("Gym", true);
        location.clid = Some(Clid::generate(EntityType::Route));
        assert!(matches!(
            location.check_clid(),
            Err(CldfError::Identifier { .. })
        ));
        location.clid = Some(Clid::generate(EntityType::Location));
        assert!(location.check_clid().is_ok());
    }

    #[test]
    fn coerced_designation_is_reported() {
        let raw = serde_json::json!({"id": 4, "type": "photo", "path": "x", "designation": "selfie"});
        let warnings = MediaItem::coerced(&raw);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("selfie"));
    }
}
