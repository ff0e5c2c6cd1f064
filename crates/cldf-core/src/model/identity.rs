//! # Identity Promotion
//!
//! Giving archive-local records their global CLIDs.
//!
//! Locations derive a deterministic CLID from what they physically are, so
//! two devices logging the same crag agree without talking to each other.
//! Sectors and routes derive theirs from the parent location's CLID.
//! Everything else is user content and gets a random CLID.
//!
//! Writing an archive never assigns CLIDs; call [`assign_missing_clids`]
//! explicitly.

use crate::clid::{Clid, EntityType};
use crate::model::archive::Archive;
use crate::model::entities::{Climb, Location, MediaItem, Route, Sector, Session};
use crate::model::enums::RouteType;
use crate::model::record::Record;
use crate::primitives::{LOCATIONS_JSON, ROUTES_JSON};
use crate::types::CldfError;
use chrono::Datelike;
use std::collections::{BTreeMap, BTreeSet};

/// Lowercase, dashes for whitespace, only `[a-z0-9_-]`, no runs of dashes.
pub(crate) fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().to_lowercase().chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            continue;
        }
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

impl Location {
    /// The deterministic CLID for this location.
    ///
    /// Needs a two-letter country code, a name and in-range coordinates.
    pub fn derive_clid(&self) -> Result<Clid, CldfError> {
        let invalid = |reason: &str| {
            CldfError::schema(
                LOCATIONS_JSON,
                format!("location {}: cannot derive CLID: {reason}", self.id),
            )
        };

        let country = match self.country.as_deref().map(str::trim) {
            Some(c) if c.chars().count() == 2 => c.to_uppercase(),
            _ => return Err(invalid("country must be an ISO 3166-1 alpha-2 code")),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name is required"));
        }
        let Some(coordinates) = self.coordinates else {
            return Err(invalid("coordinates are required"));
        };
        if let Some(problem) = coordinates.problems().into_iter().next() {
            return Err(invalid(&problem));
        }

        let components = [
            country,
            self.state.as_deref().unwrap_or_default().to_lowercase(),
            self.city.as_deref().map(normalize).unwrap_or_default(),
            normalize(&self.name),
            format!("{:.6}", coordinates.latitude),
            format!("{:.6}", coordinates.longitude),
            if self.is_indoor { "indoor" } else { "outdoor" }.to_string(),
        ];
        let input = components
            .iter()
            .filter(|c| !c.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(":");

        Ok(Clid::from_name(EntityType::Location, &input))
    }
}

impl Sector {
    /// Deterministic CLID under the parent location's CLID.
    ///
    /// A sector without an `order` derives as order 0.
    #[must_use]
    pub fn derive_clid(&self, location: &Clid) -> Clid {
        let input = format!(
            "{}:{}:{}",
            location.uuid().hyphenated(),
            normalize(&self.name),
            self.order.unwrap_or(0)
        );
        Clid::from_name(EntityType::Sector, &input)
    }
}

impl Route {
    /// Deterministic CLID under the parent location's CLID.
    ///
    /// Needs a name and at least one grade. The grade used is the first of
    /// YDS, French, UIAA, V-scale and Font that is present; first ascent and
    /// height narrow the identity when known.
    pub fn derive_clid(&self, location: &Clid) -> Result<Clid, CldfError> {
        let invalid = |reason: &str| {
            CldfError::schema(
                ROUTES_JSON,
                format!("route {}: cannot derive CLID: {reason}", self.id),
            )
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is required"));
        }
        let grade = self
            .grades
            .as_ref()
            .and_then(|g| {
                [&g.yds, &g.french, &g.uiaa, &g.v_scale, &g.font]
                    .into_iter()
                    .find_map(|grade| grade.as_deref().filter(|text| !text.trim().is_empty()))
            })
            .ok_or_else(|| invalid("a grade is required"))?;

        let first_ascent = self.first_ascent.as_ref();
        let components = [
            location.uuid().hyphenated().to_string(),
            normalize(&self.name),
            standardize_grade(grade),
            first_ascent
                .and_then(|fa| fa.date)
                .map(|date| date.year().to_string())
                .unwrap_or_default(),
            first_ascent
                .and_then(|fa| fa.name.as_deref())
                .map(normalize)
                .unwrap_or_default(),
            self.height.map(|h| format!("{h:.1}")).unwrap_or_default(),
            match self.route_type {
                RouteType::Boulder => "boulder",
                RouteType::Route => "sport",
            }
            .to_string(),
        ];

        Ok(Clid::from_name(EntityType::Route, &components.join(":")))
    }
}

/// Grades compare without whitespace and case: `5.10 A` is `5.10a`.
fn standardize_grade(grade: &str) -> String {
    grade
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

// =============================================================================
// ASSIGNMENT PASS
// =============================================================================

/// Outcome of [`assign_missing_clids`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClidAssignment {
    pub archive: Archive,
    /// CLIDs given out by this pass.
    pub assigned: usize,
    /// Records left without a CLID because they fail their own checks.
    pub warnings: Vec<String>,
}

/// Give every record that can carry a CLID one, leaving existing CLIDs alone.
///
/// Returns a new archive. Locations, sectors and routes get a deterministic
/// CLID when they have the fields for one and it isn't already taken in
/// this archive; otherwise, and for everything else, a random one.
///
/// Records are visited in collection order, so every record that repeats
/// an id still gets its own CLID. For sectors and routes the parent is the
/// first location carrying the referenced id. A record that fails its
/// field checks, as a leniently read archive may contain, is skipped with
/// a warning instead of failing the pass.
#[must_use]
pub fn assign_missing_clids(mut archive: Archive) -> ClidAssignment {
    let mut pass = Pass::default();

    let mut taken = existing::<Location>(&archive);
    let mut location_clids = BTreeMap::new();
    for location in archive.records_mut::<Location>() {
        if location.clid.is_none() && pass.eligible(&*location) {
            let clid = location
                .derive_clid()
                .ok()
                .filter(|derived| !taken.contains(derived))
                .unwrap_or_else(|| Clid::generate(EntityType::Location));
            location.clid = Some(clid);
            taken.insert(clid);
            pass.assigned += 1;
        }
        if let Some(clid) = location.clid {
            location_clids.entry(location.id).or_insert(clid);
        }
    }

    let mut taken = existing::<Sector>(&archive);
    let mut sector_locations = BTreeMap::new();
    for sector in archive.records_mut::<Sector>() {
        sector_locations.entry(sector.id).or_insert(sector.location_id);
        if sector.clid.is_some() || !pass.eligible(&*sector) {
            continue;
        }
        let clid = location_clids
            .get(&sector.location_id)
            .map(|parent| sector.derive_clid(parent))
            .filter(|derived| !taken.contains(derived))
            .unwrap_or_else(|| Clid::generate(EntityType::Sector));
        sector.clid = Some(clid);
        taken.insert(clid);
        pass.assigned += 1;
    }

    let mut taken = existing::<Route>(&archive);
    for route in archive.records_mut::<Route>() {
        if route.clid.is_some() || !pass.eligible(&*route) {
            continue;
        }
        let location_id = route
            .location_id
            .or_else(|| route.sector_id.and_then(|s| sector_locations.get(&s).copied()));
        let clid = location_id
            .and_then(|id| location_clids.get(&id))
            .and_then(|parent| route.derive_clid(parent).ok())
            .filter(|derived| !taken.contains(derived))
            .unwrap_or_else(|| Clid::generate(EntityType::Route));
        route.clid = Some(clid);
        taken.insert(clid);
        pass.assigned += 1;
    }

    pass.fill_random::<Session>(&mut archive);
    pass.fill_random::<Climb>(&mut archive);
    pass.fill_random::<MediaItem>(&mut archive);

    tracing::debug!(
        assigned = pass.assigned,
        skipped = pass.warnings.len(),
        "assigned missing CLIDs"
    );
    ClidAssignment {
        archive,
        assigned: pass.assigned,
        warnings: pass.warnings,
    }
}

fn existing<T: Record>(archive: &Archive) -> BTreeSet<Clid> {
    archive.records::<T>().iter().filter_map(|r| r.clid().copied()).collect()
}

#[derive(Default)]
struct Pass {
    assigned: usize,
    warnings: Vec<String>,
}

impl Pass {
    /// Whether `record` passes its own checks; records a warning if not.
    fn eligible<T: Record>(&mut self, record: &T) -> bool {
        match record.check() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(kind = %T::KIND, id = record.id(), error = %e, "no CLID assigned");
                self.warnings
                    .push(format!("{} {} left without a CLID: {e}", T::KIND, record.id()));
                false
            }
        }
    }

    fn fill_random<T: Record>(&mut self, archive: &mut Archive) {
        let Some(entity_type) = T::clid_type() else {
            return;
        };
        for index in 0..archive.records::<T>().len() {
            let record = &archive.records::<T>()[index];
            if record.clid().is_some() || !self.eligible(record) {
                continue;
            }
            if let Some(slot) = archive.records_mut::<T>()[index].clid_slot() {
                *slot = Some(Clid::generate(entity_type));
                self.assigned += 1;
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
