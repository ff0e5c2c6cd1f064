//! # Entity Records
//!
//! The typed records an archive carries. Field names serialize in camelCase
//! in declaration order; absent optional fields are omitted; unknown fields
//! in input are ignored so newer exporters stay readable.
//!
//! Each record exposes `problems()`, the field-level invariants that can't be
//! expressed in the type itself. The archive builder rejects a record with
//! any problem; the verifier reports them as schema errors on read.

use crate::clid::Clid;
use crate::primitives::TAGS_JSON;
use crate::types::CldfError;
use crate::model::enums::{
    BelayType, ClimbType, FinishType, GradeSystem, MediaDesignation, MediaSource, MediaType,
    PredefinedTagKey, RockType, RouteType, SessionType, TerrainType,
};
use crate::model::time::{Timestamp, optional_timestamp};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Upper bound of every star rating.
const MAX_RATING: u8 = 5;

fn blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn check_height(height: Option<f64>, problems: &mut Vec<String>) {
    if let Some(h) = height
        && !(h.is_finite() && h >= 0.0)
    {
        problems.push(format!("height {h} must be >= 0"));
    }
}

fn check_rating(field: &str, rating: Option<u8>, problems: &mut Vec<String>) {
    if let Some(r) = rating
        && r > MAX_RATING
    {
        problems.push(format!("{field} {r} outside 0..={MAX_RATING}"));
    }
}

// =============================================================================
// SHARED VALUE TYPES
// =============================================================================

/// WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const LATITUDE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
    pub const LONGITUDE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !Self::LATITUDE.contains(&self.latitude) {
            problems.push(format!("latitude {} outside [-90, 90]", self.latitude));
        }
        if !Self::LONGITUDE.contains(&self.longitude) {
            problems.push(format!("longitude {} outside [-180, 180]", self.longitude));
        }
        problems
    }
}

/// A grade in one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub system: GradeSystem,
    pub grade: String,
}

/// A route's grade in each system it has been graded in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGrades {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v_scale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub french: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yds: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uiaa: Option<String>,
}

/// Who first climbed a route, and when.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstAscent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

/// Conditions during a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind: Option<String>,
}

// =============================================================================
// LOCATION
// =============================================================================

/// A crag or gym.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clid: Option<Clid>,
    pub name: String,
    pub is_indoor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub starred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rock_type: Option<RockType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain_type: Option<TerrainType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_info: Option<String>,
    #[serde(
        default,
        with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Timestamp>,
}

impl Location {
    #[must_use]
    pub fn new(name: impl Into<String>, is_indoor: bool) -> Self {
        Self {
            id: 0,
            clid: None,
            name: name.into(),
            is_indoor,
            coordinates: None,
            country: None,
            state: None,
            city: None,
            address: None,
            starred: false,
            rock_type: None,
            terrain_type: None,
            access_info: None,
            created_at: None,
        }
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if blank(&self.name) {
            problems.push("name is required".to_string());
        }
        if let Some(c) = &self.coordinates {
            problems.extend(c.problems());
        }
        problems
    }
}

// =============================================================================
// SECTOR
// =============================================================================

/// A named area inside a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sector {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clid: Option<Clid>,
    pub location_id: u32,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    /// Position among the location's sectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(
        default,
        with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Timestamp>,
}

impl Sector {
    #[must_use]
    pub fn new(location_id: u32, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            clid: None,
            location_id,
            name: name.into(),
            is_default: false,
            order: None,
            description: None,
            approach: None,
            coordinates: None,
            created_at: None,
        }
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if blank(&self.name) {
            problems.push("name is required".to_string());
        }
        if let Some(c) = &self.coordinates {
            problems.extend(c.problems());
        }
        problems
    }
}

// =============================================================================
// ROUTE
// =============================================================================

/// A boulder problem or roped line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clid: Option<Clid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_id: Option<u32>,
    pub name: String,
    pub route_type: RouteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grades: Option<RouteGrades>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_ascent: Option<FirstAscent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gear_notes: Option<String>,
    #[serde(
        default,
        with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Timestamp>,
    #[serde(
        default,
        with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<Timestamp>,
}

impl Route {
    #[must_use]
    pub fn new(name: impl Into<String>, route_type: RouteType) -> Self {
        Self {
            id: 0,
            clid: None,
            location_id: None,
            sector_id: None,
            name: name.into(),
            route_type,
            grades: None,
            height: None,
            first_ascent: None,
            quality_rating: None,
            color: None,
            beta: None,
            gear_notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if blank(&self.name) {
            problems.push("name is required".to_string());
        }
        check_height(self.height, &mut problems);
        check_rating("qualityRating", self.quality_rating, &mut problems);
        problems
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One day (or visit) of climbing at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clid: Option<Clid>,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    /// Display name of the location, as entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub location_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_indoor: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climb_type: Option<ClimbType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<SessionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partners: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach_time: Option<u32>,
    #[serde(default)]
    pub is_ongoing: bool,
}

impl Session {
    #[must_use]
    pub fn new(date: NaiveDate, location_id: u32) -> Self {
        Self {
            id: 0,
            clid: None,
            date,
            start_time: None,
            end_time: None,
            location: None,
            location_id,
            is_indoor: None,
            climb_type: None,
            session_type: None,
            partners: None,
            weather: None,
            notes: None,
            approach_time: None,
            is_ongoing: false,
        }
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let (Some(start), Some(end)) = (self.start_time, self.end_time)
            && end < start
        {
            problems.push(format!("endTime {end} is before startTime {start}"));
        }
        problems
    }
}

// =============================================================================
// CLIMB
// =============================================================================

/// A tag attached to a climb, by archive-local id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagRef {
    Id(u32),
    Name(String),
}

impl From<&str> for TagRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// One logged attempt sequence on one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Climb {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clid: Option<Clid>,
    pub session_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<u32>,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grades: Option<Grade>,
    #[serde(rename = "type")]
    pub climb_type: ClimbType,
    pub finish_type: FinishType,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub falls: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub belay_type: Option<BelayType>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partners: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_indoor: Option<bool>,
}

const fn default_attempts() -> u32 {
    1
}

impl Climb {
    #[must_use]
    pub fn new(
        session_id: u32,
        date: NaiveDate,
        climb_type: ClimbType,
        finish_type: FinishType,
    ) -> Self {
        Self {
            id: 0,
            clid: None,
            session_id,
            route_id: None,
            date,
            time: None,
            route_name: None,
            grades: None,
            climb_type,
            finish_type,
            attempts: default_attempts(),
            falls: None,
            belay_type: None,
            duration: None,
            height: None,
            rating: None,
            notes: None,
            tags: None,
            beta: None,
            partners: None,
            is_indoor: None,
        }
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.finish_type.allowed_for(self.climb_type) {
            problems.push(format!(
                "finishType '{}' is only valid for route climbs",
                self.finish_type
            ));
        }
        check_height(self.height, &mut problems);
        check_rating("rating", self.rating, &mut problems);
        problems
    }
}

// =============================================================================
// TAG
// =============================================================================

/// A label climbs can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: u32,
    pub name: String,
    pub is_predefined: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predefined_tag_key: Option<PredefinedTagKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Tag {
    /// Validating constructor: a predefined tag must name its key.
    pub fn new(
        name: impl Into<String>,
        is_predefined: bool,
        predefined_tag_key: Option<PredefinedTagKey>,
    ) -> Result<Self, CldfError> {
        let tag = Self {
            id: 0,
            name: name.into(),
            is_predefined,
            predefined_tag_key,
            color: None,
            category: None,
        };
        match tag.problems().into_iter().next() {
            Some(problem) => Err(CldfError::schema(
                TAGS_JSON,
                format!("tag '{}': {problem}", tag.name),
            )),
            None => Ok(tag),
        }
    }

    /// A user-defined tag.
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            is_predefined: false,
            predefined_tag_key: None,
            color: None,
            category: None,
        }
    }

    /// A built-in tag, named after its key.
    #[must_use]
    pub fn predefined(key: PredefinedTagKey) -> Self {
        Self {
            id: 0,
            name: key.as_str().to_string(),
            is_predefined: true,
            predefined_tag_key: Some(key),
            color: None,
            category: None,
        }
    }

    /// Key used to recognize the same tag across archives.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        self.name.trim().to_lowercase()
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if blank(&self.name) {
            problems.push("name is required".to_string());
        }
        if self.is_predefined && self.predefined_tag_key.is_none() {
            problems.push("predefined tag requires predefinedTagKey".to_string());
        }
        problems
    }
}

// =============================================================================
// MEDIA
// =============================================================================

/// A photo or video attached to a climb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clid: Option<Clid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climb_id: Option<u32>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MediaSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<MediaDesignation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(
        default,
        with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<Timestamp>,
}

impl MediaItem {
    /// Media stored at a file path (inside `media/` or external).
    #[must_use]
    pub fn from_path(media_type: MediaType, path: impl Into<String>) -> Self {
        Self::bare(media_type, Some(path.into()), None)
    }

    /// Media held by the device library under an asset identifier.
    #[must_use]
    pub fn from_asset(media_type: MediaType, asset_id: impl Into<String>) -> Self {
        Self::bare(media_type, None, Some(asset_id.into()))
    }

    fn bare(media_type: MediaType, path: Option<String>, asset_id: Option<String>) -> Self {
        Self {
            id: 0,
            clid: None,
            climb_id: None,
            media_type,
            path,
            asset_id,
            thumbnail_path: None,
            source: None,
            designation: None,
            caption: None,
            created_at: None,
        }
    }

    pub fn problems(&self) -> Vec<String> {
        match (&self.path, &self.asset_id) {
            (Some(_), Some(_)) => vec!["carries both path and assetId".to_string()],
            (None, None) => vec!["carries neither path nor assetId".to_string()],
            _ => Vec::new(),
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

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn coordinates_bounds() {
        assert!(Coordinates::new(90.0, -180.0).problems().is_empty());
        assert_eq!(Coordinates::new(90.5, 0.0).problems().len(), 1);
        assert_eq!(Coordinates::new(0.0, 181.0).problems().len(), 1);
        assert_eq!(Coordinates::new(f64::NAN, f64::NAN).problems().len(), 2);
    }

    #[test]
    fn predefined_tag_requires_key() {
        assert!(Tag::new("crimpy", true, None).is_err());
        assert!(Tag::new("crimpy", true, Some(PredefinedTagKey::Crimpy)).is_ok());
        assert!(Tag::new("project wall", false, None).is_ok());
        assert!(Tag::predefined(PredefinedTagKey::Crimpy).problems().is_empty());
    }

    #[test]
    fn onsight_boulder_is_rejected() {
        let climb = Climb::new(1, day(), ClimbType::Boulder, FinishType::Onsight);
        assert_eq!(climb.problems().len(), 1);
        let climb = Climb::new(1, day(), ClimbType::Route, FinishType::Onsight);
        assert!(climb.problems().is_empty());
    }

    #[test]
    fn media_needs_exactly_one_locator() {
        assert!(MediaItem::from_path(MediaType::Photo, "media/a.jpg").problems().is_empty());
        let mut both = MediaItem::from_asset(MediaType::Video, "PH-1");
        assert!(both.problems().is_empty());
        both.path = Some("media/a.mp4".to_string());
        assert_eq!(both.problems().len(), 1);
        both.path = None;
        both.asset_id = None;
        assert_eq!(both.problems().len(), 1);
    }

    #[test]
    fn negative_height_is_rejected() {
        let mut route = Route::new("Midnight Lightning", RouteType::Boulder);
        route.height = Some(-1.0);
        assert_eq!(route.problems().len(), 1);
        route.height = Some(0.0);
        assert!(route.problems().is_empty());
    }

    #[test]
    fn climb_json_shape() {
        let mut climb = Climb::new(3, day(), ClimbType::Boulder, FinishType::Flash);
        climb.id = 7;
        climb.tags = Some(vec![TagRef::from("crimpy"), TagRef::Id(2)]);
        let json = serde_json::to_value(&climb).unwrap();
        assert_eq!(json["sessionId"], 3);
        assert_eq!(json["type"], "boulder");
        assert_eq!(json["finishType"], "flash");
        assert_eq!(json["date"], "2024-01-15");
        assert_eq!(json["tags"], serde_json::json!(["crimpy", 2]));
        assert!(json.get("routeId").is_none(), "absent fields are omitted");
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let json = r#"{"id":1,"name":"Gym","isIndoor":true,"futureField":{"x":1}}"#;
        let location: Location = serde_json::from_str(json).unwrap();
        assert_eq!(location.name, "Gym");
    }

    #[test]
    fn missing_required_field_fails() {
        let json = r#"{"id":1,"date":"2024-01-15"}"#;
        let err = serde_json::from_str::<Session>(json).unwrap_err();
        assert!(err.to_string().contains("locationId"));
    }

    #[test]
    fn attempts_default_to_one() {
        let json = r#"{"id":1,"sessionId":1,"date":"2024-01-15","type":"route","finishType":"redpoint"}"#;
        let climb: Climb = serde_json::from_str(json).unwrap();
        assert_eq!(climb.attempts, 1);
    }
}
