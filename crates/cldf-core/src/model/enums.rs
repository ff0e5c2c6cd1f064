//! # Closed Enumerations
//!
//! Every string-keyed enumeration of the archive format, each backed by one
//! bidirectional table generated by `closed_enum!`.
//!
//! Matching on read is case-insensitive; writing always emits the canonical
//! spelling. Strict enumerations reject unknown values with a serde error
//! naming the accepted set. Lenient enumerations fall back to a documented
//! default instead, and the verifier reports the coercion as a warning.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// =============================================================================
// TABLE MACRO
// =============================================================================

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        closed_enum!(@table $(#[$meta])* $name { $($variant => $text),+ });

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                Self::parse(&text).ok_or_else(|| de::Error::unknown_variant(&text, Self::NAMES))
            }
        }
    };
    (
        $(#[$meta:meta])*
        pub enum $name:ident fallback $fallback:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        closed_enum!(@table $(#[$meta])* $name { $($variant => $text),+ });

        impl $name {
            /// Value used when the input matches no known spelling.
            pub const FALLBACK: Self = Self::$fallback;

            /// Parse, falling back instead of failing.
            #[must_use]
            pub fn parse_lenient(text: &str) -> Self {
                Self::parse(text).unwrap_or(Self::FALLBACK)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                Ok(Self::parse_lenient(&text))
            }
        }
    };
    (@table $(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Canonical spelling of every variant, parallel to `ALL`.
            pub const NAMES: &'static [&'static str] = &[$($text),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Case-insensitive lookup by spelling.
            #[must_use]
            pub fn parse(text: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(text.trim()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

// =============================================================================
// MANIFEST
// =============================================================================

closed_enum! {
    /// Platform that produced the archive.
    pub enum Platform {
        Ios => "iOS",
        Android => "Android",
        Web => "Web",
        Desktop => "Desktop",
    }
}

closed_enum! {
    /// How media is carried by an export.
    pub enum MediaStrategy {
        Reference => "reference",
        Thumbnails => "thumbnails",
        Full => "full",
    }
}

// =============================================================================
// CLIMBING
// =============================================================================

closed_enum! {
    pub enum ClimbType {
        Boulder => "boulder",
        Route => "route",
    }
}

closed_enum! {
    /// How a climb ended.
    pub enum FinishType {
        Flash => "flash",
        Top => "top",
        Repeat => "repeat",
        Project => "project",
        Attempt => "attempt",
        Onsight => "onsight",
        Redpoint => "redpoint",
    }
}

impl FinishType {
    /// Finish types that only exist for roped climbing.
    #[must_use]
    pub const fn requires_rope(self) -> bool {
        matches!(self, Self::Onsight | Self::Redpoint)
    }

    /// Whether this finish is allowed for the given climb type.
    #[must_use]
    pub const fn allowed_for(self, climb_type: ClimbType) -> bool {
        !self.requires_rope() || matches!(climb_type, ClimbType::Route)
    }
}

closed_enum! {
    pub enum GradeSystem {
        VScale => "vScale",
        Font => "font",
        French => "french",
        Yds => "yds",
        Uiaa => "uiaa",
    }
}

closed_enum! {
    pub enum SessionType {
        SportClimbing => "sportClimbing",
        MultiPitch => "multiPitch",
        TradClimbing => "tradClimbing",
        Bouldering => "bouldering",
        IndoorClimbing => "indoorClimbing",
        IndoorBouldering => "indoorBouldering",
        BoardSession => "boardSession",
    }
}

closed_enum! {
    pub enum BelayType {
        TopRope => "topRope",
        Lead => "lead",
        AutoBelay => "autoBelay",
    }
}

closed_enum! {
    pub enum RouteType {
        Boulder => "boulder",
        Route => "route",
    }
}

// =============================================================================
// LOCATIONS
// =============================================================================

closed_enum! {
    pub enum RockType {
        Sandstone => "sandstone",
        Limestone => "limestone",
        Granite => "granite",
        Basalt => "basalt",
        Gneiss => "gneiss",
        Quartzite => "quartzite",
        Conglomerate => "conglomerate",
        Schist => "schist",
        Dolomite => "dolomite",
        Slate => "slate",
        Rhyolite => "rhyolite",
        Gabbro => "gabbro",
        VolcanicTuff => "volcanicTuff",
        Andesite => "andesite",
        Chalk => "chalk",
    }
}

closed_enum! {
    pub enum TerrainType {
        Natural => "natural",
        Artificial => "artificial",
    }
}

// =============================================================================
// TAGS
// =============================================================================

closed_enum! {
    /// Keys of the built-in tag vocabulary.
    pub enum PredefinedTagKey {
        Overhang => "overhang",
        Slab => "slab",
        Vertical => "vertical",
        Roof => "roof",
        Crack => "crack",
        Corner => "corner",
        Arete => "arete",
        Dyno => "dyno",
        Crimpy => "crimpy",
        Slopers => "slopers",
        Jugs => "jugs",
        Pockets => "pockets",
        Technical => "technical",
        Powerful => "powerful",
        Endurance => "endurance",
    }
}

// =============================================================================
// MEDIA
// =============================================================================

closed_enum! {
    pub enum MediaType {
        Photo => "photo",
        Video => "video",
    }
}

closed_enum! {
    /// Where a media item's bytes live.
    pub enum MediaSource {
        Local => "local",
        Cloud => "cloud",
        Reference => "reference",
        Embedded => "embedded",
        External => "external",
        PhotosLibrary => "photos_library",
    }
}

closed_enum! {
    /// Purpose of a media item. Unknown values become `other`.
    pub enum MediaDesignation fallback Other {
        Topo => "topo",
        Beta => "beta",
        Approach => "approach",
        Log => "log",
        Overview => "overview",
        Conditions => "conditions",
        Gear => "gear",
        Descent => "descent",
        Other => "other",
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn assert_table<T>(all: &[T], names: &[&str], as_str: fn(T) -> &'static str, parse: fn(&str) -> Option<T>)
    where
        T: Copy + PartialEq + fmt::Debug,
    {
        assert_eq!(all.len(), names.len());
        for (variant, name) in all.iter().zip(names) {
            assert_eq!(as_str(*variant), *name);
            assert_eq!(parse(name), Some(*variant));
            assert_eq!(parse(&name.to_uppercase()), Some(*variant));
        }
        let unique: std::collections::BTreeSet<_> = names.iter().map(|n| n.to_lowercase()).collect();
        assert_eq!(unique.len(), names.len(), "spellings must not collide");
    }

    #[test]
    fn every_table_is_bidirectional() {
        assert_table(Platform::ALL, Platform::NAMES, Platform::as_str, Platform::parse);
        assert_table(MediaStrategy::ALL, MediaStrategy::NAMES, MediaStrategy::as_str, MediaStrategy::parse);
        assert_table(ClimbType::ALL, ClimbType::NAMES, ClimbType::as_str, ClimbType::parse);
        assert_table(FinishType::ALL, FinishType::NAMES, FinishType::as_str, FinishType::parse);
        assert_table(GradeSystem::ALL, GradeSystem::NAMES, GradeSystem::as_str, GradeSystem::parse);
        assert_table(SessionType::ALL, SessionType::NAMES, SessionType::as_str, SessionType::parse);
        assert_table(BelayType::ALL, BelayType::NAMES, BelayType::as_str, BelayType::parse);
        assert_table(RouteType::ALL, RouteType::NAMES, RouteType::as_str, RouteType::parse);
        assert_table(RockType::ALL, RockType::NAMES, RockType::as_str, RockType::parse);
        assert_table(TerrainType::ALL, TerrainType::NAMES, TerrainType::as_str, TerrainType::parse);
        assert_table(
            PredefinedTagKey::ALL,
            PredefinedTagKey::NAMES,
            PredefinedTagKey::as_str,
            PredefinedTagKey::parse,
        );
        assert_table(MediaType::ALL, MediaType::NAMES, MediaType::as_str, MediaType::parse);
        assert_table(MediaSource::ALL, MediaSource::NAMES, MediaSource::as_str, MediaSource::parse);
        assert_table(
            MediaDesignation::ALL,
            MediaDesignation::NAMES,
            MediaDesignation::as_str,
            MediaDesignation::parse,
        );
    }

    #[test]
    fn strict_enum_rejects_unknown_value() {
        let err = serde_json::from_str::<FinishType>("\"sent\"").unwrap_err();
        assert!(err.to_string().contains("redpoint"), "error should list accepted values");
    }

    #[test]
    fn lenient_enum_falls_back() {
        let d: MediaDesignation = serde_json::from_str("\"selfie\"").unwrap();
        assert_eq!(d, MediaDesignation::Other);
        let d: MediaDesignation = serde_json::from_str("\"TOPO\"").unwrap();
        assert_eq!(d, MediaDesignation::Topo);
    }

    #[test]
    fn serializes_canonical_spelling() {
        assert_eq!(serde_json::to_string(&Platform::Ios).unwrap(), "\"iOS\"");
        assert_eq!(
            serde_json::to_string(&MediaSource::PhotosLibrary).unwrap(),
            "\"photos_library\""
        );
    }

    #[test]
    fn rope_only_finishes() {
        assert!(FinishType::Onsight.requires_rope());
        assert!(FinishType::Redpoint.requires_rope());
        assert!(!FinishType::Flash.requires_rope());
        assert!(!FinishType::Redpoint.allowed_for(ClimbType::Boulder));
        assert!(FinishType::Redpoint.allowed_for(ClimbType::Route));
        assert!(FinishType::Top.allowed_for(ClimbType::Boulder));
    }
}
