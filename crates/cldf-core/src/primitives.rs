//! # Format Primitives
//!
//! Fixed constants of the CLDF on-disk contract.
//!
//! These values are compiled into the binary and never change at runtime.
//! Changing any of them is a breaking change to the archive format.

use uuid::Uuid;

/// Format tag every manifest must carry.
pub const FORMAT_TAG: &str = "CLDF";

/// Format version written into new manifests.
pub const FORMAT_VERSION: &str = "1.0.0";

// =============================================================================
// DOCUMENT NAMES
// =============================================================================

pub const MANIFEST_JSON: &str = "manifest.json";
pub const LOCATIONS_JSON: &str = "locations.json";
pub const SECTORS_JSON: &str = "sectors.json";
pub const ROUTES_JSON: &str = "routes.json";
pub const SESSIONS_JSON: &str = "sessions.json";
pub const CLIMBS_JSON: &str = "climbs.json";
pub const TAGS_JSON: &str = "tags.json";
pub const MEDIA_METADATA_JSON: &str = "media-metadata.json";
pub const CHECKSUMS_JSON: &str = "checksums.json";

/// Prefix for embedded media members (raw bytes, not JSON).
pub const MEDIA_DIR_PREFIX: &str = "media/";

// =============================================================================
// GLOBAL IDENTIFIERS
// =============================================================================

/// Literal first segment of every CLID.
pub const CLID_NAMESPACE: &str = "clid";

/// Base of the canonical short URL; the CLID short form is appended.
pub const CLID_URL_BASE: &str = "https://crushlog.pro/g/";

/// Number of leading uuid hex characters in the short form.
pub const CLID_SHORT_FORM_LEN: usize = 8;

/// Namespace for name-based (v5) identifiers.
///
/// Every device must use the same namespace so that the same crag
/// yields the same CLID everywhere.
pub const CLID_V5_NAMESPACE: Uuid = Uuid::from_u128(0x6ba7_b810_9dad_11d1_80b4_00c0_4fd4_30c8);

// =============================================================================
// CONTAINER LIMITS
// =============================================================================

/// Maximum accepted container size in bytes.
///
/// Checked before the container directory is parsed.
pub const MAX_CONTAINER_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Maximum number of members in one container.
pub const MAX_MEMBER_COUNT: usize = 10_000;

/// Maximum decompressed size of a single member.
///
/// Enforced while inflating, so a forged size field cannot bypass it.
pub const MAX_MEMBER_SIZE: u64 = 100 * 1024 * 1024; // 100 MB
