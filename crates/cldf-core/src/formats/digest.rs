//! # Document Digests
//!
//! Digest algorithms and the `checksums.json` document.
//!
//! The checksums document names its algorithm, so a reader honours whatever
//! the writer chose. SHA-256 is the default and what every other CLDF
//! implementation expects; BLAKE3 is available for faster local pipelines.

use crate::types::CldfError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// ALGORITHM
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl DigestAlgorithm {
    pub const ALL: [Self; 2] = [Self::Sha256, Self::Blake3];
    pub const NAMES: &'static [&'static str] = &["SHA-256", "BLAKE3"];

    /// Name written into the checksums document.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Blake3 => "BLAKE3",
        }
    }

    /// Case-insensitive; `SHA256` is accepted for `SHA-256`. Meant for
    /// configuration input, not for sealed documents.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SHA-256" | "SHA256" => Some(Self::Sha256),
            "BLAKE3" => Some(Self::Blake3),
            _ => None,
        }
    }

    /// Lowercase hex digest of `bytes`.
    #[must_use]
    pub fn digest_hex(self, bytes: &[u8]) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(bytes)),
            Self::Blake3 => blake3::hash(bytes).to_hex().to_string(),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for DigestAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for DigestAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_name(&text).ok_or_else(|| de::Error::unknown_variant(&text, Self::NAMES))
    }
}

// =============================================================================
// CHECKSUMS DOCUMENT
// =============================================================================

/// `checksums.json`: digest per packaged member plus the algorithm name.
///
/// The algorithm is kept as text so an unknown algorithm can be reported
/// as an integrity failure instead of an unreadable document. Both fields
/// are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumsDocument {
    pub algorithm: String,
    pub files: BTreeMap<String, String>,
}

impl ChecksumsDocument {
    /// Digest every `(name, bytes)` pair with `algorithm`.
    pub fn compute<'a>(
        algorithm: DigestAlgorithm,
        members: impl IntoIterator<Item = (&'a str, &'a [u8])>,
    ) -> Self {
        Self {
            algorithm: algorithm.name().to_string(),
            files: members
                .into_iter()
                .map(|(name, bytes)| (name.to_string(), algorithm.digest_hex(bytes)))
                .collect(),
        }
    }

    /// The declared algorithm, if this implementation supports it.
    ///
    /// The name must match exactly as written; a case-altered name is
    /// treated as damage, not as an alias.
    pub fn algorithm(&self) -> Result<DigestAlgorithm, CldfError> {
        DigestAlgorithm::ALL
            .into_iter()
            .find(|a| a.name() == self.algorithm)
            .ok_or_else(|| CldfError::Integrity {
                document: crate::primitives::CHECKSUMS_JSON.to_string(),
                detail: format!(
                    "unsupported algorithm '{}'; supported: {}",
                    self.algorithm,
                    DigestAlgorithm::NAMES.join(", ")
                ),
            })
    }
}
