//! # Codec Configuration
//!
//! One immutable value that every codec, verifier and merge call reads.
//! Nothing here is global; two codecs with different configurations can
//! run side by side.
//!
//! ```toml
//! digest = "SHA-256"   # or "BLAKE3"
//! mode = "strict"      # or "lenient"
//! pretty = false
//! ```

use crate::formats::DigestAlgorithm;
use crate::types::{CldfError, Mode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum configuration file size accepted by [`CodecConfig::load`].
const MAX_CONFIG_SIZE: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Digest written into new checksums documents.
    pub digest: DigestAlgorithm,
    /// Strict aborts on the first integrity or referential failure.
    pub mode: Mode,
    /// Indent JSON documents.
    pub pretty: bool,
}

impl CodecConfig {
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            mode: Mode::Lenient,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Parse TOML; unknown keys are rejected.
    pub fn from_toml_str(text: &str) -> Result<Self, CldfError> {
        toml::from_str(text).map_err(|e| CldfError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, CldfError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| CldfError::Config(format!("{}: {e}", path.display())))?;
        if metadata.len() > MAX_CONFIG_SIZE {
            return Err(CldfError::Config(format!(
                "{}: file too large ({} bytes, max {MAX_CONFIG_SIZE})",
                path.display(),
                metadata.len()
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| CldfError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}
