//! # Container Format
//!
//! An ordered set of named members packed into one deflate-compressed zip.
//!
//! Packing is byte-deterministic: members are written in the order they were
//! pushed, with a fixed modification time and fixed permissions, so packing
//! the same members twice yields identical bytes.
//!
//! ## Security
//!
//! Unpacking validates before it allocates:
//! - Total container size (`MAX_CONTAINER_SIZE`) before the directory is parsed
//! - Member count (`MAX_MEMBER_COUNT`) before any member is inflated
//! - Per-member size (`MAX_MEMBER_SIZE`) while inflating, so a forged
//!   size field in the directory cannot bypass it

use crate::primitives::{MAX_CONTAINER_SIZE, MAX_MEMBER_COUNT, MAX_MEMBER_SIZE};
use crate::types::CldfError;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// One named member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Members in container order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    members: Vec<Member>,
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member. Names are unique within a container.
    pub fn push(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> Result<(), CldfError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(CldfError::Structure(format!("duplicate member '{name}'")));
        }
        self.members.push(Member { name, bytes });
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.members
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.bytes.as_slice())
    }

    /// Raw access to a member's bytes, for repair and corruption tooling.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<u8>> {
        self.members
            .iter_mut()
            .find(|m| m.name == name)
            .map(|m| &mut m.bytes)
    }

    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    // =========================================================================
    // PACK
    // =========================================================================

    /// Serialize to zip bytes.
    pub fn pack(&self) -> Result<Vec<u8>, CldfError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for member in &self.members {
            writer
                .start_file(member.name.as_str(), options)
                .map_err(|e| pack_error(&member.name, &e))?;
            writer
                .write_all(&member.bytes)
                .map_err(|e| pack_error(&member.name, &e))?;
        }
        let cursor = writer
            .finish()
            .map_err(|e| CldfError::Structure(format!("failed to finish container: {e}")))?;
        Ok(cursor.into_inner())
    }

    // =========================================================================
    // UNPACK
    // =========================================================================

    /// Parse zip bytes, enforcing the container limits.
    pub fn unpack(bytes: &[u8]) -> Result<Self, CldfError> {
        if bytes.len() > MAX_CONTAINER_SIZE {
            return Err(CldfError::Structure(format!(
                "container too large: {} bytes (max {MAX_CONTAINER_SIZE})",
                bytes.len()
            )));
        }

        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CldfError::Structure(format!("unreadable container: {e}")))?;

        if archive.len() > MAX_MEMBER_COUNT {
            return Err(CldfError::Structure(format!(
                "too many members: {} (max {MAX_MEMBER_COUNT})",
                archive.len()
            )));
        }

        let mut container = Self::new();
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| CldfError::Structure(format!("unreadable member #{index}: {e}")))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            if file.size() > MAX_MEMBER_SIZE {
                return Err(oversized(&name));
            }

            let mut buf = Vec::new();
            file.by_ref()
                .take(MAX_MEMBER_SIZE + 1)
                .read_to_end(&mut buf)
                .map_err(|e| CldfError::Structure(format!("corrupt member '{name}': {e}")))?;
            if buf.len() as u64 > MAX_MEMBER_SIZE {
                return Err(oversized(&name));
            }

            container.push(name, buf)?;
        }

        tracing::debug!(members = container.members.len(), "container unpacked");
        Ok(container)
    }
}

fn pack_error(name: &str, err: &dyn std::fmt::Display) -> CldfError {
    CldfError::Structure(format!("failed to pack member '{name}': {err}"))
}

fn oversized(name: &str) -> CldfError {
    CldfError::Structure(format!(
        "member '{name}' exceeds {MAX_MEMBER_SIZE} bytes"
    ))
}

// =============================================================================
// TESTS
// =============================================================================
