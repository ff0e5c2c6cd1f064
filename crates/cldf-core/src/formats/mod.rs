//! # Formats Module
//!
//! Byte-level building blocks of the archive: the zip container, document
//! digests and the JSON documents. Nothing here knows about read/write
//! policy; that lives in the codec.

pub mod container;
pub mod digest;
pub mod documents;

pub use container::{Container, Member};
pub use digest::{ChecksumsDocument, DigestAlgorithm};
pub use documents::{Decoded, decode_collection, decode_json, encode_collection, encode_json};
