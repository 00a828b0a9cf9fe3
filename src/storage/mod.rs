//! Crash-safe key/value container for rendition blobs.
//!
//! [`AssetStorage`] keeps the committed container image in memory, layers unsaved mutations on
//! top, and persists them either by appending a segment or by compacting into a fresh file.

pub(crate) mod blob;
pub(crate) mod engine;
pub(crate) mod format;

pub use blob::AssetBytes;
pub use engine::{AssetStorage, StorageIter};
pub use format::{Provenance, SCHEMA_VERSION};

/// Whether a container may be mutated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Reads only; mutators fail with [`CarError::ReadOnly`](crate::CarError::ReadOnly).
    #[default]
    ReadOnly,
    /// Reads and writes; a missing file opens as an empty container.
    ReadWrite,
}

/// Durability and integrity options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StorageOpts {
    /// `fsync` written files (and the directory after a compaction rename).
    pub fsync: bool,
    /// Check each blob's checksum when it is read.
    pub verify_checksums: bool,
}

impl Default for StorageOpts {
    fn default() -> Self {
        Self {
            fsync: true,
            verify_checksums: true,
        }
    }
}

/// Space accounting for a container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct StorageStats {
    /// Generation of the live segment.
    pub generation: u64,
    /// Complete segments in the file.
    pub segments: usize,
    /// Bytes of the committed file.
    pub file_len: u64,
    /// Live keys, including unsaved ones.
    pub entries: usize,
    /// Keys set since the last write.
    pub pending_entries: usize,
    /// Bytes of all live blobs.
    pub live_bytes: u64,
    /// Committed bytes a compaction would drop.
    pub reclaimable_bytes: u64,
}
