use std::path::{Path, PathBuf};

/// Result alias used across the crate.
pub type CarResult<T> = Result<T, CarError>;

/// Every failure surfaced by the key codec, surfaces, CSI generator, storage engine and catalog.
#[derive(thiserror::Error, Debug)]
pub enum CarError {
    /// A rendition key or key token could not be encoded or decoded.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// A bitmap surface could not be allocated.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// The slice rectangles do not agree with the declared count or layout.
    #[error("slice count mismatch: declared {declared}, found {found}")]
    SliceCountMismatch {
        /// Count declared when the generator was created.
        declared: u32,
        /// Count actually supplied (or accepted by the layout).
        found: u32,
    },

    /// A CSI metadata value or CSI blob is out of range or malformed.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// A CSI generator was mutated after it produced its representation.
    #[error("csi generator already finalized")]
    BuilderFinalized,

    /// The container file does not exist.
    #[error("container not found: '{}'", path.display())]
    NotFound {
        /// Path that was opened.
        path: PathBuf,
    },

    /// The container exists but no complete generation could be read from it.
    #[error("corrupt container '{}': {reason}", path.display())]
    CorruptContainer {
        /// Path of the container.
        path: PathBuf,
        /// What failed to parse.
        reason: String,
    },

    /// No asset is stored under the requested key.
    #[error("no asset stored for key {0}")]
    KeyNotFound(String),

    /// A mutation was attempted on a storage opened read-only.
    #[error("storage '{}' is opened read-only", path.display())]
    ReadOnly {
        /// Path of the container.
        path: PathBuf,
    },

    /// The catalog could not be opened because its storage failed to open.
    #[error("failed to open catalog '{}'", path.display())]
    CatalogOpen {
        /// Path of the catalog file.
        path: PathBuf,
        /// Underlying storage failure.
        #[source]
        source: Box<CarError>,
    },

    /// Filesystem failure with the path it happened on.
    #[error("i/o error on '{}': {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The pixel codec failed to compress or decompress layer data.
    #[error("codec error: {0}")]
    Codec(String),

    /// Anything else, with its context chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CarError {
    pub fn malformed_key(msg: impl Into<String>) -> Self {
        Self::MalformedKey(msg.into())
    }

    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        Self::CorruptContainer {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// `true` for failures that come from the filesystem rather than from the data itself.
    pub fn is_io(&self) -> bool {
        match self {
            Self::Io { .. } | Self::NotFound { .. } => true,
            Self::CatalogOpen { source, .. } => source.is_io(),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
