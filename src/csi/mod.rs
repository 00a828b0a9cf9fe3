//! Composite rendition (CSI) builder and reader.
//!
//! [`CsiGenerator`] packs borrowed [`BitmapSurface`](crate::surface::BitmapSurface) layers, slice
//! rectangles and scalar metadata into the CSI blob stored by the asset storage engine.
//! [`DecodedCsi`] reads a blob back and can flatten it into a single surface.

pub(crate) mod codec;
pub(crate) mod flatten;
pub(crate) mod format;
pub(crate) mod generator;
pub(crate) mod layout;

pub use codec::{DEFAULT_ZSTD_LEVEL, PixelCodec, ZstdCodec};
pub use format::{CSI_MAGIC, CSI_VERSION, CsiMetadata, DecodedCsi, DecodedLayer, MAX_NAME_BYTES};
pub use generator::CsiGenerator;
pub use layout::{BlendMode, RenditionLayout, SliceRule, TemplateRenderingMode};

/// Options for producing CSI blobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CsiOpts {
    /// zstd level for layer compression.
    pub compression_level: i32,
    /// Compress layers on the rayon pool when there is more than one.
    pub parallel_compression: bool,
}

impl Default for CsiOpts {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_ZSTD_LEVEL,
            parallel_compression: true,
        }
    }
}
