use crate::foundation::error::{CarError, CarResult};

/// Lossless byte codec used for CSI layer pixels.
pub trait PixelCodec: Send + Sync {
    /// Compress one layer's raw bytes.
    fn compress(&self, raw: &[u8]) -> CarResult<Vec<u8>>;

    /// Inverse of [`PixelCodec::compress`]; `raw_len` is the exact expected output length.
    fn decompress(&self, stored: &[u8], raw_len: usize) -> CarResult<Vec<u8>>;
}

/// zstd at a fixed level. Output for a given level and input is deterministic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZstdCodec {
    /// zstd compression level.
    pub level: i32,
}

/// Compression level used when none is configured.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

impl Default for ZstdCodec {
    fn default() -> Self {
        Self {
            level: DEFAULT_ZSTD_LEVEL,
        }
    }
}

impl PixelCodec for ZstdCodec {
    fn compress(&self, raw: &[u8]) -> CarResult<Vec<u8>> {
        zstd::bulk::compress(raw, self.level).map_err(|e| CarError::codec(e.to_string()))
    }

    fn decompress(&self, stored: &[u8], raw_len: usize) -> CarResult<Vec<u8>> {
        let out = zstd::bulk::decompress(stored, raw_len).map_err(|e| CarError::codec(e.to_string()))?;
        if out.len() != raw_len {
            return Err(CarError::codec(format!(
                "decompressed {} bytes, expected {raw_len}",
                out.len()
            )));
        }
        Ok(out)
    }
}
