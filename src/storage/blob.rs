use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Shared, immutable view of one stored asset.
///
/// Cloning is cheap; the bytes stay alive as long as any view does, even after the storage has
/// moved on to a newer generation.
#[derive(Clone)]
pub struct AssetBytes {
    buf: Arc<[u8]>,
    start: usize,
    end: usize,
}

impl AssetBytes {
    pub(crate) fn whole(buf: Arc<[u8]>) -> Self {
        let end = buf.len();
        Self { buf, start: 0, end }
    }

    pub(crate) fn slice(buf: Arc<[u8]>, start: usize, end: usize) -> Self {
        debug_assert!(start <= end && end <= buf.len());
        Self { buf, start, end }
    }

    /// Copy the bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_ref().to_vec()
    }
}

impl Deref for AssetBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }
}

impl AsRef<[u8]> for AssetBytes {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl PartialEq for AssetBytes {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl Eq for AssetBytes {}

impl PartialEq<[u8]> for AssetBytes {
    fn eq(&self, other: &[u8]) -> bool {
        **self == *other
    }
}

impl PartialEq<Vec<u8>> for AssetBytes {
    fn eq(&self, other: &Vec<u8>) -> bool {
        **self == other[..]
    }
}

impl From<Vec<u8>> for AssetBytes {
    fn from(v: Vec<u8>) -> Self {
        Self::whole(Arc::from(v))
    }
}

impl fmt::Debug for AssetBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetBytes")
            .field("len", &self.len())
            .finish()
    }
}
