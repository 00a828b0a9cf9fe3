//! On-disk container layout.
//!
//! ```text
//! segment  := header body footer
//! header   := "CKSG" | schema u32 | generation u64 | body_len u64
//! body     := blob* manifest
//! footer   := manifest_offset u64 | checksum u64 | "CKFT" | reserved u32
//! ```
//!
//! The checksum covers header and body. Segments are appended; the last one that scans cleanly is
//! the live generation and its manifest addresses blobs anywhere before it by absolute offset.

use std::collections::BTreeMap;

use crate::foundation::bytes::{ByteReader, ByteWriter};
use crate::foundation::hash::checksum;
use crate::key::RenditionKey;

pub(crate) const SEGMENT_MAGIC: [u8; 4] = *b"CKSG";
pub(crate) const FOOTER_MAGIC: [u8; 4] = *b"CKFT";
/// Container schema written by this crate.
pub const SCHEMA_VERSION: u32 = 1;
pub(crate) const HEADER_BYTES: usize = 24;
pub(crate) const FOOTER_BYTES: usize = 24;

/// Who produced a container and how it was thinned.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Provenance {
    /// Thinning arguments the catalog was compiled with.
    pub thinning: String,
    /// Authoring tool identification.
    pub tool: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ManifestEntry {
    pub(crate) key: RenditionKey,
    pub(crate) key_bytes: Vec<u8>,
    pub(crate) offset: u64,
    pub(crate) len: u64,
    pub(crate) checksum: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Manifest {
    pub(crate) max_key_attributes: Option<u16>,
    pub(crate) provenance: Provenance,
    pub(crate) facets: BTreeMap<String, u16>,
    pub(crate) entries: Vec<ManifestEntry>,
}

fn put_str32(w: &mut ByteWriter, s: &str) {
    w.put_u32(s.len() as u32);
    w.put_bytes(s.as_bytes());
}

pub(crate) fn encode_manifest(m: &Manifest, w: &mut ByteWriter) {
    w.put_u32(m.entries.len() as u32);
    w.put_u32(m.max_key_attributes.map_or(0, u32::from));
    put_str32(w, &m.provenance.thinning);
    put_str32(w, &m.provenance.tool);

    w.put_u32(m.facets.len() as u32);
    for (name, id) in &m.facets {
        w.put_u16(name.len() as u16);
        w.put_bytes(name.as_bytes());
        w.put_u16(*id);
    }

    for e in &m.entries {
        w.put_u32(e.key_bytes.len() as u32);
        w.put_bytes(&e.key_bytes);
        w.put_u64(e.offset);
        w.put_u64(e.len);
        w.put_u64(e.checksum);
    }
}

fn need<T>(v: Option<T>, what: &str) -> Result<T, String> {
    v.ok_or_else(|| format!("manifest truncated at {what}"))
}

fn read_str(r: &mut ByteReader<'_>, len: usize, what: &str) -> Result<String, String> {
    let bytes = need(r.take(len), what)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| format!("{what} is not valid utf-8"))
}

/// Parse a manifest; `blob_limit` is the absolute offset where this segment's manifest starts.
pub(crate) fn decode_manifest(bytes: &[u8], blob_limit: u64) -> Result<Manifest, String> {
    let mut r = ByteReader::new(bytes);
    let entry_count = need(r.u32(), "entry count")?;
    let max_attrs = need(r.u32(), "max key attributes")?;
    let max_key_attributes = match max_attrs {
        0 => None,
        n => Some(u16::try_from(n).map_err(|_| format!("max key attributes {n} exceeds u16"))?),
    };
    let thinning_len = need(r.u32(), "thinning length")? as usize;
    let thinning = read_str(&mut r, thinning_len, "thinning")?;
    let tool_len = need(r.u32(), "tool length")? as usize;
    let tool = read_str(&mut r, tool_len, "tool")?;

    let facet_count = need(r.u32(), "facet count")?;
    let mut facets = BTreeMap::new();
    for _ in 0..facet_count {
        let len = usize::from(need(r.u16(), "facet name length")?);
        let name = read_str(&mut r, len, "facet name")?;
        let id = need(r.u16(), "facet identifier")?;
        if facets.insert(name.clone(), id).is_some() {
            return Err(format!("facet '{name}' listed twice"));
        }
    }

    let mut entries = Vec::new();
    let mut prev: Option<Vec<u8>> = None;
    for i in 0..entry_count {
        let key_len = need(r.u32(), "key length")? as usize;
        let key_bytes = need(r.take(key_len), "key bytes")?.to_vec();
        let offset = need(r.u64(), "blob offset")?;
        let len = need(r.u64(), "blob length")?;
        let blob_checksum = need(r.u64(), "blob checksum")?;

        let key = RenditionKey::from_bytes(&key_bytes).map_err(|e| format!("entry {i}: {e}"))?;
        if key.to_bytes() != key_bytes {
            return Err(format!("entry {i}: key is not canonically encoded"));
        }
        if prev.as_ref().is_some_and(|p| *p >= key_bytes) {
            return Err(format!("entry {i}: keys out of order or repeated"));
        }
        let end = offset
            .checked_add(len)
            .ok_or_else(|| format!("entry {i}: blob range overflows"))?;
        if end > blob_limit {
            return Err(format!(
                "entry {i}: blob {offset}..{end} runs past {blob_limit}"
            ));
        }
        prev = Some(key_bytes.clone());
        entries.push(ManifestEntry {
            key,
            key_bytes,
            offset,
            len,
            checksum: blob_checksum,
        });
    }

    if !r.is_empty() {
        return Err(format!("{} trailing bytes after manifest", r.remaining()));
    }

    Ok(Manifest {
        max_key_attributes,
        provenance: Provenance { thinning, tool },
        facets,
        entries,
    })
}

/// Accumulates one segment starting at absolute file offset `base`.
pub(crate) struct SegmentBuilder {
    base: u64,
    generation: u64,
    body: ByteWriter,
}

impl SegmentBuilder {
    pub(crate) fn new(base: u64, generation: u64) -> Self {
        Self {
            base,
            generation,
            body: ByteWriter::new(),
        }
    }

    /// Append a blob and return its absolute offset.
    pub(crate) fn push_blob(&mut self, blob: &[u8]) -> u64 {
        let offset = self.base + (HEADER_BYTES + self.body.len()) as u64;
        self.body.put_bytes(blob);
        offset
    }

    pub(crate) fn finish(mut self, manifest: &Manifest) -> Vec<u8> {
        let manifest_offset = self.body.len() as u64;
        encode_manifest(manifest, &mut self.body);
        let body = self.body.into_vec();

        let mut w = ByteWriter::with_capacity(HEADER_BYTES + body.len() + FOOTER_BYTES);
        w.put_bytes(&SEGMENT_MAGIC);
        w.put_u32(SCHEMA_VERSION);
        w.put_u64(self.generation);
        w.put_u64(body.len() as u64);
        w.put_bytes(&body);
        let sum = checksum(w.as_slice());
        w.put_u64(manifest_offset);
        w.put_u64(sum);
        w.put_bytes(&FOOTER_MAGIC);
        w.put_u32(0);
        w.into_vec()
    }
}

/// A segment that scanned cleanly.
#[derive(Clone, Debug)]
pub(crate) struct Segment {
    pub(crate) start: u64,
    pub(crate) end: u64,
    pub(crate) generation: u64,
    pub(crate) manifest_len: u64,
    pub(crate) manifest: Manifest,
}

impl Segment {
    /// Bytes of header, manifest and footer.
    pub(crate) fn overhead(&self) -> u64 {
        (HEADER_BYTES + FOOTER_BYTES) as u64 + self.manifest_len
    }
}

#[derive(Debug)]
pub(crate) struct Scan {
    pub(crate) live: Option<Segment>,
    pub(crate) segments: usize,
    /// Length of the valid prefix.
    pub(crate) committed_len: u64,
    /// Offset and reason when bytes after the valid prefix were ignored.
    pub(crate) torn_tail: Option<(u64, String)>,
}

/// Failure that is not a torn tail: the checksum matched but the content is unusable.
#[derive(Debug)]
pub(crate) struct ScanError(pub(crate) String);

enum Frame {
    Complete(Segment),
    Torn(String),
}

fn read_frame(data: &[u8], start: usize, min_generation: u64) -> Result<Frame, ScanError> {
    let rest = &data[start..];
    if rest.len() < HEADER_BYTES {
        return Ok(Frame::Torn(format!("{} bytes, shorter than a header", rest.len())));
    }
    let mut r = ByteReader::new(&rest[..HEADER_BYTES]);
    let (Some(magic), Some(schema), Some(generation), Some(body_len)) =
        (r.array4(), r.u32(), r.u64(), r.u64())
    else {
        return Ok(Frame::Torn("unreadable header".to_string()));
    };
    if magic != SEGMENT_MAGIC {
        return Ok(Frame::Torn("bad segment magic".to_string()));
    }
    if schema != SCHEMA_VERSION {
        return Ok(Frame::Torn(format!("unsupported schema {schema}")));
    }
    let Some(total) = usize::try_from(body_len)
        .ok()
        .and_then(|b| b.checked_add(HEADER_BYTES + FOOTER_BYTES))
    else {
        return Ok(Frame::Torn("body length overflows".to_string()));
    };
    if rest.len() < total {
        return Ok(Frame::Torn(format!(
            "segment needs {total} bytes, {} present",
            rest.len()
        )));
    }

    let covered = &rest[..total - FOOTER_BYTES];
    let mut f = ByteReader::new(&rest[total - FOOTER_BYTES..total]);
    let (Some(manifest_offset), Some(sum), Some(footer_magic)) = (f.u64(), f.u64(), f.array4())
    else {
        return Ok(Frame::Torn("unreadable footer".to_string()));
    };
    if footer_magic != FOOTER_MAGIC {
        return Ok(Frame::Torn("bad footer magic".to_string()));
    }
    if checksum(covered) != sum {
        return Ok(Frame::Torn("checksum mismatch".to_string()));
    }
    if generation < min_generation {
        return Ok(Frame::Torn(format!(
            "generation {generation} does not follow {}",
            min_generation.saturating_sub(1)
        )));
    }

    if manifest_offset > body_len {
        return Err(ScanError(format!(
            "manifest offset {manifest_offset} past body of {body_len} bytes"
        )));
    }
    let body = &covered[HEADER_BYTES..];
    let manifest_start = manifest_offset as usize;
    let blob_limit = (start + HEADER_BYTES + manifest_start) as u64;
    let manifest = decode_manifest(&body[manifest_start..], blob_limit)
        .map_err(|e| ScanError(format!("generation {generation}: {e}")))?;

    Ok(Frame::Complete(Segment {
        start: start as u64,
        end: (start + total) as u64,
        generation,
        manifest_len: body_len - manifest_offset,
        manifest,
    }))
}

/// Walk the segments of `data` from the front and keep the last one that is complete.
pub(crate) fn scan(data: &[u8]) -> Result<Scan, ScanError> {
    let mut pos = 0usize;
    let mut live: Option<Segment> = None;
    let mut segments = 0usize;
    let mut torn_tail = None;

    while pos < data.len() {
        let min_generation = live.as_ref().map_or(0, |s| s.generation + 1);
        match read_frame(data, pos, min_generation)? {
            Frame::Complete(seg) => {
                tracing::debug!(
                    generation = seg.generation,
                    start = seg.start,
                    end = seg.end,
                    entries = seg.manifest.entries.len(),
                    "segment"
                );
                pos = seg.end as usize;
                segments += 1;
                live = Some(seg);
            }
            Frame::Torn(reason) => {
                torn_tail = Some((pos as u64, reason));
                break;
            }
        }
    }

    Ok(Scan {
        live,
        segments,
        committed_len: pos as u64,
        torn_tail,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/storage/format.rs"]
mod tests;
