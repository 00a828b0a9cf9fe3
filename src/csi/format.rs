use crate::csi::codec::{PixelCodec, ZstdCodec};
use crate::csi::layout::{BlendMode, RenditionLayout, TemplateRenderingMode};
use crate::foundation::bytes::{ByteReader, ByteWriter};
use crate::foundation::core::{Canvas, Rect};
use crate::foundation::error::{CarError, CarResult};
use crate::surface::{BYTES_PER_PIXEL, MAX_SURFACE_DIM};

/// Leading bytes of every CSI blob.
pub const CSI_MAGIC: [u8; 4] = *b"CTSI";
/// Current CSI blob version.
pub const CSI_VERSION: u32 = 1;
/// Longest accepted rendition name, in UTF-8 bytes.
pub const MAX_NAME_BYTES: usize = 128;

const FLAG_FPO: u32 = 1;
const FLAG_EXCLUDED_FROM_CONTRAST: u32 = 2;
const FLAG_VECTOR_BASED: u32 = 4;
const KNOWN_FLAGS: u32 = FLAG_FPO | FLAG_EXCLUDED_FROM_CONTRAST | FLAG_VECTOR_BASED;

const EXT_COLOR: [u8; 4] = *b"COLR";
const EXT_DATA: [u8; 4] = *b"DATA";
const COLOR_EXT_LEN: u32 = 4 * 8;

/// Scalar rendition metadata carried in the CSI header.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CsiMetadata {
    /// Rendition file name.
    pub name: String,
    /// Rendition opacity in `[0, 1]`.
    pub opacity: f64,
    /// Color space identifier.
    pub color_space_id: i16,
    /// EXIF orientation, `1..=8`.
    pub exif_orientation: i32,
    /// Pixel-to-point scale, at least 1.
    pub scale_factor: u32,
    /// Template rendering hint.
    pub template_rendering_mode: TemplateRenderingMode,
    /// Uniform type identifier of the source asset.
    pub uti_type: Option<String>,
    /// Rendition is a for-placement-only placeholder.
    pub is_fpo: bool,
    /// Rendition is skipped by the increased-contrast filter.
    pub excluded_from_contrast_filter: bool,
    /// Rendition was produced from vector artwork.
    pub vector_based: bool,
    /// RGBA components of a color rendition.
    pub color: Option<[f64; 4]>,
}

impl Default for CsiMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            opacity: 1.0,
            color_space_id: 0,
            exif_orientation: 1,
            scale_factor: 1,
            template_rendering_mode: TemplateRenderingMode::Automatic,
            uti_type: None,
            is_fpo: false,
            excluded_from_contrast_filter: false,
            vector_based: false,
            color: None,
        }
    }
}

impl CsiMetadata {
    /// Check every field against its accepted range.
    pub fn validate(&self) -> CarResult<()> {
        validate_name(&self.name)?;
        validate_opacity(self.opacity)?;
        validate_exif_orientation(self.exif_orientation)?;
        validate_scale_factor(self.scale_factor)?;
        if let Some(uti) = &self.uti_type {
            validate_uti(uti)?;
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }

    fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.is_fpo {
            flags |= FLAG_FPO;
        }
        if self.excluded_from_contrast_filter {
            flags |= FLAG_EXCLUDED_FROM_CONTRAST;
        }
        if self.vector_based {
            flags |= FLAG_VECTOR_BASED;
        }
        flags
    }
}

pub(crate) fn validate_name(name: &str) -> CarResult<()> {
    if name.len() > MAX_NAME_BYTES {
        return Err(CarError::invalid_metadata(format!(
            "name is {} bytes, limit is {MAX_NAME_BYTES}",
            name.len()
        )));
    }
    Ok(())
}

pub(crate) fn validate_opacity(opacity: f64) -> CarResult<()> {
    if !opacity.is_finite() || !(0.0..=1.0).contains(&opacity) {
        return Err(CarError::invalid_metadata(format!(
            "opacity must be finite and in [0, 1], got {opacity}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_exif_orientation(orientation: i32) -> CarResult<()> {
    if !(1..=8).contains(&orientation) {
        return Err(CarError::invalid_metadata(format!(
            "exif orientation must be in 1..=8, got {orientation}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_scale_factor(scale: u32) -> CarResult<()> {
    if scale < 1 {
        return Err(CarError::invalid_metadata("scale factor must be at least 1"));
    }
    Ok(())
}

pub(crate) fn validate_uti(uti: &str) -> CarResult<()> {
    if uti.len() > usize::from(u16::MAX) {
        return Err(CarError::invalid_metadata("uti type is too long"));
    }
    Ok(())
}

pub(crate) fn validate_color(color: &[f64; 4]) -> CarResult<()> {
    if color.iter().any(|c| !c.is_finite()) {
        return Err(CarError::invalid_metadata("color components must be finite"));
    }
    Ok(())
}

pub(crate) fn validate_rect(rect: Rect, canvas: Canvas) -> CarResult<()> {
    let finite = [rect.x0, rect.y0, rect.x1, rect.y1]
        .iter()
        .all(|v| v.is_finite());
    if !finite || rect.width() < 0.0 || rect.height() < 0.0 {
        return Err(CarError::invalid_metadata(format!(
            "slice rect must be finite with non-negative size, got {rect:?}"
        )));
    }
    let b = canvas.bounds();
    if rect.x0 < b.x0 || rect.y0 < b.y0 || rect.x1 > b.x1 || rect.y1 > b.y1 {
        return Err(CarError::invalid_metadata(format!(
            "slice rect {rect:?} lies outside the {}x{} canvas",
            canvas.width, canvas.height
        )));
    }
    Ok(())
}

pub(crate) fn check_canvas(canvas: Canvas) -> CarResult<()> {
    if canvas.width > MAX_SURFACE_DIM || canvas.height > MAX_SURFACE_DIM {
        return Err(CarError::invalid_metadata(format!(
            "canvas {}x{} exceeds {MAX_SURFACE_DIM}x{MAX_SURFACE_DIM}",
            canvas.width, canvas.height
        )));
    }
    Ok(())
}

fn layer_raw_len(canvas: Canvas) -> usize {
    canvas.pixel_count().saturating_mul(BYTES_PER_PIXEL)
}

/// One layer as it is stored in the blob.
#[derive(Clone, Debug)]
pub(crate) struct EncodedLayer {
    pub(crate) blend: BlendMode,
    pub(crate) compressed: bool,
    pub(crate) raw_len: u32,
    pub(crate) bytes: Vec<u8>,
}

/// Everything written into a CSI blob.
pub(crate) struct CsiParts<'a> {
    pub(crate) canvas: Canvas,
    pub(crate) layout: RenditionLayout,
    pub(crate) metadata: &'a CsiMetadata,
    pub(crate) layers: &'a [EncodedLayer],
    pub(crate) slices: &'a [Rect],
    pub(crate) raw_data: Option<&'a [u8]>,
}

fn len_u32(len: usize, what: &str) -> CarResult<u32> {
    u32::try_from(len).map_err(|_| CarError::invalid_metadata(format!("{what} exceeds u32")))
}

fn len_u16(len: usize, what: &str) -> CarResult<u16> {
    u16::try_from(len).map_err(|_| CarError::invalid_metadata(format!("{what} exceeds u16")))
}

pub(crate) fn write_csi(parts: &CsiParts<'_>) -> CarResult<Vec<u8>> {
    let meta = parts.metadata;
    let payload: usize = parts.layers.iter().map(|l| l.bytes.len()).sum();
    let mut w = ByteWriter::with_capacity(128 + payload + parts.slices.len() * 32);

    w.put_bytes(&CSI_MAGIC);
    w.put_u32(CSI_VERSION);
    w.put_u32(meta.flags());
    w.put_u32(parts.canvas.width);
    w.put_u32(parts.canvas.height);
    w.put_u32(meta.scale_factor);
    w.put_u16(parts.layout.raw());
    w.put_i16(meta.color_space_id);
    w.put_i32(meta.exif_orientation);
    w.put_f64(meta.opacity);
    w.put_i64(meta.template_rendering_mode.raw());

    w.put_u16(len_u16(meta.name.len(), "name")?);
    w.put_bytes(meta.name.as_bytes());
    let uti = meta.uti_type.as_deref().unwrap_or("");
    w.put_u16(len_u16(uti.len(), "uti type")?);
    w.put_bytes(uti.as_bytes());

    w.put_u32(len_u32(parts.slices.len(), "slice count")?);
    w.put_u32(len_u32(parts.layers.len(), "layer count")?);

    for layer in parts.layers {
        w.put_u8(u8::from(layer.compressed));
        w.put_u32(layer.blend.raw());
        w.put_u32(layer.raw_len);
        w.put_u32(len_u32(layer.bytes.len(), "layer size")?);
        w.put_bytes(&layer.bytes);
    }

    for s in parts.slices {
        w.put_f64(s.x0);
        w.put_f64(s.y0);
        w.put_f64(s.width());
        w.put_f64(s.height());
    }

    let ext_count = u32::from(meta.color.is_some()) + u32::from(parts.raw_data.is_some());
    w.put_u32(ext_count);
    if let Some(color) = &meta.color {
        w.put_bytes(&EXT_COLOR);
        w.put_u32(COLOR_EXT_LEN);
        for c in color {
            w.put_f64(*c);
        }
    }
    if let Some(data) = parts.raw_data {
        w.put_bytes(&EXT_DATA);
        w.put_u32(len_u32(data.len(), "raw data")?);
        w.put_bytes(data);
    }

    Ok(w.into_vec())
}

/// One decoded layer.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedLayer {
    /// Blend mode applied when flattening.
    pub blend: BlendMode,
    /// Premultiplied RGBA8 pixels at canvas size.
    pub pixels: Vec<u8>,
}

/// A CSI blob read back into memory.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedCsi {
    pub(crate) canvas: Canvas,
    pub(crate) layout: RenditionLayout,
    pub(crate) metadata: CsiMetadata,
    pub(crate) layers: Vec<DecodedLayer>,
    pub(crate) slices: Vec<Rect>,
    pub(crate) raw_data: Option<Vec<u8>>,
}

fn need<T>(v: Option<T>, what: &str) -> CarResult<T> {
    v.ok_or_else(|| CarError::invalid_metadata(format!("truncated csi: missing {what}")))
}

fn read_string(r: &mut ByteReader<'_>, what: &str) -> CarResult<String> {
    let len = need(r.u16(), what)?;
    let bytes = need(r.take(usize::from(len)), what)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CarError::invalid_metadata(format!("{what} is not valid utf-8")))
}

impl DecodedCsi {
    /// Parse a CSI blob, decompressing layers with zstd.
    pub fn parse(bytes: &[u8]) -> CarResult<Self> {
        Self::parse_with(bytes, &ZstdCodec::default())
    }

    /// Parse a CSI blob with a specific layer codec.
    pub fn parse_with(bytes: &[u8], codec: &dyn PixelCodec) -> CarResult<Self> {
        let mut r = ByteReader::new(bytes);

        if need(r.array4(), "magic")? != CSI_MAGIC {
            return Err(CarError::invalid_metadata("not a csi blob (bad magic)"));
        }
        let version = need(r.u32(), "version")?;
        if version != CSI_VERSION {
            return Err(CarError::invalid_metadata(format!(
                "unsupported csi version {version}"
            )));
        }
        let flags = need(r.u32(), "flags")?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(CarError::invalid_metadata(format!(
                "unknown csi flags {flags:#x}"
            )));
        }
        let canvas = Canvas::new(need(r.u32(), "width")?, need(r.u32(), "height")?);
        check_canvas(canvas)?;
        let scale_factor = need(r.u32(), "scale factor")?;
        let layout = RenditionLayout::from_raw(need(r.u16(), "layout")?);
        let color_space_id = need(r.i16(), "color space")?;
        let exif_orientation = need(r.i32(), "exif orientation")?;
        let opacity = need(r.f64(), "opacity")?;
        let template_raw = need(r.i64(), "template rendering mode")?;
        let template_rendering_mode = TemplateRenderingMode::from_raw(template_raw)
            .ok_or_else(|| {
                CarError::invalid_metadata(format!(
                    "unknown template rendering mode {template_raw}"
                ))
            })?;
        let name = read_string(&mut r, "name")?;
        let uti = read_string(&mut r, "uti type")?;

        let slice_count = need(r.u32(), "slice count")?;
        let layer_count = need(r.u32(), "layer count")?;

        let expected_raw = layer_raw_len(canvas);
        let mut layers = Vec::new();
        for i in 0..layer_count {
            let compressed = match need(r.u8(), "layer compression flag")? {
                0 => false,
                1 => true,
                other => {
                    return Err(CarError::invalid_metadata(format!(
                        "layer {i}: unknown compression flag {other}"
                    )));
                }
            };
            let blend_raw = need(r.u32(), "layer blend mode")?;
            let blend = BlendMode::from_raw(blend_raw).ok_or_else(|| {
                CarError::invalid_metadata(format!("layer {i}: unknown blend mode {blend_raw}"))
            })?;
            let raw_len = need(r.u32(), "layer raw length")? as usize;
            let stored_len = need(r.u32(), "layer stored length")? as usize;
            if raw_len != expected_raw {
                return Err(CarError::invalid_metadata(format!(
                    "layer {i}: {raw_len} raw bytes, canvas needs {expected_raw}"
                )));
            }
            let stored = need(r.take(stored_len), "layer bytes")?;
            let pixels = if compressed {
                codec
                    .decompress(stored, raw_len)
                    .map_err(|e| CarError::invalid_metadata(format!("layer {i}: {e}")))?
            } else {
                if stored_len != raw_len {
                    return Err(CarError::invalid_metadata(format!(
                        "layer {i}: uncompressed layer stores {stored_len} of {raw_len} bytes"
                    )));
                }
                stored.to_vec()
            };
            layers.push(DecodedLayer { blend, pixels });
        }

        let mut slices = Vec::new();
        for _ in 0..slice_count {
            let x = need(r.f64(), "slice x")?;
            let y = need(r.f64(), "slice y")?;
            let width = need(r.f64(), "slice width")?;
            let height = need(r.f64(), "slice height")?;
            let rect = Rect::new(x, y, x + width, y + height);
            validate_rect(rect, canvas)?;
            slices.push(rect);
        }

        let mut color = None;
        let mut raw_data = None;
        let ext_count = need(r.u32(), "extension count")?;
        for _ in 0..ext_count {
            let tag = need(r.array4(), "extension tag")?;
            let len = need(r.u32(), "extension length")? as usize;
            let body = need(r.take(len), "extension body")?;
            match tag {
                EXT_COLOR => {
                    if len != COLOR_EXT_LEN as usize {
                        return Err(CarError::invalid_metadata(format!(
                            "color extension is {len} bytes, expected {COLOR_EXT_LEN}"
                        )));
                    }
                    let mut br = ByteReader::new(body);
                    let mut c = [0.0f64; 4];
                    for v in &mut c {
                        *v = need(br.f64(), "color component")?;
                    }
                    color = Some(c);
                }
                EXT_DATA => raw_data = Some(body.to_vec()),
                _ => {}
            }
        }

        if !r.is_empty() {
            return Err(CarError::invalid_metadata(format!(
                "{} trailing bytes after csi blob",
                r.remaining()
            )));
        }

        let metadata = CsiMetadata {
            name,
            opacity,
            color_space_id,
            exif_orientation,
            scale_factor,
            template_rendering_mode,
            uti_type: (!uti.is_empty()).then_some(uti),
            is_fpo: flags & FLAG_FPO != 0,
            excluded_from_contrast_filter: flags & FLAG_EXCLUDED_FROM_CONTRAST != 0,
            vector_based: flags & FLAG_VECTOR_BASED != 0,
            color,
        };
        metadata.validate()?;

        Ok(Self {
            canvas,
            layout,
            metadata,
            layers,
            slices,
            raw_data,
        })
    }

    /// Canvas size in pixels.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Layout discriminator.
    pub fn layout(&self) -> RenditionLayout {
        self.layout
    }

    /// Scalar metadata.
    pub fn metadata(&self) -> &CsiMetadata {
        &self.metadata
    }

    /// Layers in insertion order.
    pub fn layers(&self) -> &[DecodedLayer] {
        &self.layers
    }

    /// Slice rectangles in insertion order.
    pub fn slices(&self) -> &[Rect] {
        &self.slices
    }

    /// Opaque payload of data renditions.
    pub fn raw_data(&self) -> Option<&[u8]> {
        self.raw_data.as_deref()
    }

    /// Color components of a color rendition.
    pub fn color(&self) -> Option<[f64; 4]> {
        self.metadata.color
    }
}

#[cfg(test)]
#[path = "../../tests/unit/csi/format.rs"]
mod tests;
