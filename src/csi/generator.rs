use rayon::prelude::*;

use crate::csi::CsiOpts;
use crate::csi::codec::{PixelCodec, ZstdCodec};
use crate::csi::format::{
    CsiMetadata, CsiParts, EncodedLayer, check_canvas, validate_color, validate_exif_orientation,
    validate_name, validate_opacity, validate_rect, validate_scale_factor, validate_uti, write_csi,
};
use crate::csi::layout::{BlendMode, RenditionLayout, TemplateRenderingMode};
use crate::foundation::core::{Canvas, Rect};
use crate::foundation::error::{CarError, CarResult};
use crate::surface::BitmapSurface;

/// Builds one CSI blob from borrowed surfaces, slice rectangles and metadata.
///
/// The generator borrows its layers for `'a`; the surfaces must outlive it. Once
/// [`finalize`](Self::finalize) succeeds the generator is frozen: mutators fail with
/// [`CarError::BuilderFinalized`] and further `finalize` calls reproduce the same bytes.
pub struct CsiGenerator<'a> {
    canvas: Canvas,
    declared_slices: u32,
    layout: RenditionLayout,
    layers: Vec<(&'a BitmapSurface, BlendMode)>,
    slices: Vec<Rect>,
    metadata: CsiMetadata,
    raw_data: Option<Vec<u8>>,
    opts: CsiOpts,
    finalized: bool,
}

impl<'a> CsiGenerator<'a> {
    /// Start a rendition of `canvas` pixels that will carry `declared_slice_count` slices.
    pub fn new(
        canvas: Canvas,
        declared_slice_count: u32,
        layout: RenditionLayout,
    ) -> CarResult<Self> {
        Self::with_opts(canvas, declared_slice_count, layout, CsiOpts::default())
    }

    /// Like [`new`](Self::new) with explicit compression options.
    pub fn with_opts(
        canvas: Canvas,
        declared_slice_count: u32,
        layout: RenditionLayout,
        opts: CsiOpts,
    ) -> CarResult<Self> {
        layout.check_slice_count(declared_slice_count)?;
        check_canvas(canvas)?;
        Ok(Self {
            canvas,
            declared_slices: declared_slice_count,
            layout,
            layers: Vec::new(),
            slices: Vec::new(),
            metadata: CsiMetadata::default(),
            raw_data: None,
            opts,
            finalized: false,
        })
    }

    fn ensure_open(&self) -> CarResult<()> {
        if self.finalized {
            return Err(CarError::BuilderFinalized);
        }
        Ok(())
    }

    /// Append a layer; it must match the canvas size.
    pub fn add_layer(&mut self, surface: &'a BitmapSurface, blend: BlendMode) -> CarResult<()> {
        self.ensure_open()?;
        if surface.canvas() != self.canvas {
            return Err(CarError::invalid_metadata(format!(
                "layer is {}x{}, canvas is {}x{}",
                surface.width(),
                surface.height(),
                self.canvas.width,
                self.canvas.height
            )));
        }
        self.layers.push((surface, blend));
        Ok(())
    }

    /// Append a slice rectangle; it must be finite and inside the canvas.
    pub fn add_slice_rect(&mut self, rect: Rect) -> CarResult<()> {
        self.ensure_open()?;
        validate_rect(rect, self.canvas)?;
        self.slices.push(rect);
        Ok(())
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> CarResult<()> {
        self.ensure_open()?;
        let name = name.into();
        validate_name(&name)?;
        self.metadata.name = name;
        Ok(())
    }

    pub fn set_opacity(&mut self, opacity: f64) -> CarResult<()> {
        self.ensure_open()?;
        validate_opacity(opacity)?;
        self.metadata.opacity = opacity;
        Ok(())
    }

    pub fn set_color_space_id(&mut self, id: i16) -> CarResult<()> {
        self.ensure_open()?;
        self.metadata.color_space_id = id;
        Ok(())
    }

    pub fn set_exif_orientation(&mut self, orientation: i32) -> CarResult<()> {
        self.ensure_open()?;
        validate_exif_orientation(orientation)?;
        self.metadata.exif_orientation = orientation;
        Ok(())
    }

    pub fn set_scale_factor(&mut self, scale: u32) -> CarResult<()> {
        self.ensure_open()?;
        validate_scale_factor(scale)?;
        self.metadata.scale_factor = scale;
        Ok(())
    }

    pub fn set_template_rendering_mode(&mut self, mode: TemplateRenderingMode) -> CarResult<()> {
        self.ensure_open()?;
        self.metadata.template_rendering_mode = mode;
        Ok(())
    }

    pub fn set_uti_type(&mut self, uti: impl Into<String>) -> CarResult<()> {
        self.ensure_open()?;
        let uti = uti.into();
        validate_uti(&uti)?;
        self.metadata.uti_type = Some(uti);
        Ok(())
    }

    pub fn set_rendition_fpo(&mut self, fpo: bool) -> CarResult<()> {
        self.ensure_open()?;
        self.metadata.is_fpo = fpo;
        Ok(())
    }

    pub fn set_excluded_from_contrast_filter(&mut self, excluded: bool) -> CarResult<()> {
        self.ensure_open()?;
        self.metadata.excluded_from_contrast_filter = excluded;
        Ok(())
    }

    pub fn set_vector_based(&mut self, vector: bool) -> CarResult<()> {
        self.ensure_open()?;
        self.metadata.vector_based = vector;
        Ok(())
    }

    /// Set the RGBA components of a color rendition.
    pub fn set_color(&mut self, rgba: [f64; 4]) -> CarResult<()> {
        self.ensure_open()?;
        validate_color(&rgba)?;
        self.metadata.color = Some(rgba);
        Ok(())
    }

    /// Attach the opaque payload of a data rendition.
    pub fn set_raw_data(&mut self, data: Vec<u8>) -> CarResult<()> {
        self.ensure_open()?;
        if u32::try_from(data.len()).is_err() {
            return Err(CarError::invalid_metadata("raw data exceeds u32"));
        }
        self.raw_data = Some(data);
        Ok(())
    }

    /// Replace all scalar metadata at once, e.g. copied from an existing rendition.
    pub fn set_metadata(&mut self, metadata: CsiMetadata) -> CarResult<()> {
        self.ensure_open()?;
        metadata.validate()?;
        self.metadata = metadata;
        Ok(())
    }

    pub fn metadata(&self) -> &CsiMetadata {
        &self.metadata
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn layout(&self) -> RenditionLayout {
        self.layout
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Serialize the rendition, optionally compressing layer pixels.
    ///
    /// Fails with [`CarError::SliceCountMismatch`] when the number of added slices differs from
    /// the declared count. The output depends only on the generator's inputs.
    #[tracing::instrument(
        level = "debug",
        skip(self),
        fields(layers = self.layers.len(), slices = self.slices.len())
    )]
    pub fn finalize(&mut self, compress: bool) -> CarResult<Vec<u8>> {
        let found = u32::try_from(self.slices.len()).unwrap_or(u32::MAX);
        if found != self.declared_slices {
            return Err(CarError::SliceCountMismatch {
                declared: self.declared_slices,
                found,
            });
        }
        self.layout.check_slice_count(found)?;

        let layers = self.encode_layers(compress)?;
        let bytes = write_csi(&CsiParts {
            canvas: self.canvas,
            layout: self.layout,
            metadata: &self.metadata,
            layers: &layers,
            slices: &self.slices,
            raw_data: self.raw_data.as_deref(),
        })?;

        self.finalized = true;
        tracing::debug!(bytes = bytes.len(), "csi finalized");
        Ok(bytes)
    }

    fn encode_layers(&self, compress: bool) -> CarResult<Vec<EncodedLayer>> {
        let codec = ZstdCodec {
            level: self.opts.compression_level,
        };
        let encode = |&(surface, blend): &(&BitmapSurface, BlendMode)| -> CarResult<EncodedLayer> {
            encode_layer(&codec, surface.pixels(), blend, compress)
        };

        if self.opts.parallel_compression && compress && self.layers.len() > 1 {
            self.layers.par_iter().map(encode).collect()
        } else {
            self.layers.iter().map(encode).collect()
        }
    }
}

fn encode_layer(
    codec: &dyn PixelCodec,
    raw: &[u8],
    blend: BlendMode,
    compress: bool,
) -> CarResult<EncodedLayer> {
    let raw_len = u32::try_from(raw.len())
        .map_err(|_| CarError::invalid_metadata("layer exceeds u32 bytes"))?;
    if compress {
        let packed = codec.compress(raw)?;
        if packed.len() < raw.len() {
            return Ok(EncodedLayer {
                blend,
                compressed: true,
                raw_len,
                bytes: packed,
            });
        }
    }
    Ok(EncodedLayer {
        blend,
        compressed: false,
        raw_len,
        bytes: raw.to_vec(),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/csi/generator.rs"]
mod tests;
