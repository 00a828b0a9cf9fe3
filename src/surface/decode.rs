use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{CarError, CarResult};
use crate::foundation::math::premultiply_rgba8_in_place;
use crate::surface::MAX_SURFACE_DIM;

#[derive(Clone, Debug)]
/// Decoded raster image in premultiplied RGBA8 form.
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Decode any format the `image` crate understands into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> CarResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Parse an SVG document.
pub fn parse_svg(bytes: &[u8]) -> CarResult<usvg::Tree> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;
    Ok(tree)
}

/// Natural pixel size of an SVG at `scale`, rounded up.
pub fn svg_pixel_size(tree: &usvg::Tree, scale: f32) -> CarResult<(u32, u32)> {
    fn to_px(v: f32) -> CarResult<u32> {
        if !v.is_finite() || v <= 0.0 {
            return Err(CarError::invalid_metadata("svg has invalid width/height"));
        }
        Ok((v.ceil() as u32).max(1))
    }

    let size = tree.size();
    let w = to_px(size.width() * scale)?;
    let h = to_px(size.height() * scale)?;
    if w > MAX_SURFACE_DIM || h > MAX_SURFACE_DIM {
        return Err(CarError::allocation(format!(
            "svg raster size too large: {w}x{h} (max {MAX_SURFACE_DIM}x{MAX_SURFACE_DIM})"
        )));
    }
    Ok((w, h))
}

pub(crate) fn rasterize_svg_to_premul_rgba8(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> CarResult<Vec<u8>> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| CarError::allocation("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.data().to_vec())
}

#[cfg(test)]
#[path = "../../tests/unit/surface/decode.rs"]
mod tests;
