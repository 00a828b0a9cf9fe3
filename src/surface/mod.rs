//! Premultiplied RGBA8 bitmap surfaces and their drawing context.
//!
//! A [`BitmapSurface`] owns its pixels (a `vello_cpu` pixmap). Drawing goes through a
//! [`DrawContext`] obtained from [`BitmapSurface::context`], which holds the surface's exclusive
//! borrow for as long as it lives. Coordinates are in pixels with the origin at the top-left.

pub(crate) mod composite;
pub(crate) mod decode;

use std::fmt;

use crate::foundation::core::{Canvas, Rect, Rgba8Premul};
use crate::foundation::error::{CarError, CarResult};
use crate::foundation::math::unpremultiply_rgba8_in_place;

pub use decode::{PreparedImage, decode_image, parse_svg, svg_pixel_size};

/// Largest accepted surface width or height, in pixels.
pub const MAX_SURFACE_DIM: u32 = 16_384;

/// Bytes per premultiplied RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Owned premultiplied RGBA8 pixel buffer.
pub struct BitmapSurface {
    pixmap: vello_cpu::Pixmap,
}

impl BitmapSurface {
    /// Allocate a transparent surface.
    ///
    /// Fails with [`CarError::Allocation`] when a dimension is zero or exceeds
    /// [`MAX_SURFACE_DIM`].
    pub fn new(width: u32, height: u32) -> CarResult<Self> {
        let (w, h) = checked_dims(width, height)?;
        Ok(Self {
            pixmap: vello_cpu::Pixmap::new(w, h),
        })
    }

    /// Build a surface from row-major premultiplied RGBA8 bytes.
    pub fn from_premul_rgba8(width: u32, height: u32, bytes: &[u8]) -> CarResult<Self> {
        let mut out = Self::new(width, height)?;
        let dst = out.pixmap.data_as_u8_slice_mut();
        if dst.len() != bytes.len() {
            return Err(CarError::invalid_metadata(format!(
                "pixel buffer is {} bytes, expected {} for {width}x{height}",
                bytes.len(),
                dst.len()
            )));
        }
        dst.copy_from_slice(bytes);
        Ok(out)
    }

    /// Build a surface holding a decoded image at its natural size.
    pub fn from_prepared(image: &PreparedImage) -> CarResult<Self> {
        Self::from_premul_rgba8(image.width, image.height, &image.rgba8_premul)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        u32::from(self.pixmap.width())
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        u32::from(self.pixmap.height())
    }

    /// Surface dimensions.
    pub fn canvas(&self) -> Canvas {
        Canvas::new(self.width(), self.height())
    }

    /// Premultiplied RGBA8 bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        self.pixmap.data_as_u8_slice_mut()
    }

    /// Pixel at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8Premul> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let i = ((y as usize) * (self.width() as usize) + (x as usize)) * BYTES_PER_PIXEL;
        let px = self.pixels().get(i..i + BYTES_PER_PIXEL)?;
        Some(Rgba8Premul {
            r: px[0],
            g: px[1],
            b: px[2],
            a: px[3],
        })
    }

    /// Copy of the pixels with premultiplication undone.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.pixels().to_vec();
        unpremultiply_rgba8_in_place(&mut out);
        out
    }

    /// Exclusive drawing handle.
    pub fn context(&mut self) -> DrawContext<'_> {
        DrawContext { surface: self }
    }
}

impl Clone for BitmapSurface {
    fn clone(&self) -> Self {
        let mut pixmap = vello_cpu::Pixmap::new(self.pixmap.width(), self.pixmap.height());
        pixmap
            .data_as_u8_slice_mut()
            .copy_from_slice(self.pixmap.data_as_u8_slice());
        Self { pixmap }
    }
}

impl fmt::Debug for BitmapSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitmapSurface")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

impl PartialEq for BitmapSurface {
    fn eq(&self, other: &Self) -> bool {
        self.canvas() == other.canvas() && self.pixels() == other.pixels()
    }
}

impl Eq for BitmapSurface {}

fn checked_dims(width: u32, height: u32) -> CarResult<(u16, u16)> {
    if width == 0 || height == 0 {
        return Err(CarError::allocation(format!(
            "surface dimensions must be non-zero, got {width}x{height}"
        )));
    }
    if width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
        return Err(CarError::allocation(format!(
            "surface {width}x{height} exceeds {MAX_SURFACE_DIM}x{MAX_SURFACE_DIM}"
        )));
    }
    let w = u16::try_from(width).map_err(|_| CarError::allocation("surface width exceeds u16"))?;
    let h =
        u16::try_from(height).map_err(|_| CarError::allocation("surface height exceeds u16"))?;
    Ok((w, h))
}

/// Drawing handle scoped to an exclusive borrow of a [`BitmapSurface`].
pub struct DrawContext<'a> {
    surface: &'a mut BitmapSurface,
}

/// Half-open pixel span `[x0, x1) x [y0, y1)` covered by a rectangle, clamped to the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PixelSpan {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl PixelSpan {
    fn is_empty(self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

impl<'a> DrawContext<'a> {
    /// Dimensions of the underlying surface.
    pub fn canvas(&self) -> Canvas {
        self.surface.canvas()
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        self.surface.pixels_mut().fill(0);
    }

    /// Replace every pixel with `color`.
    pub fn fill(&mut self, color: Rgba8Premul) {
        let rgba = color.to_array();
        for px in self.surface.pixels_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Composite `color` source-over into the pixels covered by `rect`.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba8Premul) {
        let Some(span) = self.span(rect) else { return };
        let src = color.to_array();
        self.for_each_in_span(span, |_, _, px| {
            let out = composite::over([px[0], px[1], px[2], px[3]], src, 1.0);
            px.copy_from_slice(&out);
        });
    }

    /// Reset the pixels covered by `rect` to transparent.
    pub fn clear_rect(&mut self, rect: Rect) {
        let Some(span) = self.span(rect) else { return };
        self.for_each_in_span(span, |_, _, px| px.fill(0));
    }

    /// Draw premultiplied RGBA8 pixels scaled into `dest` (nearest-neighbor, source-over).
    pub fn draw_image(
        &mut self,
        pixels: &[u8],
        src_width: u32,
        src_height: u32,
        dest: Rect,
    ) -> CarResult<()> {
        let expected = (src_width as usize)
            .saturating_mul(src_height as usize)
            .saturating_mul(BYTES_PER_PIXEL);
        if src_width == 0 || src_height == 0 || pixels.len() != expected {
            return Err(CarError::invalid_metadata(format!(
                "image buffer is {} bytes, expected {expected} for {src_width}x{src_height}",
                pixels.len()
            )));
        }
        let dest = dest.abs();
        if !is_finite_rect(dest) || dest.width() <= 0.0 || dest.height() <= 0.0 {
            return Ok(());
        }
        let Some(span) = self.span(dest) else {
            return Ok(());
        };

        let sx = f64::from(src_width) / dest.width();
        let sy = f64::from(src_height) / dest.height();
        let max_u = src_width - 1;
        let max_v = src_height - 1;
        self.for_each_in_span(span, |x, y, px| {
            let u = ((f64::from(x) + 0.5 - dest.x0) * sx).floor();
            let v = ((f64::from(y) + 0.5 - dest.y0) * sy).floor();
            let u = (u.max(0.0) as u32).min(max_u) as usize;
            let v = (v.max(0.0) as u32).min(max_v) as usize;
            let i = (v * src_width as usize + u) * BYTES_PER_PIXEL;
            let src = [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]];
            let out = composite::over([px[0], px[1], px[2], px[3]], src, 1.0);
            px.copy_from_slice(&out);
        });
        Ok(())
    }

    /// Draw another surface scaled into `dest`.
    pub fn draw_surface(&mut self, src: &BitmapSurface, dest: Rect) -> CarResult<()> {
        self.draw_image(src.pixels(), src.width(), src.height(), dest)
    }

    /// Draw a decoded image scaled into `dest`.
    pub fn draw_prepared(&mut self, image: &PreparedImage, dest: Rect) -> CarResult<()> {
        self.draw_image(&image.rgba8_premul, image.width, image.height, dest)
    }

    /// Rasterize `tree` at the pixel size of `dest` and draw it there.
    pub fn draw_svg(&mut self, tree: &usvg::Tree, dest: Rect) -> CarResult<()> {
        let dest = dest.abs();
        if !is_finite_rect(dest) || dest.width() <= 0.0 || dest.height() <= 0.0 {
            return Ok(());
        }
        let w = (dest.width().ceil() as u32).clamp(1, MAX_SURFACE_DIM);
        let h = (dest.height().ceil() as u32).clamp(1, MAX_SURFACE_DIM);
        let raster = decode::rasterize_svg_to_premul_rgba8(tree, w, h)?;
        self.draw_image(&raster, w, h, dest)
    }

    fn span(&self, rect: Rect) -> Option<PixelSpan> {
        let rect = rect.abs();
        if !is_finite_rect(rect) {
            return None;
        }
        let bounds = self.canvas().bounds();
        let r = rect.round().intersect(bounds);
        let span = PixelSpan {
            x0: r.x0.max(0.0) as u32,
            y0: r.y0.max(0.0) as u32,
            x1: r.x1.max(0.0) as u32,
            y1: r.y1.max(0.0) as u32,
        };
        (!span.is_empty()).then_some(span)
    }

    fn for_each_in_span(&mut self, span: PixelSpan, mut f: impl FnMut(u32, u32, &mut [u8])) {
        let stride = self.surface.width() as usize * BYTES_PER_PIXEL;
        let data = self.surface.pixels_mut();
        for y in span.y0..span.y1 {
            let row = &mut data[y as usize * stride..(y as usize + 1) * stride];
            for x in span.x0..span.x1 {
                let i = x as usize * BYTES_PER_PIXEL;
                f(x, y, &mut row[i..i + BYTES_PER_PIXEL]);
            }
        }
    }
}

fn is_finite_rect(r: Rect) -> bool {
    r.x0.is_finite() && r.y0.is_finite() && r.x1.is_finite() && r.y1.is_finite()
}

#[cfg(test)]
#[path = "../../tests/unit/surface/mod.rs"]
mod tests;
