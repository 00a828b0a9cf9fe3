use crate::csi::format::DecodedCsi;
use crate::csi::layout::BlendMode;
use crate::foundation::error::{CarError, CarResult};
use crate::surface::BitmapSurface;
use crate::surface::composite::{PremulRgba8, apply_opacity_in_place, over};

impl DecodedCsi {
    /// Composite all layers in insertion order, then apply the rendition opacity.
    ///
    /// Fails for renditions without pixels (zero-sized canvas or no layers).
    pub fn flatten(&self) -> CarResult<BitmapSurface> {
        let mut out = self.composite_layers()?;
        apply_opacity_in_place(out.pixels_mut(), self.metadata.opacity as f32);
        Ok(out)
    }

    pub(crate) fn composite_layers(&self) -> CarResult<BitmapSurface> {
        if self.layers.is_empty() {
            return Err(CarError::invalid_metadata("rendition has no pixel layers"));
        }
        let mut out = BitmapSurface::new(self.canvas.width, self.canvas.height)?;
        let dst = out.pixels_mut();
        for layer in &self.layers {
            blend_in_place(dst, &layer.pixels, layer.blend);
        }
        Ok(out)
    }

    /// One layer as its own surface, without blending.
    pub fn layer_surface(&self, index: usize) -> CarResult<BitmapSurface> {
        let layer = self.layers.get(index).ok_or_else(|| {
            CarError::invalid_metadata(format!(
                "layer {index} out of range ({} layers)",
                self.layers.len()
            ))
        })?;
        BitmapSurface::from_premul_rgba8(self.canvas.width, self.canvas.height, &layer.pixels)
    }
}

pub(crate) fn blend_in_place(dst: &mut [u8], src: &[u8], mode: BlendMode) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = blend([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], mode);
        d.copy_from_slice(&out);
    }
}

pub(crate) fn blend(dst: PremulRgba8, src: PremulRgba8, mode: BlendMode) -> PremulRgba8 {
    match mode {
        BlendMode::Normal => over(dst, src, 1.0),
        BlendMode::Clear => [0, 0, 0, 0],
        BlendMode::Copy => src,
        BlendMode::PlusLighter => [
            dst[0].saturating_add(src[0]),
            dst[1].saturating_add(src[1]),
            dst[2].saturating_add(src[2]),
            dst[3].saturating_add(src[3]),
        ],
        separable => blend_separable(dst, src, separable),
    }
}

fn unit(v: u8) -> f32 {
    f32::from(v) / 255.0
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn mix(mode: BlendMode, cb: f32, cs: f32) -> f32 {
    match mode {
        BlendMode::Multiply => cb * cs,
        BlendMode::Screen => cb + cs - cb * cs,
        BlendMode::Overlay => {
            if cb <= 0.5 {
                2.0 * cb * cs
            } else {
                let t = 2.0 * cb - 1.0;
                t + cs - t * cs
            }
        }
        BlendMode::Darken => cb.min(cs),
        BlendMode::Lighten => cb.max(cs),
        BlendMode::Difference => (cb - cs).abs(),
        _ => cs,
    }
}

// Separable blend on premultiplied input:
// co = cs*(1-ab) + cb*(1-as) + as*ab*B(cb/ab, cs/as), ao = as + ab - as*ab.
fn blend_separable(dst: PremulRgba8, src: PremulRgba8, mode: BlendMode) -> PremulRgba8 {
    let sa = unit(src[3]);
    let da = unit(dst[3]);
    if sa <= 0.0 {
        return dst;
    }
    if da <= 0.0 {
        return src;
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let sc = unit(src[i]);
        let dc = unit(dst[i]);
        let b = mix(mode, (dc / da).min(1.0), (sc / sa).min(1.0));
        out[i] = to_u8(sc * (1.0 - da) + dc * (1.0 - sa) + sa * da * b);
    }
    out[3] = to_u8(sa + da - sa * da);
    out
}

#[cfg(test)]
#[path = "../../tests/unit/csi/flatten.rs"]
mod tests;
