use super::*;
use crate::csi::{CsiGenerator, RenditionLayout};
use crate::foundation::core::{Canvas, Rgba8Premul};

fn solid(rgba: [u8; 4]) -> BitmapSurface {
    let mut s = BitmapSurface::new(2, 2).unwrap();
    s.context().fill(Rgba8Premul {
        r: rgba[0],
        g: rgba[1],
        b: rgba[2],
        a: rgba[3],
    });
    s
}

fn flatten(layers: &[(&BitmapSurface, BlendMode)], opacity: f64) -> BitmapSurface {
    let mut g = CsiGenerator::new(Canvas::new(2, 2), 0, RenditionLayout::OnePartScale).unwrap();
    for (s, blend) in layers {
        g.add_layer(s, *blend).unwrap();
    }
    g.set_opacity(opacity).unwrap();
    DecodedCsi::parse(&g.finalize(true).unwrap())
        .unwrap()
        .flatten()
        .unwrap()
}

#[test]
fn single_normal_layer_flattens_to_itself() {
    let s = solid([10, 20, 30, 255]);
    assert_eq!(flatten(&[(&s, BlendMode::Normal)], 1.0), s);
}

#[test]
fn rendition_opacity_applies_last() {
    let s = solid([200, 100, 0, 255]);
    let out = flatten(&[(&s, BlendMode::Normal)], 0.5);
    assert_eq!(out.pixel(0, 0).unwrap().to_array(), [100, 50, 0, 128]);
}

#[test]
fn layers_blend_in_insertion_order() {
    let white = solid([255, 255, 255, 255]);
    let red = solid([255, 0, 0, 255]);
    let gray = solid([128, 128, 128, 255]);
    let black = solid([0, 0, 0, 255]);

    let multiply = flatten(&[(&white, BlendMode::Normal), (&red, BlendMode::Multiply)], 1.0);
    assert_eq!(multiply.pixel(1, 1).unwrap().to_array(), [255, 0, 0, 255]);

    let diff = flatten(&[(&gray, BlendMode::Normal), (&gray, BlendMode::Difference)], 1.0);
    assert_eq!(diff.pixel(0, 0).unwrap().to_array(), [0, 0, 0, 255]);

    let screen = flatten(
        &[(&black, BlendMode::Normal), (&solid([100, 100, 100, 255]), BlendMode::Screen)],
        1.0,
    );
    assert_eq!(screen.pixel(0, 0).unwrap().to_array(), [100, 100, 100, 255]);

    let cleared = flatten(&[(&red, BlendMode::Normal), (&white, BlendMode::Clear)], 1.0);
    assert_eq!(cleared.pixel(0, 0).unwrap().to_array(), [0, 0, 0, 0]);

    let half = solid([0, 0, 64, 128]);
    let copied = flatten(&[(&red, BlendMode::Normal), (&half, BlendMode::Copy)], 1.0);
    assert_eq!(copied.pixel(0, 0).unwrap().to_array(), [0, 0, 64, 128]);
}

#[test]
fn plus_lighter_saturates() {
    assert_eq!(
        blend([200, 10, 0, 200], [100, 10, 0, 100], BlendMode::PlusLighter),
        [255, 20, 0, 255]
    );
}

#[test]
fn separable_modes_pass_through_over_transparent() {
    let src = [50, 60, 70, 128];
    for mode in [BlendMode::Multiply, BlendMode::Darken, BlendMode::Overlay] {
        assert_eq!(blend([0, 0, 0, 0], src, mode), src);
        assert_eq!(blend(src, [0, 0, 0, 0], mode), src);
    }
}

#[test]
fn renditions_without_layers_do_not_flatten() {
    let mut g = CsiGenerator::new(Canvas::new(0, 0), 0, RenditionLayout::Color).unwrap();
    g.set_color([1.0, 0.0, 0.0, 1.0]).unwrap();
    let decoded = DecodedCsi::parse(&g.finalize(false).unwrap()).unwrap();
    assert!(decoded.flatten().is_err());
    assert!(decoded.layer_surface(0).is_err());
}
