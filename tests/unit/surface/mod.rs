use super::*;

fn red() -> Rgba8Premul {
    Rgba8Premul::from_straight_rgba(255, 0, 0, 255)
}

#[test]
fn new_is_zeroed_and_sized() {
    let s = BitmapSurface::new(3, 2).unwrap();
    assert_eq!(s.canvas(), Canvas::new(3, 2));
    assert_eq!(s.pixels().len(), 3 * 2 * 4);
    assert!(s.pixels().iter().all(|&b| b == 0));
}

#[test]
fn new_rejects_zero_and_oversized_dimensions() {
    for (w, h) in [(0, 1), (1, 0), (MAX_SURFACE_DIM + 1, 1), (1, MAX_SURFACE_DIM + 1)] {
        assert!(matches!(
            BitmapSurface::new(w, h),
            Err(CarError::Allocation(_))
        ));
    }
}

#[test]
fn fill_rect_covers_pixel_centers_and_clamps() {
    let mut s = BitmapSurface::new(4, 4).unwrap();
    s.context().fill_rect(Rect::new(1.0, 1.0, 10.0, 3.0), red());
    assert_eq!(s.pixel(0, 0), Some(Rgba8Premul::transparent()));
    assert_eq!(s.pixel(1, 1), Some(red()));
    assert_eq!(s.pixel(3, 2), Some(red()));
    assert_eq!(s.pixel(3, 3), Some(Rgba8Premul::transparent()));
    assert_eq!(s.pixel(4, 0), None);
}

#[test]
fn clear_rect_and_clear() {
    let mut s = BitmapSurface::new(2, 2).unwrap();
    {
        let mut ctx = s.context();
        ctx.fill(red());
        ctx.clear_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
    }
    assert_eq!(s.pixel(0, 0), Some(Rgba8Premul::transparent()));
    assert_eq!(s.pixel(1, 1), Some(red()));

    s.context().clear();
    assert!(s.pixels().iter().all(|&b| b == 0));
}

#[test]
fn draw_image_scales_nearest_neighbor() {
    // 2x1 source: red | blue, drawn into a 4x2 destination.
    let src = [255u8, 0, 0, 255, 0, 0, 255, 255];
    let mut s = BitmapSurface::new(4, 2).unwrap();
    s.context()
        .draw_image(&src, 2, 1, Rect::new(0.0, 0.0, 4.0, 2.0))
        .unwrap();
    assert_eq!(s.pixel(0, 0).unwrap().to_array(), [255, 0, 0, 255]);
    assert_eq!(s.pixel(1, 1).unwrap().to_array(), [255, 0, 0, 255]);
    assert_eq!(s.pixel(2, 0).unwrap().to_array(), [0, 0, 255, 255]);
    assert_eq!(s.pixel(3, 1).unwrap().to_array(), [0, 0, 255, 255]);
}

#[test]
fn draw_image_rejects_short_buffer() {
    let mut s = BitmapSurface::new(2, 2).unwrap();
    let err = s
        .context()
        .draw_image(&[0, 0, 0], 1, 1, Rect::new(0.0, 0.0, 1.0, 1.0))
        .unwrap_err();
    assert!(matches!(err, CarError::InvalidMetadata(_)));
}

#[test]
fn draw_svg_rasterizes_into_rect() {
    let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1"><rect width="1" height="1" fill="#00ff00"/></svg>"##;
    let tree = parse_svg(svg).unwrap();
    let mut s = BitmapSurface::new(4, 4).unwrap();
    s.context()
        .draw_svg(&tree, Rect::new(2.0, 2.0, 4.0, 4.0))
        .unwrap();
    assert_eq!(s.pixel(3, 3).unwrap().to_array(), [0, 255, 0, 255]);
    assert_eq!(s.pixel(0, 0), Some(Rgba8Premul::transparent()));
}

#[test]
fn premul_roundtrip_and_straight_export() {
    let bytes = [64u8, 0, 128, 128];
    let s = BitmapSurface::from_premul_rgba8(1, 1, &bytes).unwrap();
    assert_eq!(s.pixels(), &bytes);
    assert_eq!(s.to_straight_rgba8(), vec![128, 0, 255, 128]);
    assert!(BitmapSurface::from_premul_rgba8(2, 1, &bytes).is_err());
}

#[test]
fn clone_and_eq_compare_pixels() {
    let mut a = BitmapSurface::new(2, 2).unwrap();
    a.context().fill(red());
    let b = a.clone();
    assert_eq!(a, b);
    a.context().clear();
    assert_ne!(a, b);
}
