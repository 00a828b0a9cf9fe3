use super::*;

#[test]
fn canvas_bounds_and_pixel_count() {
    let c = Canvas::new(64, 32);
    assert_eq!(c.pixel_count(), 2048);
    assert_eq!(c.bounds(), Rect::new(0.0, 0.0, 64.0, 32.0));
}

#[test]
fn canvas_from_size_rounds_up() {
    assert_eq!(Canvas::from_size(Size::new(10.2, 3.0)), Canvas::new(11, 3));
    assert_eq!(Canvas::from_size(Size::new(-1.0, 0.0)), Canvas::new(0, 0));
}

#[test]
fn premul_from_straight() {
    let p = Rgba8Premul::from_straight_rgba(255, 128, 0, 128);
    assert_eq!(p.to_array(), [128, 64, 0, 128]);
    assert_eq!(Rgba8Premul::transparent().to_array(), [0, 0, 0, 0]);
}

#[test]
fn premul_to_straight_opaque_roundtrips() {
    let p = Rgba8Premul::from_straight_rgba(12, 34, 56, 255);
    assert_eq!(p.to_straight(), [12, 34, 56, 255]);
}
