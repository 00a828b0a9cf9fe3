use std::io::Cursor;

use super::*;

const RED_SQUARE: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="2"><rect width="4" height="2" fill="#ff0000"/></svg>"##;

#[test]
fn decode_image_png_dimensions_and_premul() {
    let src_rgba = vec![100u8, 50u8, 200u8, 128u8];
    let img = image::RgbaImage::from_raw(1, 1, src_rgba).unwrap();

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();

    let prepared = decode_image(&buf).unwrap();
    assert_eq!(prepared.width, 1);
    assert_eq!(prepared.height, 1);
    assert_eq!(
        prepared.rgba8_premul.as_slice(),
        &[
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8
        ]
    );
}

#[test]
fn decode_image_rejects_garbage() {
    assert!(decode_image(b"not an image").is_err());
}

#[test]
fn decode_svg_parse_ok_and_err() {
    parse_svg(RED_SQUARE).unwrap();
    assert!(parse_svg(br#"<svg"#).is_err());
}

#[test]
fn svg_pixel_size_scales_and_caps() {
    let tree = parse_svg(RED_SQUARE).unwrap();
    assert_eq!(svg_pixel_size(&tree, 1.0).unwrap(), (4, 2));
    assert_eq!(svg_pixel_size(&tree, 2.5).unwrap(), (10, 5));
    assert!(svg_pixel_size(&tree, 10_000.0).is_err());
}

#[test]
fn rasterized_svg_is_opaque_red() {
    let tree = parse_svg(RED_SQUARE).unwrap();
    let px = rasterize_svg_to_premul_rgba8(&tree, 4, 2).unwrap();
    assert_eq!(px.len(), 4 * 2 * 4);
    assert_eq!(&px[..4], &[255, 0, 0, 255]);
}
