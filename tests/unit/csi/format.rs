use super::*;
use crate::csi::CsiGenerator;
use crate::surface::BitmapSurface;

fn color_blob() -> Vec<u8> {
    let mut g = CsiGenerator::new(Canvas::new(0, 0), 0, RenditionLayout::Color).unwrap();
    g.set_name("AccentColor").unwrap();
    g.set_color([0.25, 0.5, 0.75, 1.0]).unwrap();
    g.set_excluded_from_contrast_filter(true).unwrap();
    g.finalize(false).unwrap()
}

#[test]
fn header_starts_with_magic_version_and_flags() {
    let blob = color_blob();
    assert_eq!(&blob[..4], b"CTSI");
    assert_eq!(&blob[4..8], &CSI_VERSION.to_le_bytes());
    assert_eq!(&blob[8..12], &2u32.to_le_bytes());
    // width, height, scale
    assert_eq!(&blob[12..24], &[0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0]);
    assert_eq!(&blob[24..26], &1009u16.to_le_bytes());
}

#[test]
fn parse_restores_metadata_and_extensions() {
    let decoded = DecodedCsi::parse(&color_blob()).unwrap();
    assert_eq!(decoded.layout(), RenditionLayout::Color);
    assert_eq!(decoded.metadata().name, "AccentColor");
    assert!(decoded.metadata().excluded_from_contrast_filter);
    assert!(!decoded.metadata().is_fpo);
    assert_eq!(decoded.color(), Some([0.25, 0.5, 0.75, 1.0]));
    assert!(decoded.layers().is_empty());
    assert_eq!(decoded.raw_data(), None);
}

#[test]
fn parse_restores_layers_slices_and_raw_data() {
    let canvas = Canvas::new(6, 3);
    let mut s = BitmapSurface::new(6, 3).unwrap();
    s.context()
        .fill_rect(Rect::new(0.0, 0.0, 3.0, 3.0), crate::foundation::core::Rgba8Premul {
            r: 9,
            g: 8,
            b: 7,
            a: 255,
        });
    let mut g = CsiGenerator::new(canvas, 3, RenditionLayout::ThreePartHorizontalScale).unwrap();
    g.add_layer(&s, BlendMode::Screen).unwrap();
    for x in [0.0, 2.0, 4.0] {
        g.add_slice_rect(Rect::new(x, 0.0, x + 2.0, 3.0)).unwrap();
    }
    g.set_uti_type("public.png").unwrap();
    g.set_template_rendering_mode(TemplateRenderingMode::Original)
        .unwrap();
    g.set_raw_data(b"payload".to_vec()).unwrap();

    let decoded = DecodedCsi::parse(&g.finalize(true).unwrap()).unwrap();
    assert_eq!(decoded.canvas(), canvas);
    assert_eq!(decoded.layers().len(), 1);
    assert_eq!(decoded.layers()[0].blend, BlendMode::Screen);
    assert_eq!(decoded.layers()[0].pixels, s.pixels());
    assert_eq!(decoded.slices()[1], Rect::new(2.0, 0.0, 4.0, 3.0));
    assert_eq!(decoded.metadata().uti_type.as_deref(), Some("public.png"));
    assert_eq!(
        decoded.metadata().template_rendering_mode,
        TemplateRenderingMode::Original
    );
    assert_eq!(decoded.raw_data(), Some(&b"payload"[..]));
}

#[test]
fn parse_rejects_malformed_blobs() {
    let blob = color_blob();

    let mut bad_magic = blob.clone();
    bad_magic[0] = b'X';
    assert!(matches!(
        DecodedCsi::parse(&bad_magic),
        Err(CarError::InvalidMetadata(_))
    ));

    for cut in [0, 3, 10, blob.len() - 1] {
        assert!(matches!(
            DecodedCsi::parse(&blob[..cut]),
            Err(CarError::InvalidMetadata(_))
        ));
    }

    let mut trailing = blob.clone();
    trailing.push(0);
    assert!(DecodedCsi::parse(&trailing).is_err());

    let mut bad_version = blob;
    bad_version[4] = 9;
    assert!(DecodedCsi::parse(&bad_version).is_err());
}

#[test]
fn parse_skips_unknown_extensions() {
    let mut g = CsiGenerator::new(Canvas::new(0, 0), 0, RenditionLayout::RawData).unwrap();
    let mut blob = g.finalize(false).unwrap();
    let n = blob.len();
    blob[n - 4..].copy_from_slice(&1u32.to_le_bytes());
    blob.extend_from_slice(b"ZZZZ");
    blob.extend_from_slice(&2u32.to_le_bytes());
    blob.extend_from_slice(&[1, 2]);

    let decoded = DecodedCsi::parse(&blob).unwrap();
    assert_eq!(decoded.layout(), RenditionLayout::RawData);
    assert_eq!(decoded.raw_data(), None);
}

#[test]
fn parse_rejects_layer_size_that_disagrees_with_canvas() {
    let s = BitmapSurface::new(2, 2).unwrap();
    let mut g = CsiGenerator::new(Canvas::new(2, 2), 0, RenditionLayout::OnePartScale).unwrap();
    g.add_layer(&s, BlendMode::Normal).unwrap();
    let mut blob = g.finalize(false).unwrap();
    // width lives at offset 12
    blob[12] = 3;
    assert!(matches!(
        DecodedCsi::parse(&blob),
        Err(CarError::InvalidMetadata(_))
    ));
}

#[test]
fn metadata_default_is_valid() {
    CsiMetadata::default().validate().unwrap();
    let json = serde_json::to_string(&CsiMetadata::default()).unwrap();
    let back: CsiMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(back, CsiMetadata::default());
}
