use super::*;

#[test]
fn slice_rules_per_layout_family() {
    let one = RenditionLayout::OnePartScale;
    assert!(one.check_slice_count(0).is_ok());
    assert!(one.check_slice_count(1).is_ok());
    assert!(one.check_slice_count(2).is_err());

    assert!(RenditionLayout::ThreePartHorizontalTile.check_slice_count(3).is_ok());
    assert!(RenditionLayout::SixPart.check_slice_count(6).is_ok());
    assert!(RenditionLayout::NinePartEdgesOnly.check_slice_count(9).is_ok());
    assert!(RenditionLayout::Unknown(4242).check_slice_count(17).is_ok());

    assert!(matches!(
        RenditionLayout::NinePartScale.check_slice_count(4),
        Err(CarError::SliceCountMismatch {
            declared: 9,
            found: 4
        })
    ));
}

#[test]
fn data_layouts_take_no_slices() {
    for layout in [
        RenditionLayout::Color,
        RenditionLayout::RawData,
        RenditionLayout::Vector,
        RenditionLayout::PackedImage,
        RenditionLayout::MultisizeImageSet,
    ] {
        assert!(layout.is_data());
        assert!(layout.check_slice_count(0).is_ok());
        assert!(matches!(
            layout.check_slice_count(1),
            Err(CarError::SliceCountMismatch {
                declared: 0,
                found: 1
            })
        ));
    }
}

#[test]
fn raw_values_roundtrip_including_unknown() {
    assert_eq!(RenditionLayout::from_raw(31), RenditionLayout::NinePartScale);
    assert_eq!(RenditionLayout::from_raw(1009), RenditionLayout::Color);
    assert_eq!(RenditionLayout::from_raw(7), RenditionLayout::Unknown(7));
    assert_eq!(RenditionLayout::Unknown(7).raw(), 7);
    assert_eq!(RenditionLayout::Unknown(7).to_string(), "layout(7)");
    assert_eq!(RenditionLayout::SixPart.to_string(), "SixPart");
}

#[test]
fn blend_modes_use_coregraphics_numbers() {
    assert_eq!(BlendMode::Difference.raw(), 10);
    assert_eq!(BlendMode::PlusLighter.raw(), 27);
    assert_eq!(BlendMode::from_raw(17), Some(BlendMode::Copy));
    assert_eq!(BlendMode::from_raw(6), None);
    assert_eq!(TemplateRenderingMode::from_raw(2), Some(TemplateRenderingMode::Template));
    assert_eq!(TemplateRenderingMode::from_raw(3), None);
}
