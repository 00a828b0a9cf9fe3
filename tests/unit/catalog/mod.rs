use super::*;
use crate::foundation::core::{Rect, Rgba8Premul};
use crate::key::{Appearance, KeyFormat};
use crate::storage::Provenance;

fn temp_path(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "carkit_catalog_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join("Assets.car")
}

fn fresh(name: &str) -> (std::path::PathBuf, Catalog) {
    let path = temp_path(name);
    let storage = AssetStorage::create(&path, Provenance::default(), KeyFormat::UNLIMITED).unwrap();
    (path, Catalog::from_storage(storage, CatalogOpts::default()))
}

fn solid(w: u32, h: u32, rgba: [u8; 4]) -> BitmapSurface {
    let mut s = BitmapSurface::new(w, h).unwrap();
    s.context()
        .fill(Rgba8Premul::from_straight_rgba(rgba[0], rgba[1], rgba[2], rgba[3]));
    s
}

#[test]
fn open_missing_read_only_wraps_storage_error() {
    let err = Catalog::open(temp_path("missing")).unwrap_err();
    match err {
        CarError::CatalogOpen { source, .. } => {
            assert!(matches!(*source, CarError::NotFound { .. }))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn named_lookups_group_keys_by_name_in_sorted_order() {
    let (_, cat) = fresh("lookups");
    let red = solid(4, 4, [255, 0, 0, 255]);
    cat.insert_image("Zebra", &red, &Variant::at_scale(1)).unwrap();
    cat.insert_image("Apple", &red, &Variant::at_scale(1)).unwrap();
    cat.insert_image("Apple", &solid(8, 8, [0, 0, 255, 255]), &Variant::at_scale(2))
        .unwrap();

    let mut seen = Vec::new();
    cat.enumerate_named_lookups(|name, keys| seen.push((name.to_string(), keys.len())));
    assert_eq!(
        seen,
        vec![("Apple".to_string(), 2), ("Zebra".to_string(), 1)]
    );

    let lookups: Vec<NamedLookup> = cat.named_lookups().collect();
    assert_eq!(lookups.len(), 2);
    assert_eq!(lookups[0].name, "Apple");
    assert_eq!(cat.all_rendition_names(), vec!["Apple", "Zebra"]);
}

#[test]
fn keys_without_registered_name_are_not_named_lookups() {
    let (_, cat) = fresh("orphan");
    let orphan = RenditionKey::single(
        KeyToken::new()
            .with(AttributeId::Element, 85)
            .with(AttributeId::Identifier, 77),
    );
    cat.storage().set(b"opaque".to_vec(), &orphan).unwrap();
    assert_eq!(cat.named_lookups().count(), 0);
    assert_eq!(cat.theme_store().len(), 1);
}

#[test]
fn image_for_name_selects_variant_and_flattens() {
    let (_, cat) = fresh("image_for_name");
    cat.insert_image("Logo", &solid(2, 2, [255, 0, 0, 255]), &Variant::at_scale(1))
        .unwrap();
    cat.insert_image("Logo", &solid(4, 4, [0, 255, 0, 255]), &Variant::at_scale(2))
        .unwrap();
    cat.save(false).unwrap();

    let img = cat
        .image_for_name("Logo", &Variant::at_scale(2))
        .unwrap()
        .unwrap();
    assert_eq!((img.width(), img.height()), (4, 4));
    assert_eq!(img.pixel(0, 0).unwrap().to_array(), [0, 255, 0, 255]);

    let dark = Variant {
        appearance: Appearance::Dark,
        ..Variant::at_scale(1)
    };
    let fallback = cat.image_for_name("Logo", &dark).unwrap().unwrap();
    assert_eq!(fallback.width(), 2);

    assert!(cat.image_for_name("Nope", &Variant::at_scale(1)).unwrap().is_none());
}

#[test]
fn colors_persist_and_classify() {
    let (path, cat) = fresh("color");
    let key = cat.insert_color("Accent", [0.1, 0.2, 0.3, 1.0], true).unwrap();
    assert!(!cat.storage().has_pending_changes());
    drop(cat);

    let cat = Catalog::open(&path).unwrap();
    let r = cat.rendition(&key).unwrap();
    assert_eq!(r.kind, RenditionKind::Color);
    assert_eq!(r.name.as_deref(), Some("Accent"));
    assert_eq!(r.csi.color(), Some([0.1, 0.2, 0.3, 1.0]));
    assert!(r.csi.metadata().excluded_from_contrast_filter);
    assert!(cat.image_for_name("Accent", &Variant::default()).unwrap().is_none());
}

#[test]
fn renditions_by_kind_sorts_groups_by_description() {
    let (_, cat) = fresh("by_kind");
    cat.insert_color("Tint", [1.0, 0.0, 0.0, 1.0], false).unwrap();
    cat.insert_image("B", &solid(2, 2, [1, 2, 3, 255]), &Variant::default())
        .unwrap();
    cat.insert_image("A", &solid(2, 2, [1, 2, 3, 255]), &Variant::default())
        .unwrap();

    let groups = cat.renditions_by_kind().unwrap();
    let kinds: Vec<_> = groups.iter().map(|(k, _)| *k).collect();
    assert_eq!(kinds, vec![RenditionKind::Color, RenditionKind::Image]);
    let names: Vec<_> = groups[1]
        .1
        .iter()
        .map(|r| r.name.clone().unwrap())
        .collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn edit_replaces_whole_canvas_without_inset_slice() {
    let (path, cat) = fresh("edit_full");
    let key = cat
        .insert_image("Logo", &solid(4, 4, [255, 0, 0, 255]), &Variant::default())
        .unwrap();
    cat.save(false).unwrap();

    cat.edit_image(&key, &solid(2, 2, [0, 0, 255, 255])).unwrap();
    drop(cat);

    let cat = Catalog::open(&path).unwrap();
    let r = cat.rendition(&key).unwrap();
    assert_eq!(r.csi.metadata().name, "Logo");
    let img = r.csi.flatten().unwrap();
    assert_eq!((img.width(), img.height()), (4, 4));
    assert_eq!(img.pixel(3, 3).unwrap().to_array(), [0, 0, 255, 255]);
}

#[test]
fn edit_into_inset_slice_keeps_outer_pixels() {
    let (_, cat) = fresh("edit_slice");
    let key = RenditionKey::single(
        KeyToken::new()
            .with(AttributeId::Element, 85)
            .with(AttributeId::Part, PART_IMAGE)
            .with(AttributeId::Identifier, cat.storage().register_name("Frame").unwrap()),
    );
    let base = solid(16, 16, [255, 0, 0, 255]);
    let mut g = CsiGenerator::new(Canvas::new(16, 16), 1, RenditionLayout::OnePartScale).unwrap();
    g.add_layer(&base, BlendMode::Normal).unwrap();
    g.add_slice_rect(Rect::new(6.0, 6.0, 10.0, 10.0)).unwrap();
    cat.storage().set(g.finalize(false).unwrap(), &key).unwrap();

    cat.edit_image(&key, &solid(1, 1, [0, 255, 0, 255])).unwrap();
    let r = cat.rendition(&key).unwrap();
    assert_eq!(r.csi.slices(), &[Rect::new(6.0, 6.0, 10.0, 10.0)]);
    let img = r.csi.flatten().unwrap();
    // untouched
    assert_eq!(img.pixel(0, 0).unwrap().to_array(), [255, 0, 0, 255]);
    // cleared border
    assert_eq!(img.pixel(4, 4).unwrap().to_array(), [0, 0, 0, 0]);
    // new image
    assert_eq!(img.pixel(7, 7).unwrap().to_array(), [0, 255, 0, 255]);
}

#[test]
fn editing_a_color_is_rejected() {
    let (_, cat) = fresh("edit_color");
    let key = cat.insert_color("Tint", [0.0, 0.0, 0.0, 1.0], false).unwrap();
    assert!(matches!(
        cat.edit_image(&key, &solid(1, 1, [0, 0, 0, 255])),
        Err(CarError::InvalidMetadata(_))
    ));
}

#[test]
fn remove_item_persists() {
    let (path, cat) = fresh("remove");
    let key = cat.insert_color("Gone", [0.0, 0.0, 0.0, 1.0], false).unwrap();
    cat.remove_item(&key).unwrap();
    drop(cat);
    let cat = Catalog::open(&path).unwrap();
    assert!(matches!(cat.rendition(&key), Err(CarError::KeyNotFound(_))));
}

#[test]
fn read_only_catalog_rejects_edits() {
    let (path, cat) = fresh("read_only");
    cat.insert_color("Tint", [0.0, 0.0, 0.0, 1.0], false).unwrap();
    drop(cat);
    let cat = Catalog::open(&path).unwrap();
    assert!(matches!(
        cat.insert_color("More", [0.0, 0.0, 0.0, 1.0], false),
        Err(CarError::ReadOnly { .. })
    ));
}

#[test]
fn token_count_falls_back_to_observed_maximum() {
    let (_, cat) = fresh("token_count");
    assert_eq!(cat.maximum_rendition_key_token_count(), 0);
    cat.insert_image("X", &solid(1, 1, [0, 0, 0, 255]), &Variant::default())
        .unwrap();
    // element, part, identifier, scale, idiom, appearance, gamut
    assert_eq!(cat.maximum_rendition_key_token_count(), 7);
}

#[test]
fn kind_classification_covers_icons_and_svg_data() {
    let icon_key = RenditionKey::single(
        KeyToken::new()
            .with(AttributeId::Element, ELEMENT_ICON)
            .with(AttributeId::Part, crate::key::PART_ICON),
    );
    let icon = solid(2, 2, [9, 9, 9, 255]);
    let mut g = CsiGenerator::new(Canvas::new(2, 2), 0, RenditionLayout::OnePartScale).unwrap();
    g.add_layer(&icon, BlendMode::Normal).unwrap();
    let csi = DecodedCsi::parse(&g.finalize(false).unwrap()).unwrap();
    assert_eq!(RenditionKind::classify(&icon_key, &csi), RenditionKind::Icon);

    let mut g = CsiGenerator::new(Canvas::new(0, 0), 0, RenditionLayout::RawData).unwrap();
    g.set_uti_type("public.svg-image").unwrap();
    g.set_raw_data(b"<svg/>".to_vec()).unwrap();
    let csi = DecodedCsi::parse(&g.finalize(false).unwrap()).unwrap();
    assert_eq!(RenditionKind::classify(&icon_key, &csi), RenditionKind::Svg);
    assert_eq!(RenditionKind::Svg.to_string(), "SVG");
    assert!(!RenditionKind::Svg.is_bitmap());
}
