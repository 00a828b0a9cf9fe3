use super::*;

fn icon_token() -> KeyToken {
    KeyToken::new()
        .with(AttributeId::Scale, 2)
        .with(AttributeId::Identifier, 7)
        .with(AttributeId::Element, 85)
        .with(AttributeId::Part, 220)
}

#[test]
fn attributes_are_kept_sorted_and_unique() {
    let mut t = icon_token();
    let ids: Vec<_> = t.attributes().iter().map(|a| a.id).collect();
    assert_eq!(
        ids,
        vec![
            AttributeId::Element,
            AttributeId::Part,
            AttributeId::Scale,
            AttributeId::Identifier
        ]
    );

    assert_eq!(t.set(AttributeId::Scale, 3), Some(2));
    assert_eq!(t.len(), 4);
    assert_eq!(t.scale(), Some(3));
    assert_eq!(t.remove(AttributeId::Scale), Some(3));
    assert_eq!(t.remove(AttributeId::Scale), None);
}

#[test]
fn insertion_order_does_not_affect_equality() {
    let a = KeyToken::new()
        .with(AttributeId::Appearance, 1)
        .with(AttributeId::Idiom, 2);
    let b = KeyToken::new()
        .with(AttributeId::Idiom, 2)
        .with(AttributeId::Appearance, 1);
    assert_eq!(a, b);
}

#[test]
fn from_attributes_rejects_repeated_identifiers() {
    let err = KeyToken::from_attributes([
        KeyAttribute::new(AttributeId::Scale, 1),
        KeyAttribute::new(AttributeId::Scale, 2),
    ])
    .unwrap_err();
    assert!(matches!(err, CarError::MalformedKey(_)));
}

#[test]
fn typed_getters_apply_defaults() {
    let t = KeyToken::new();
    assert_eq!(t.appearance(), Some(Appearance::Any));
    assert_eq!(t.display_gamut(), Some(DisplayGamut::Srgb));
    assert_eq!(t.idiom(), Some(Idiom::Universal));
    assert_eq!(t.state(), Some(ThemeState::Normal));
    assert_eq!(t.scale(), None);

    let catalyst = KeyToken::new()
        .with(AttributeId::Idiom, 2)
        .with(AttributeId::Subtype, crate::key::attribute::MAC_CATALYST_SUBTYPE);
    assert_eq!(catalyst.idiom(), Some(Idiom::MacCatalyst));

    let unknown = KeyToken::new().with(AttributeId::Appearance, 99);
    assert_eq!(unknown.appearance(), None);
}

#[test]
fn rendition_key_attribute_lookup_prefers_earlier_tokens() {
    let key = RenditionKey::new(vec![
        KeyToken::new().with(AttributeId::Identifier, 1),
        KeyToken::new()
            .with(AttributeId::Identifier, 2)
            .with(AttributeId::Scale, 3),
    ]);
    assert_eq!(key.identifier(), Some(1));
    assert_eq!(key.attribute(AttributeId::Scale), Some(3));
    let flat = key.flattened();
    assert_eq!(flat.identifier(), Some(1));
    assert_eq!(flat.scale(), Some(3));
}

#[test]
fn display_lists_attributes() {
    let key = RenditionKey::single(icon_token());
    assert_eq!(
        key.to_string(),
        "[element=85 part=220 scale=2 identifier=7]"
    );
}

#[test]
fn serde_goes_through_canonicalization() {
    let json = r#"[{"id":"scale","value":2},{"id":"element","value":85}]"#;
    let t: KeyToken = serde_json::from_str(json).unwrap();
    assert_eq!(t.attributes()[0].id, AttributeId::Element);

    let dup = r#"[{"id":"scale","value":2},{"id":"scale","value":1}]"#;
    assert!(serde_json::from_str::<KeyToken>(dup).is_err());
}
