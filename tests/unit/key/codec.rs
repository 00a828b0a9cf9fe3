use super::*;

fn sample() -> KeyToken {
    KeyToken::new()
        .with(AttributeId::Identifier, 0x1234)
        .with(AttributeId::Scale, 2)
        .with(AttributeId::Element, 85)
}

#[test]
fn token_encoding_is_fixed_width_and_sorted() {
    let bytes = sample().to_bytes();
    assert_eq!(bytes.len(), TOKEN_HEADER_BYTES + 3 * ATTRIBUTE_BYTES);
    assert_eq!(
        bytes,
        vec![
            3, 0, // count
            1, 0, 85, 0, // element
            12, 0, 2, 0, // scale
            17, 0, 0x34, 0x12, // identifier
        ]
    );
}

#[test]
fn decode_then_encode_is_canonical() {
    let encoded = sample().to_bytes();
    let decoded = KeyToken::from_bytes(&encoded).unwrap();
    assert_eq!(decoded.to_bytes(), encoded);
    assert_eq!(decoded, sample());
}

#[test]
fn decode_canonicalizes_unsorted_input() {
    let unsorted = [2u8, 0, 12, 0, 2, 0, 1, 0, 85, 0];
    let t = KeyToken::from_bytes(&unsorted).unwrap();
    assert_eq!(t.to_bytes(), vec![2, 0, 1, 0, 85, 0, 12, 0, 2, 0]);
}

#[test]
fn decode_rejects_count_length_mismatch() {
    let mut bytes = sample().to_bytes();
    bytes.pop();
    assert!(matches!(
        KeyToken::from_bytes(&bytes),
        Err(CarError::MalformedKey(_))
    ));

    let mut long = sample().to_bytes();
    long.extend_from_slice(&[0, 0, 0, 0]);
    assert!(matches!(
        KeyToken::from_bytes(&long),
        Err(CarError::MalformedKey(_))
    ));

    assert!(KeyToken::from_bytes(&[]).is_err());
}

#[test]
fn decode_rejects_unknown_identifiers() {
    let bytes = [1u8, 0, 200, 0, 1, 0];
    let err = KeyToken::from_bytes(&bytes).unwrap_err();
    assert!(err.to_string().contains("unknown attribute identifier 200"));
}

#[test]
fn decode_rejects_repeated_identifiers() {
    let bytes = [2u8, 0, 12, 0, 1, 0, 12, 0, 2, 0];
    assert!(matches!(
        KeyToken::from_bytes(&bytes),
        Err(CarError::MalformedKey(_))
    ));
}

#[test]
fn empty_token_encodes_to_header_only() {
    let t = KeyToken::new();
    assert_eq!(t.to_bytes(), vec![0, 0]);
    assert_eq!(KeyToken::from_bytes(&[0, 0]).unwrap(), t);
}

#[test]
fn rendition_key_roundtrip_with_multiple_tokens() {
    let key = RenditionKey::new(vec![
        sample(),
        KeyToken::new().with(AttributeId::Appearance, 1),
    ]);
    let bytes = key.to_bytes();
    assert_eq!(&bytes[..2], &[2, 0]);
    let back = RenditionKey::from_bytes(&bytes).unwrap();
    assert_eq!(back, key);
    assert_eq!(back.to_bytes(), bytes);
}

#[test]
fn rendition_key_rejects_trailing_and_missing_tokens() {
    let mut bytes = RenditionKey::single(sample()).to_bytes();
    bytes.push(0);
    assert!(RenditionKey::from_bytes(&bytes).is_err());

    let two_declared_one_present = {
        let mut b = vec![2u8, 0];
        b.extend_from_slice(&sample().to_bytes());
        b
    };
    assert!(RenditionKey::from_bytes(&two_declared_one_present).is_err());
}

#[test]
fn format_limit_applies_at_encode_time() {
    let fmt = KeyFormat::with_max_attributes(2);
    let err = fmt.encode_token(&sample()).unwrap_err();
    assert!(err.to_string().contains("at most 2"));
    assert!(fmt.encode_key(&RenditionKey::single(sample())).is_err());

    let small = KeyToken::new().with(AttributeId::Scale, 1);
    assert_eq!(fmt.encode_token(&small).unwrap(), small.to_bytes());
    assert!(KeyFormat::UNLIMITED.encode_token(&sample()).is_ok());
}
