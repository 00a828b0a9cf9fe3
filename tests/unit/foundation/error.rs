use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CarError::malformed_key("x")
            .to_string()
            .contains("malformed key:")
    );
    assert!(
        CarError::allocation("x")
            .to_string()
            .contains("allocation error:")
    );
    assert!(
        CarError::invalid_metadata("x")
            .to_string()
            .contains("invalid metadata:")
    );
    assert!(CarError::codec("x").to_string().contains("codec error:"));
    assert!(
        CarError::corrupt(Path::new("a.car"), "bad footer")
            .to_string()
            .contains("corrupt container 'a.car': bad footer")
    );
}

#[test]
fn catalog_open_keeps_source_chain() {
    let err = CarError::CatalogOpen {
        path: PathBuf::from("x.car"),
        source: Box::new(CarError::NotFound {
            path: PathBuf::from("x.car"),
        }),
    };
    let source = std::error::Error::source(&err).unwrap();
    assert!(source.to_string().contains("container not found"));
    assert!(err.is_io());
}

#[test]
fn io_errors_carry_path() {
    let err = CarError::io(Path::new("/tmp/x.car"), std::io::Error::other("boom"));
    let msg = err.to_string();
    assert!(msg.contains("/tmp/x.car"));
    assert!(msg.contains("boom"));
    assert!(err.is_io());
    assert!(!CarError::BuilderFinalized.is_io());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CarError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
