use super::*;
use crate::key::{Appearance, Idiom};

#[test]
fn missing_sections_take_defaults() {
    let config: Config = serde_json::from_str(r#"{ "csi": { "compression_level": 9 } }"#).unwrap();
    assert_eq!(config.csi.compression_level, 9);
    assert!(config.csi.parallel_compression);
    assert_eq!(config.storage, StorageOpts::default());
    assert_eq!(config.key_format(), KeyFormat::UNLIMITED);
    assert_eq!(config.variant, Variant::default());
}

#[test]
fn loads_from_file() {
    let dir = std::env::temp_dir().join(format!(
        "carkit_config_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("carkit.json");
    std::fs::write(
        &path,
        r#"{
            "storage": { "fsync": false },
            "create": { "max_key_attributes": 18, "provenance": { "tool": "carkit" } },
            "variant": { "scale": 3, "appearance": "dark", "idiom": "phone" }
        }"#,
    )
    .unwrap();

    let config = Config::from_path(&path).unwrap();
    assert!(!config.storage.fsync);
    assert!(config.storage.verify_checksums);
    assert_eq!(config.key_format(), KeyFormat::with_max_attributes(18));
    assert_eq!(config.create.provenance.tool, "carkit");
    assert_eq!(config.variant.scale, 3);
    assert_eq!(config.variant.appearance, Appearance::Dark);
    assert_eq!(config.variant.idiom, Idiom::Phone);
    assert_eq!(config.catalog_opts().storage, config.storage);
}

#[test]
fn missing_file_and_bad_json_fail() {
    assert!(matches!(
        Config::from_path("/definitely/not/here/carkit.json"),
        Err(CarError::Io { .. })
    ));
    let path = std::env::temp_dir().join(format!("carkit_bad_config_{}.json", std::process::id()));
    std::fs::write(&path, b"{ not json").unwrap();
    assert!(matches!(Config::from_path(&path), Err(CarError::Other(_))));
}
