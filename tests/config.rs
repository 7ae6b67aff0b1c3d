use std::fs;
use std::path::PathBuf;

use assert_matches::assert_matches;

use forgery_dataset_builder::config::{Config, ConfigLoader, SourceEntry, SourceEntryObject};
use forgery_dataset_builder::domain::SourceId;
use forgery_dataset_builder::error::DatasetError;

#[test]
fn load_file_and_override_with_flags() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("fdb.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "output_root": "./dataset",
            "cache_dir": "/var/cache/fdb",
            "seed": 1,
            "sources": [
                "columbia",
                {"id": "casia", "path": "/data/CASIA2.0", "sample": 100}
            ]
        }"#,
    )
    .unwrap();

    let file = ConfigLoader::load(path.to_str().unwrap()).unwrap();
    let flags = Config {
        seed: Some(9),
        fail_fast: Some(true),
        sources: vec![SourceEntry::Detailed(SourceEntryObject {
            id: "casia".to_string(),
            path: None,
            sample: Some(10),
        })],
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(file.merge(flags)).unwrap();

    assert_eq!(resolved.output_root.as_str(), "./dataset");
    assert_eq!(resolved.cache_dir, PathBuf::from("/var/cache/fdb"));
    assert_eq!(resolved.seed, Some(9));
    assert!(resolved.fail_fast);
    let ids: Vec<SourceId> = resolved.sources.iter().map(|source| source.id).collect();
    assert_eq!(ids, vec![SourceId::Columbia, SourceId::Casia]);
    assert_eq!(resolved.sources[1].sample, 10);
    assert_eq!(
        resolved.sources[1].local_path,
        Some(PathBuf::from("/data/CASIA2.0"))
    );
}

#[test]
fn missing_file_is_a_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::load(path.to_str().unwrap()).unwrap_err();
    assert_matches!(err, DatasetError::ConfigRead(_));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("fdb.json");
    fs::write(&path, "{ not json").unwrap();
    let err = ConfigLoader::load(path.to_str().unwrap()).unwrap_err();
    assert_matches!(err, DatasetError::ConfigParse(_));
}

#[test]
fn output_root_is_required() {
    let err = ConfigLoader::resolve_config(Config::default()).unwrap_err();
    assert_matches!(err, DatasetError::InvalidConfig(_));
}

#[test]
fn unsupported_schema_is_rejected() {
    let config = Config {
        schema_version: Some(2),
        output_root: Some("out".to_string()),
        ..Config::default()
    };
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, DatasetError::InvalidConfig(_));
}
