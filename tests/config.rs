use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use uniprot_seqid::config::{
    Config, ConfigLoader, DEFAULT_BATCH_SIZE, DEFAULT_MAPPING_URL, TransportConfig,
};
use uniprot_seqid::error::SeqidError;

#[test]
fn load_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("useqid.json");
    fs::write(
        &path,
        r#"{
            "batch_size": 100,
            "metadata_url": "http://localhost:8080/batch/",
            "max_polls": 5,
            "cache_dir": "/tmp/useqid-test"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.schema_version, 1);
    assert_eq!(resolved.batch_size, 100);
    assert_eq!(resolved.transport.mapping_url, DEFAULT_MAPPING_URL);
    assert_eq!(
        resolved.transport.metadata_url,
        "http://localhost:8080/batch/"
    );
    assert_eq!(resolved.transport.max_polls, 5);
    assert_eq!(
        resolved.transport.max_retries,
        TransportConfig::default().max_retries
    );
    assert_eq!(resolved.cache_dir, Utf8PathBuf::from("/tmp/useqid-test"));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, SeqidError::ConfigRead(_));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("useqid.json");
    fs::write(&path, "{ batch_size: ").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, SeqidError::ConfigParse(_));
}

#[test]
fn invalid_values_are_rejected() {
    let zero_batch = Config {
        batch_size: Some(0),
        cache_dir: Some("/tmp/useqid-test".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(zero_batch),
        Err(SeqidError::ConfigValue(_))
    );

    let bad_url = Config {
        mapping_url: Some("ftp://ftp.uniprot.org/".to_string()),
        cache_dir: Some("/tmp/useqid-test".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(bad_url),
        Err(SeqidError::ConfigValue(_))
    );
}

#[test]
fn default_batch_size_fits_service_limit() {
    let resolved = ConfigLoader::resolve_config(Config {
        cache_dir: Some("/tmp/useqid-test".to_string()),
        ..Config::default()
    })
    .unwrap();
    assert_eq!(resolved.batch_size, DEFAULT_BATCH_SIZE);
    assert!(resolved.batch_size <= 500);
}
