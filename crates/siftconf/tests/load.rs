//! Loading through the public API with config files on disk.

use siftconf::{ConfigError, SiftConfig};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn explicit_config_file_is_loaded_and_recorded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(
        &path,
        r#"
[paths]
corpus_dir = "/data/chorales"

[similarity]
arch_length_padding = 6
"#,
    )
    .unwrap();

    let (config, sources) = SiftConfig::load_with_sources_from(Some(&path)).unwrap();

    assert_eq!(sources.files.last(), Some(&path));
    assert_eq!(config.similarity.arch_length_padding, 6);
    assert_eq!(config.similarity.arch_min_length, 5);
    if !sources.env_overrides.iter().any(|v| v == "TUNESIFT_CORPUS_DIR") {
        assert_eq!(config.paths.corpus_dir, PathBuf::from("/data/chorales"));
    }
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = SiftConfig::load_from(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::FileRead { .. }));
}

#[test]
fn invalid_chord_reduction_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[analysis]\nchord_reduction = \"median\"\n").unwrap();

    match SiftConfig::load_from(Some(&path)) {
        Err(ConfigError::Invalid { key, .. }) => {
            // TUNESIFT_CHORD_REDUCTION in the environment may have replaced the bad value
            assert_eq!(key, "analysis.chord_reduction");
        }
        Ok(config) => assert_ne!(config.analysis.chord_reduction, "median"),
        Err(other) => panic!("unexpected error: {other}"),
    }
}
