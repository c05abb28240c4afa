//! Config file discovery, loading, and environment variable overlay.

use crate::sections::CHORD_REDUCTIONS;
use crate::{ConfigError, SiftConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/tunesift/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("tunesift/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // An explicit path must exist; loading it reports the error if not.
    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("tunesift.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Overlay a TOML file onto `config`.
pub fn load_file_into(config: &mut SiftConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay keys present in `contents`; absent keys keep their current value.
pub fn apply_toml(config: &mut SiftConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("cache_db").and_then(|v| v.as_str()) {
            config.paths.cache_db = expand_path(v);
        }
        if let Some(v) = paths.get("corpus_dir").and_then(|v| v.as_str()) {
            config.paths.corpus_dir = expand_path(v);
        }
    }

    if let Some(analysis) = table.get("analysis").and_then(|v| v.as_table()) {
        if let Some(v) = analysis.get("chord_reduction").and_then(|v| v.as_str()) {
            config.analysis.chord_reduction = v.to_string();
        }
        if let Some(v) = analysis.get("snippet_length").and_then(|v| v.as_integer()) {
            config.analysis.snippet_length = positive("analysis.snippet_length", v)?;
        }
    }

    if let Some(similarity) = table.get("similarity").and_then(|v| v.as_table()) {
        if let Some(v) = similarity.get("arch_min_length").and_then(|v| v.as_integer()) {
            config.similarity.arch_min_length = non_negative("similarity.arch_min_length", v)?;
        }
        if let Some(v) = similarity.get("arch_length_padding").and_then(|v| v.as_integer()) {
            config.similarity.arch_length_padding =
                non_negative("similarity.arch_length_padding", v)?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
    }

    Ok(())
}

fn non_negative(key: &str, value: i64) -> Result<usize, ConfigError> {
    usize::try_from(value).map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        message: format!("must be non-negative, got {value}"),
    })
}

fn positive(key: &str, value: i64) -> Result<usize, ConfigError> {
    match non_negative(key, value)? {
        0 => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: "must be at least 1".to_string(),
        }),
        n => Ok(n),
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(
    config: &mut SiftConfig,
    sources: &mut ConfigSources,
) -> Result<(), ConfigError> {
    apply_overrides_from(config, sources, |key| env::var(key).ok())
}

/// Apply overrides from any variable lookup.
pub fn apply_overrides_from(
    config: &mut SiftConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(v) = lookup("TUNESIFT_CACHE_DB") {
        config.paths.cache_db = expand_path(&v);
        sources.env_overrides.push("TUNESIFT_CACHE_DB".to_string());
    }
    if let Some(v) = lookup("TUNESIFT_CORPUS_DIR") {
        config.paths.corpus_dir = expand_path(&v);
        sources.env_overrides.push("TUNESIFT_CORPUS_DIR".to_string());
    }
    if let Some(v) = lookup("TUNESIFT_CHORD_REDUCTION") {
        config.analysis.chord_reduction = v;
        sources.env_overrides.push("TUNESIFT_CHORD_REDUCTION".to_string());
    }
    if let Some(v) = lookup("TUNESIFT_SNIPPET_LENGTH") {
        let n: i64 = v.trim().parse().map_err(|_| ConfigError::Invalid {
            key: "TUNESIFT_SNIPPET_LENGTH".to_string(),
            message: format!("not an integer: '{v}'"),
        })?;
        config.analysis.snippet_length = positive("TUNESIFT_SNIPPET_LENGTH", n)?;
        sources.env_overrides.push("TUNESIFT_SNIPPET_LENGTH".to_string());
    }
    if let Some(v) = lookup("TUNESIFT_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("TUNESIFT_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over everything
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    Ok(())
}

/// Reject values that cannot be used once every layer has been applied.
pub fn validate(config: &SiftConfig) -> Result<(), ConfigError> {
    let reduction = config.analysis.chord_reduction.trim().to_lowercase();
    if !CHORD_REDUCTIONS.contains(&reduction.as_str()) {
        return Err(ConfigError::Invalid {
            key: "analysis.chord_reduction".to_string(),
            message: format!(
                "unknown value '{}', expected one of: {}",
                config.analysis.chord_reduction,
                CHORD_REDUCTIONS.join(", ")
            ),
        });
    }
    Ok(())
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
        return PathBuf::from(path);
    }

    if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        let (var_name, rest) = match stripped.find('/') {
            Some(pos) => (&stripped[..pos], Some(&stripped[pos + 1..])),
            None => (stripped, None),
        };
        return match (env::var(var_name), rest) {
            (Ok(value), Some(rest)) => PathBuf::from(value).join(rest),
            (Ok(value), None) => PathBuf::from(value),
            (Err(_), _) => PathBuf::from(path),
        };
    }

    PathBuf::from(path)
}
