//! Configuration loading for tunesift.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/tunesift/config.toml` (system)
//! 2. `~/.config/tunesift/config.toml` (user)
//! 3. `./tunesift.toml` (local override), or the `--config` path instead
//! 4. Environment variables (`TUNESIFT_*`, `RUST_LOG`)
//!
//! Each layer only overrides the keys it sets.
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! cache_db = "~/.local/share/tunesift/features.db"
//! corpus_dir = "~/corpus/essen"
//!
//! [analysis]
//! chord_reduction = "highest"
//! snippet_length = 30
//!
//! [similarity]
//! arch_min_length = 5
//! arch_length_padding = 4
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files, expand_path, ConfigSources};
pub use sections::{AnalysisConfig, PathsConfig, SimilarityConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SiftConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl SiftConfig {
    /// Load configuration, with `config_path` replacing `./tunesift.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and variables contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = SiftConfig::default();

        for path in loader::discover_config_files(config_path) {
            loader::load_file_into(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources)?;
        loader::validate(&config)?;

        Ok((config, sources))
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# tunesift configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "cache_db = \"{}\"\n",
            self.paths.cache_db.display()
        ));
        output.push_str(&format!(
            "corpus_dir = \"{}\"\n",
            self.paths.corpus_dir.display()
        ));

        output.push_str("\n[analysis]\n");
        output.push_str(&format!(
            "chord_reduction = \"{}\"\n",
            self.analysis.chord_reduction
        ));
        output.push_str(&format!(
            "snippet_length = {}\n",
            self.analysis.snippet_length
        ));

        output.push_str("\n[similarity]\n");
        output.push_str(&format!(
            "arch_min_length = {}\n",
            self.similarity.arch_min_length
        ));
        output.push_str(&format!(
            "arch_length_padding = {}\n",
            self.similarity.arch_length_padding
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}
