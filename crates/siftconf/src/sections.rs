//! Configuration sections and their compiled defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Accepted chord reduction names.
pub const CHORD_REDUCTIONS: [&str; 6] = ["highest", "lowest", "skyline", "bassline", "top", "bass"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Feature cache database.
    /// Default: ~/.local/share/tunesift/features.db
    #[serde(default = "PathsConfig::default_cache_db")]
    pub cache_db: PathBuf,

    /// Directory scanned for piece documents.
    /// Default: .
    #[serde(default = "PathsConfig::default_corpus_dir")]
    pub corpus_dir: PathBuf,
}

impl PathsConfig {
    fn default_cache_db() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.data_dir().join("tunesift/features.db"))
            .unwrap_or_else(|| PathBuf::from(".tunesift/features.db"))
    }

    fn default_corpus_dir() -> PathBuf {
        PathBuf::from(".")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_db: Self::default_cache_db(),
            corpus_dir: Self::default_corpus_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Which voice of a chord becomes the melody: "highest" or "lowest".
    #[serde(default = "AnalysisConfig::default_chord_reduction")]
    pub chord_reduction: String,

    /// Window length for training snippets.
    #[serde(default = "AnalysisConfig::default_snippet_length")]
    pub snippet_length: usize,
}

impl AnalysisConfig {
    fn default_chord_reduction() -> String {
        "highest".to_string()
    }

    fn default_snippet_length() -> usize {
        30
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chord_reduction: Self::default_chord_reduction(),
            snippet_length: Self::default_snippet_length(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Shortest phrase length compared by melodic arch.
    #[serde(default = "SimilarityConfig::default_arch_min_length")]
    pub arch_min_length: usize,

    /// Added to the pair's mean phrase length to get the longest compared.
    #[serde(default = "SimilarityConfig::default_arch_length_padding")]
    pub arch_length_padding: usize,
}

impl SimilarityConfig {
    fn default_arch_min_length() -> usize {
        5
    }

    fn default_arch_length_padding() -> usize {
        4
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            arch_min_length: Self::default_arch_min_length(),
            arch_length_padding: Self::default_arch_length_padding(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// tracing EnvFilter directive.
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
