use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use score_analysis::aggregate::{DURATION_BINS, INTERVAL_BINS};
use score_analysis::{KeyDetection, ScoreEvent, Tonality};

/// A score as handed over by the score loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    /// Display name; the CLI fills it from the file stem when absent.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: PieceMetadata,
    pub events: Vec<ScoreEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PieceMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub composer: Option<String>,
    #[serde(default)]
    pub meter: Option<Meter>,
    /// Declared key signature: positive for sharps, negative for flats.
    #[serde(default)]
    pub key_sharps: Option<i8>,
    /// Part or instrument names.
    #[serde(default)]
    pub parts: Vec<String>,
    #[serde(default)]
    pub opus: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Meter {
    pub numerator: u8,
    pub denominator: u8,
}

/// Genre and catalogue flags inferred from free-text metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PieceTypeFlags {
    pub chorale: bool,
    pub jig: bool,
    pub bach: bool,
    pub sonata: bool,
    pub symphony: bool,
    pub opus: bool,
}

impl PieceTypeFlags {
    pub fn from_metadata(metadata: &PieceMetadata) -> Self {
        let title = metadata.title.as_deref().unwrap_or_default().to_lowercase();
        let composer = metadata.composer.as_deref().unwrap_or_default().to_lowercase();

        Self {
            chorale: title.contains("chorale"),
            jig: title.contains("jig"),
            bach: composer.contains("bach") || title.contains("bach"),
            sonata: title.contains("sonata"),
            symphony: title.contains("symphony"),
            opus: metadata.opus.is_some() || title.contains("op.") || title.contains("opus"),
        }
    }

    pub fn as_array(&self) -> [bool; 6] {
        [
            self.chorale,
            self.jig,
            self.bach,
            self.sonata,
            self.symphony,
            self.opus,
        ]
    }
}

/// Everything the scorer needs to know about one piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub piece_id: String,
    pub composer: Option<String>,
    pub meter: Option<Meter>,
    pub key_sharps: Option<i8>,
    pub instrumentation: BTreeSet<String>,
    pub piece_type: PieceTypeFlags,
    pub phrase_length_avg: Option<f64>,
    pub note_durations: Option<[f64; DURATION_BINS]>,
    pub intervals: Option<[f64; INTERVAL_BINS]>,
    /// Arch vectors keyed by phrase length; lengths never observed are absent.
    pub melodic_arch: BTreeMap<usize, Vec<f64>>,
    pub key: Option<KeyDetection>,
    pub tonality: Option<Tonality>,
}
