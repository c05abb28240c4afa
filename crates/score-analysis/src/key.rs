use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::pitch_class;
use crate::token::Token;

/// Krumhansl-Kessler major key profile.
const MAJOR_PROFILE: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];

/// Krumhansl-Kessler minor key profile.
const MINOR_PROFILE: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const NATURAL_MINOR_SCALE: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

const NOTE_NAMES_SHARP: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
const NOTE_NAMES_FLAT: [&str; 12] = ["C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B"];

/// Pitch classes conventionally spelled with flats.
const FLAT_ROOTS: [u8; 6] = [1, 3, 5, 6, 8, 10]; // Db, Eb, F, Gb, Ab, Bb

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDetection {
    /// Root note name: "C", "Db", "F#", etc.
    pub root: String,
    /// Pitch class 0-11 (C=0, C#=1, ...)
    pub root_pitch_class: u8,
    pub mode: KeyMode,
    /// Pearson correlation with the best-matching key profile
    pub confidence: f64,
}

impl KeyDetection {
    /// The seven scale pitch classes (natural minor for minor keys).
    pub fn diatonic_pitch_classes(&self) -> [u8; 7] {
        let scale = match self.mode {
            KeyMode::Major => MAJOR_SCALE,
            KeyMode::Minor => NATURAL_MINOR_SCALE,
        };
        scale.map(|step| (self.root_pitch_class + step) % 12)
    }

    pub fn contains_pitch_class(&self, pc: u8) -> bool {
        self.diatonic_pitch_classes().contains(&(pc % 12))
    }
}

impl fmt::Display for KeyDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            KeyMode::Major => "major",
            KeyMode::Minor => "minor",
        };
        write!(f, "{} {}", self.root, mode)
    }
}

/// Estimate the key of a token stream with the Krumhansl-Schmuckler algorithm.
///
/// Every sounding token adds its duration to its pitch class, tie
/// continuations included. The weights are correlated against the 24
/// major/minor profiles and the best fit wins; on an exact tie the lower
/// root wins, major before minor. Returns `None` when nothing sounds for a
/// positive duration.
pub fn detect_key(tokens: &[Token]) -> Option<KeyDetection> {
    let weights = pitch_class_weights(tokens)?;

    let (root, mode, fit) = (0..12u8)
        .flat_map(|root| [(root, KeyMode::Major), (root, KeyMode::Minor)])
        .map(|(root, mode)| (root, mode, profile_fit(&weights, root, mode)))
        .fold(None, |best: Option<(u8, KeyMode, f64)>, candidate| match best {
            Some(kept) if kept.2 >= candidate.2 => Some(kept),
            _ => Some(candidate),
        })?;

    Some(KeyDetection {
        root: root_name(root).to_string(),
        root_pitch_class: root,
        mode,
        confidence: (fit * 10000.0).round() / 10000.0,
    })
}

fn pitch_class_weights(tokens: &[Token]) -> Option<[f64; 12]> {
    let mut weights = [0.0_f64; 12];
    for token in tokens {
        if let Some(pitch) = token.pitch() {
            weights[pitch_class(pitch) as usize] += token.duration.max(0.0);
        }
    }
    (weights.iter().sum::<f64>() > 0.0).then_some(weights)
}

/// Correlation of `weights` with the profile of `mode` built on `root`.
fn profile_fit(weights: &[f64; 12], root: u8, mode: KeyMode) -> f64 {
    let profile = match mode {
        KeyMode::Major => &MAJOR_PROFILE,
        KeyMode::Minor => &MINOR_PROFILE,
    };
    let from_root: [f64; 12] =
        std::array::from_fn(|degree| weights[(degree + root as usize) % 12]);
    correlation(&from_root, profile)
}

fn root_name(pc: u8) -> &'static str {
    let names = if FLAT_ROOTS.contains(&pc) {
        &NOTE_NAMES_FLAT
    } else {
        &NOTE_NAMES_SHARP
    };
    names[pc as usize % 12]
}

/// Pearson correlation; 0 when either side has no variance.
fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    let (x_mean, y_mean) = (mean(x), mean(y));

    let (covariance, x_var, y_var) = x.iter().zip(y).fold(
        (0.0, 0.0, 0.0),
        |(cov, xv, yv), (xi, yi)| {
            let (dx, dy) = (xi - x_mean, yi - y_mean);
            (cov + dx * dy, xv + dx * dx, yv + dy * dy)
        },
    );

    let spread = (x_var * y_var).sqrt();
    if spread < 1e-10 {
        0.0
    } else {
        covariance / spread
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ScoreEvent, TieState};
    use crate::token::{extract_tokens, ChordReduction};
    use pretty_assertions::assert_eq;

    fn melody(notes: &[(f64, f64)]) -> Vec<Token> {
        let events: Vec<_> = notes.iter().map(|&(p, d)| ScoreEvent::note(p, d)).collect();
        extract_tokens(&events, &ChordReduction::Skyline)
    }

    fn even(pitches: &[f64]) -> Vec<Token> {
        melody(&pitches.iter().map(|&p| (p, 1.0)).collect::<Vec<_>>())
    }

    #[test]
    fn silence_has_no_key() {
        assert_eq!(detect_key(&[]), None);

        let rests = extract_tokens(&[ScoreEvent::rest(4.0)], &ChordReduction::Skyline);
        assert_eq!(detect_key(&rests), None);

        assert_eq!(detect_key(&melody(&[(60.0, 0.0), (64.0, 0.0)])), None);
    }

    #[test]
    fn skyline_of_chords_reads_as_c_major() {
        let events: Vec<_> = [60.0, 62.0, 64.0, 65.0, 67.0, 69.0, 71.0, 72.0]
            .iter()
            .map(|&top| ScoreEvent::chord(vec![top - 13.0, top], 1.0))
            .collect();
        let key = detect_key(&extract_tokens(&events, &ChordReduction::Skyline)).unwrap();

        assert_eq!((key.root.as_str(), key.mode), ("C", KeyMode::Major));
        assert_eq!(key.to_string(), "C major");
    }

    #[test]
    fn held_notes_decide_between_relative_keys() {
        let natural_minor = [57.0, 59.0, 60.0, 62.0, 64.0, 65.0, 67.0, 69.0];

        let short_c: Vec<_> = natural_minor
            .iter()
            .map(|&p| (p, if p == 60.0 { 0.25 } else { 1.0 }))
            .collect();
        let minor = detect_key(&melody(&short_c)).unwrap();
        assert_eq!((minor.root_pitch_class, minor.mode), (9, KeyMode::Minor));

        let long_c: Vec<_> = natural_minor
            .iter()
            .map(|&p| {
                if p == 60.0 {
                    (p, 4.0)
                } else if p == 64.0 || p == 67.0 {
                    (p, 2.0)
                } else {
                    (p, 1.0)
                }
            })
            .collect();
        let major = detect_key(&melody(&long_c)).unwrap();
        assert_eq!((major.root_pitch_class, major.mode), (0, KeyMode::Major));
    }

    #[test]
    fn tie_continuations_weigh_like_one_long_note() {
        let tied = extract_tokens(
            &[
                ScoreEvent::note(67.0, 1.0).with_tie(TieState::Start),
                ScoreEvent::note(67.0, 1.0).with_tie(TieState::Stop),
                ScoreEvent::note(71.0, 1.0),
                ScoreEvent::note(62.0, 1.0),
            ],
            &ChordReduction::Skyline,
        );
        let held = melody(&[(67.0, 2.0), (71.0, 1.0), (62.0, 1.0)]);

        assert_eq!(detect_key(&tied), detect_key(&held));
    }

    #[test]
    fn transposing_moves_the_root_only() {
        let c_scale = [60.0, 62.0, 64.0, 65.0, 67.0, 69.0, 71.0, 72.0];
        let c = detect_key(&even(&c_scale)).unwrap();

        let bb = detect_key(&even(&c_scale.map(|p| p - 2.0))).unwrap();
        assert_eq!((bb.root.as_str(), bb.root_pitch_class), ("Bb", 10));
        assert_eq!((bb.mode, bb.confidence), (c.mode, c.confidence));

        let eb = detect_key(&even(&c_scale.map(|p| p + 3.0))).unwrap();
        assert_eq!(eb.root, "Eb");
        assert_eq!(eb.confidence, c.confidence);
    }

    #[test]
    fn confidence_is_rounded_to_four_places() {
        let key = detect_key(&even(&[60.0, 64.0, 67.0, 66.0])).unwrap();
        assert!((-1.0..=1.0).contains(&key.confidence));
        assert_eq!(key.confidence, (key.confidence * 10000.0).round() / 10000.0);
    }

    #[test]
    fn diatonic_sets() {
        let g_major = KeyDetection {
            root: "G".into(),
            root_pitch_class: 7,
            mode: KeyMode::Major,
            confidence: 0.9,
        };
        assert_eq!(g_major.diatonic_pitch_classes(), [7, 9, 11, 0, 2, 4, 6]);
        assert!(g_major.contains_pitch_class(6));
        assert!(!g_major.contains_pitch_class(5));

        let a_minor = KeyDetection {
            root: "A".into(),
            root_pitch_class: 9,
            mode: KeyMode::Minor,
            confidence: 0.9,
        };
        assert_eq!(a_minor.diatonic_pitch_classes(), [9, 11, 0, 2, 4, 5, 7]);
        assert_eq!(a_minor.to_string(), "A minor");
    }

    #[test]
    fn correlation_bounds() {
        let rising: Vec<f64> = (0..12).map(f64::from).collect();
        let falling: Vec<f64> = rising.iter().rev().copied().collect();

        assert!((correlation(&rising, &rising) - 1.0).abs() < 1e-12);
        assert!((correlation(&rising, &falling) + 1.0).abs() < 1e-12);
        assert_eq!(correlation(&rising, &[3.0; 12]), 0.0);
    }
}
