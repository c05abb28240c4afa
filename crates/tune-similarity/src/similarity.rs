//! Weighted similarity between two feature vectors.
//!
//! The score is the plain mean of a list of per-feature terms. Emphasis is
//! expressed by repeating a term ([`TERM_WEIGHTS`]), never by multiplying,
//! so scores stay identical to the repeated-term formulation. The melodic
//! arch terms are variable in number: one per phrase length in a range that
//! depends on both pieces, and only where both pieces define an arch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::FeatureVector;

/// A feature the scorer cannot do without.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimilarityError {
    #[error("piece '{piece}' has no {feature}")]
    MissingFeature { piece: String, feature: &'static str },
}

/// Range of phrase lengths compared by melodic arch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityParams {
    /// Shortest phrase length compared.
    pub arch_min_length: usize,
    /// Added to the mean of the two average phrase lengths to get the longest.
    pub arch_length_padding: usize,
}

impl Default for SimilarityParams {
    fn default() -> Self {
        Self {
            arch_min_length: 5,
            arch_length_padding: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "term", rename_all = "snake_case")]
pub enum Term {
    Composer,
    Meter,
    KeySignature,
    Instrumentation,
    NoteDurations,
    PhraseLength,
    PieceType,
    KeyConfidence,
    TonalProportion,
    Intervals,
    MelodicArch { length: usize },
}

/// Fixed terms and how many times each enters the mean.
pub const TERM_WEIGHTS: [(Term, usize); 10] = [
    (Term::Composer, 3),
    (Term::Meter, 1),
    (Term::KeySignature, 1),
    (Term::Instrumentation, 1),
    (Term::NoteDurations, 1),
    (Term::PhraseLength, 1),
    (Term::PieceType, 1),
    (Term::KeyConfidence, 2),
    (Term::TonalProportion, 2),
    (Term::Intervals, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermScore {
    #[serde(flatten)]
    pub term: Term,
    pub score: f64,
    pub weight: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub score: f64,
    pub terms: Vec<TermScore>,
}

/// Similarity with default parameters.
pub fn similarity(a: &FeatureVector, b: &FeatureVector) -> Result<f64, SimilarityError> {
    similarity_report(a, b, &SimilarityParams::default()).map(|r| r.score)
}

/// Score two pieces and keep every contributing term.
///
/// Terms whose metadata is absent on either side are skipped. Required
/// musical features that are absent make the pair incomparable.
pub fn similarity_report(
    a: &FeatureVector,
    b: &FeatureVector,
    params: &SimilarityParams,
) -> Result<SimilarityReport, SimilarityError> {
    let required_a = Required::of(a)?;
    let required_b = Required::of(b)?;

    let mut terms = Vec::with_capacity(TERM_WEIGHTS.len() + 8);

    for (term, weight) in TERM_WEIGHTS {
        let score = match term {
            Term::Composer => match (a.composer.as_deref(), b.composer.as_deref()) {
                (Some(x), Some(y)) => Some(binary(composers_match(x, y))),
                _ => None,
            },
            Term::Meter => a.meter.zip(b.meter).map(|(x, y)| binary(x == y)),
            Term::KeySignature => a.key_sharps.zip(b.key_sharps).map(|(x, y)| binary(x == y)),
            Term::Instrumentation => {
                if a.instrumentation.is_empty() || b.instrumentation.is_empty() {
                    None
                } else {
                    Some(binary(a.instrumentation == b.instrumentation))
                }
            }
            Term::NoteDurations => Some(mean_ratio(required_a.durations, required_b.durations)),
            Term::PhraseLength => Some(ratio(required_a.phrase_length, required_b.phrase_length)),
            Term::PieceType => Some(flag_overlap(
                &a.piece_type.as_array(),
                &b.piece_type.as_array(),
            )),
            Term::KeyConfidence => Some(ratio(
                required_a.tonality.key_confidence,
                required_b.tonality.key_confidence,
            )),
            Term::TonalProportion => Some(ratio(
                required_a.tonality.tonal_proportion,
                required_b.tonality.tonal_proportion,
            )),
            Term::Intervals => Some(dot(required_a.intervals, required_b.intervals)),
            Term::MelodicArch { .. } => None,
        };

        if let Some(score) = score {
            terms.push(TermScore { term, score, weight });
        }
    }

    let longest = ((required_a.phrase_length + required_b.phrase_length) / 2.0).floor() as usize
        + params.arch_length_padding;

    for length in params.arch_min_length..=longest {
        let (Some(x), Some(y)) = (a.melodic_arch.get(&length), b.melodic_arch.get(&length)) else {
            continue;
        };
        terms.push(TermScore {
            term: Term::MelodicArch { length },
            score: arch_score(x, y),
            weight: 1,
        });
    }

    Ok(SimilarityReport {
        score: weighted_mean(&terms),
        terms,
    })
}

struct Required<'a> {
    phrase_length: f64,
    durations: &'a [f64],
    intervals: &'a [f64],
    tonality: score_analysis::Tonality,
}

impl<'a> Required<'a> {
    fn of(fv: &'a FeatureVector) -> Result<Self, SimilarityError> {
        let missing = |feature: &'static str| SimilarityError::MissingFeature {
            piece: fv.piece_id.clone(),
            feature,
        };

        Ok(Self {
            phrase_length: fv.phrase_length_avg.ok_or_else(|| missing("phrase length"))?,
            durations: fv
                .note_durations
                .as_ref()
                .ok_or_else(|| missing("note duration histogram"))?,
            intervals: fv
                .intervals
                .as_ref()
                .ok_or_else(|| missing("interval histogram"))?,
            tonality: fv.tonality.ok_or_else(|| missing("tonality"))?,
        })
    }
}

/// Mean with every term repeated `weight` times, summed in list order.
fn weighted_mean(terms: &[TermScore]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for t in terms {
        for _ in 0..t.weight {
            sum += t.score;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn binary(matched: bool) -> f64 {
    if matched {
        1.0
    } else {
        0.0
    }
}

/// Case-insensitive: equal, one contains the other, or a shared word longer
/// than four characters.
pub fn composers_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b || a.contains(&b) || b.contains(&a) {
        return true;
    }

    let long_words = |s: &str| -> Vec<String> {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 4)
            .map(str::to_string)
            .collect()
    };
    let words_b = long_words(&b);
    long_words(&a).iter().any(|w| words_b.contains(w))
}

/// `min/max`, 1 when both are zero. Negative inputs count as zero.
pub fn ratio(a: f64, b: f64) -> f64 {
    let a = a.max(0.0);
    let b = b.max(0.0);
    let hi = a.max(b);
    if hi == 0.0 {
        1.0
    } else {
        a.min(b) / hi
    }
}

fn mean_ratio(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 1.0;
    }
    a.iter().zip(b).map(|(&x, &y)| ratio(x, y)).sum::<f64>() / n as f64
}

fn flag_overlap(a: &[bool], b: &[bool]) -> f64 {
    let mut matches = 0usize;
    let mut total = 0usize;
    for (&x, &y) in a.iter().zip(b) {
        if x || y {
            total += 1;
        }
        if x && y {
            matches += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        matches as f64 / total as f64
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn arch_score(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 1.0;
    }
    let diff = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum::<f64>() / n as f64;
    if diff < 1.0 {
        1.0
    } else {
        1.0 / diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Meter, PieceTypeFlags};
    use pretty_assertions::assert_eq;
    use score_analysis::aggregate::{DURATION_BINS, INTERVAL_BINS};
    use score_analysis::Tonality;
    use std::collections::{BTreeMap, BTreeSet};

    fn fv(id: &str) -> FeatureVector {
        let mut durations = [0.0; DURATION_BINS];
        durations[3] = 1.0;
        let mut intervals = [0.0; INTERVAL_BINS];
        intervals[14] = 0.5;
        intervals[10] = 0.5;

        FeatureVector {
            piece_id: id.into(),
            composer: None,
            meter: None,
            key_sharps: None,
            instrumentation: BTreeSet::new(),
            piece_type: PieceTypeFlags::default(),
            phrase_length_avg: Some(4.0),
            note_durations: Some(durations),
            intervals: Some(intervals),
            melodic_arch: BTreeMap::new(),
            key: None,
            tonality: Some(Tonality {
                key_confidence: 0.8,
                tonal_proportion: 0.9,
            }),
        }
    }

    fn score_of(report: &SimilarityReport, term: Term) -> Option<f64> {
        report.terms.iter().find(|t| t.term == term).map(|t| t.score)
    }

    #[test]
    fn ratio_edge_cases() {
        assert_eq!(ratio(0.0, 0.0), 1.0);
        assert_eq!(ratio(0.0, 0.5), 0.0);
        assert_eq!(ratio(2.0, 4.0), 0.5);
        assert_eq!(ratio(-0.3, 0.0), 1.0);
    }

    #[test]
    fn composer_matching() {
        assert!(composers_match("J.S. Bach", "j.s. bach"));
        assert!(composers_match("Bach", "Johann Sebastian Bach"));
        assert!(composers_match("Johann Sebastian Bach", "Bach, Johann Sebastian"));
        assert!(composers_match("Wolfgang Amadeus Mozart", "Leopold Mozart"));
        assert!(!composers_match("Carl Orff", "Frank Orff"));
        assert!(!composers_match("Handel", "Vivaldi"));
    }

    #[test]
    fn flag_overlap_counts_set_positions() {
        assert_eq!(flag_overlap(&[false; 6], &[false; 6]), 0.0);
        assert_eq!(
            flag_overlap(
                &[true, false, true, false, false, false],
                &[true, true, false, false, false, false]
            ),
            1.0 / 3.0
        );
    }

    #[test]
    fn arch_score_thresholds() {
        assert_eq!(arch_score(&[1.0, 2.0], &[1.5, 2.0]), 1.0);
        assert_eq!(arch_score(&[0.0, 0.0], &[4.0, 0.0]), 0.5);
    }

    #[test]
    fn self_similarity_ratio_and_binary_terms_are_one() {
        let mut a = fv("a");
        a.composer = Some("Bach".into());
        a.meter = Some(Meter {
            numerator: 4,
            denominator: 4,
        });
        a.key_sharps = Some(1);
        a.instrumentation = ["Soprano".to_string()].into_iter().collect();
        a.piece_type.chorale = true;
        a.phrase_length_avg = Some(6.0);
        a.melodic_arch.insert(5, vec![1.0, 3.0, 5.0, 3.0, 1.0]);
        a.melodic_arch.insert(6, vec![0.0; 6]);

        let report = similarity_report(&a, &a, &SimilarityParams::default()).unwrap();

        for t in &report.terms {
            if t.term != Term::Intervals {
                assert_eq!(t.score, 1.0, "{:?}", t.term);
            }
        }
        assert_eq!(score_of(&report, Term::Intervals), Some(0.5));
        assert_eq!(score_of(&report, Term::MelodicArch { length: 5 }), Some(1.0));
        assert_eq!(score_of(&report, Term::MelodicArch { length: 6 }), Some(1.0));
    }

    #[test]
    fn weights_repeat_terms_in_the_mean() {
        let mut a = fv("a");
        let mut b = fv("b");
        a.composer = Some("Bach".into());
        b.composer = Some("Handel".into());

        let report = similarity_report(&a, &b, &SimilarityParams::default()).unwrap();

        // composer 0 x3, durations 1, phrase 1, piece type 0, confidence 1 x2,
        // tonal 1 x2, intervals 0.5
        let expected = (0.0 * 3.0 + 1.0 + 1.0 + 0.0 + 2.0 + 2.0 + 0.5) / 11.0;
        assert_eq!(report.score, expected);
    }

    #[test]
    fn arch_range_depends_on_both_phrase_lengths() {
        let mut a = fv("a");
        let mut b = fv("b");
        a.phrase_length_avg = Some(3.0);
        b.phrase_length_avg = Some(4.0);
        // floor(3.5) + 4 = 7
        for len in [4, 5, 7, 8] {
            a.melodic_arch.insert(len, vec![0.0; len]);
            b.melodic_arch.insert(len, vec![2.0; len]);
        }

        let report = similarity_report(&a, &b, &SimilarityParams::default()).unwrap();
        let lengths: Vec<usize> = report
            .terms
            .iter()
            .filter_map(|t| match t.term {
                Term::MelodicArch { length } => Some(length),
                _ => None,
            })
            .collect();

        assert_eq!(lengths, vec![5, 7]);
        assert_eq!(score_of(&report, Term::MelodicArch { length: 5 }), Some(0.5));
    }

    #[test]
    fn missing_required_feature_is_an_error() {
        let a = fv("a");
        let mut b = fv("b");
        b.tonality = None;

        assert_eq!(
            similarity(&a, &b),
            Err(SimilarityError::MissingFeature {
                piece: "b".into(),
                feature: "tonality",
            })
        );

        let mut c = fv("c");
        c.note_durations = None;
        assert!(matches!(
            similarity(&c, &a),
            Err(SimilarityError::MissingFeature { feature: "note duration histogram", .. })
        ));
    }

    #[test]
    fn absent_metadata_skips_terms() {
        let mut a = fv("a");
        let b = fv("b");
        a.composer = Some("Bach".into());
        a.instrumentation = ["Flute".to_string()].into_iter().collect();

        let report = similarity_report(&a, &b, &SimilarityParams::default()).unwrap();

        assert_eq!(score_of(&report, Term::Composer), None);
        assert_eq!(score_of(&report, Term::Meter), None);
        assert_eq!(score_of(&report, Term::KeySignature), None);
        assert_eq!(score_of(&report, Term::Instrumentation), None);
        assert_eq!(report.terms.len(), 6);
    }
}
