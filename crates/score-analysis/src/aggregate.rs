//! Stateless feature aggregators over phrases and token streams.
//!
//! Every aggregator returns `None` when it has nothing to aggregate. A
//! missing feature is never reported as zeros.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::KeyDetection;
use crate::phrase::Phrase;
use crate::token::Token;

/// Reference pitch for melodic arch heights.
pub const MIDDLE_C: f64 = 60.0;

/// Duration bins: 0.25, 0.50, ... 4.00 quarter lengths.
pub const DURATION_BINS: usize = 16;
pub const DURATION_STEP: f64 = 0.25;

/// Interval bins: -12..=+12 semitones.
pub const MAX_INTERVAL: i64 = 12;
pub const INTERVAL_BINS: usize = 25;

const GRID_TOLERANCE: f64 = 1e-9;

/// Key confidence plus the fraction of onsets inside the key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tonality {
    pub key_confidence: f64,
    /// 1 - nonharmonic fraction
    pub tonal_proportion: f64,
}

/// Mean pitch height above middle C at each position, over every phrase of
/// exactly `length` onsets.
pub fn melodic_arch(phrases: &[Phrase], length: usize) -> Option<Vec<f64>> {
    if length == 0 {
        return None;
    }

    let mut sums = vec![0.0; length];
    let mut count = 0usize;

    for phrase in phrases.iter().filter(|p| p.len() == length) {
        for (sum, pitch) in sums.iter_mut().zip(phrase.pitches()) {
            *sum += pitch - MIDDLE_C;
        }
        count += 1;
    }

    if count == 0 {
        return None;
    }

    Some(sums.into_iter().map(|s| s / count as f64).collect())
}

/// Melodic arch for every non-zero phrase length that occurs.
pub fn melodic_arches(phrases: &[Phrase]) -> BTreeMap<usize, Vec<f64>> {
    let mut lengths: Vec<usize> = phrases
        .iter()
        .map(Phrase::len)
        .filter(|&len| len > 0)
        .collect();
    lengths.sort_unstable();
    lengths.dedup();

    lengths
        .into_iter()
        .filter_map(|len| melodic_arch(phrases, len).map(|arch| (len, arch)))
        .collect()
}

/// Mean phrase length, zero-length phrases included.
pub fn avg_phrase_length(phrases: &[Phrase]) -> Option<f64> {
    if phrases.is_empty() {
        return None;
    }
    let total: usize = phrases.iter().map(Phrase::len).sum();
    Some(total as f64 / phrases.len() as f64)
}

/// Distribution of note durations over 16 sixteenth-multiple bins.
///
/// Every note counts toward the denominator. Only durations landing exactly
/// on a 0.25 multiple between 0.25 and 4.0 land in a bin, so off-grid notes
/// (tuplets, notes longer than a whole) lower the histogram's sum below 1.
/// Rests are not notes and are ignored.
pub fn note_duration_histogram(tokens: &[Token]) -> Option<[f64; DURATION_BINS]> {
    let mut bins = [0.0; DURATION_BINS];
    let mut total = 0usize;

    for token in tokens.iter().filter(|t| !t.is_rest()) {
        total += 1;
        let steps = token.duration / DURATION_STEP;
        let rounded = steps.round();
        if (steps - rounded).abs() > GRID_TOLERANCE {
            continue;
        }
        if rounded >= 1.0 && rounded <= DURATION_BINS as f64 {
            bins[rounded as usize - 1] += 1.0;
        }
    }

    if total == 0 {
        return None;
    }

    for bin in &mut bins {
        *bin /= total as f64;
    }
    Some(bins)
}

/// Histogram of signed semitone steps between consecutive notes.
///
/// Rests are skipped, so the step across a rest is counted. Tie
/// continuations are not filtered: a tied note contributes a unison step.
/// Steps wider than an octave are dropped from both numerator and
/// denominator.
pub fn interval_histogram(tokens: &[Token]) -> Option<[f64; INTERVAL_BINS]> {
    let pitches: Vec<f64> = tokens.iter().filter_map(Token::pitch).collect();

    let mut bins = [0.0; INTERVAL_BINS];
    let mut counted = 0usize;

    for pair in pitches.windows(2) {
        let step = (pair[1] - pair[0]).round();
        if step.abs() <= MAX_INTERVAL as f64 {
            bins[(step as i64 + MAX_INTERVAL) as usize] += 1.0;
            counted += 1;
        }
    }

    if counted == 0 {
        return None;
    }

    for bin in &mut bins {
        *bin /= counted as f64;
    }
    Some(bins)
}

/// Share of onsets whose pitch class belongs to `key`, with the key's confidence.
///
/// Tie continuations and rests are not onsets. Pitch classes are compared
/// by semitone, so enharmonic spellings are equivalent.
pub fn nonharmonic_proportion(tokens: &[Token], key: &KeyDetection) -> Option<Tonality> {
    let mut notes = 0usize;
    let mut nonharmonic = 0usize;

    for pitch in tokens
        .iter()
        .filter(|t| !t.is_sustain())
        .filter_map(Token::pitch)
    {
        notes += 1;
        if !key.contains_pitch_class(pitch_class(pitch)) {
            nonharmonic += 1;
        }
    }

    if notes == 0 {
        return None;
    }

    Some(Tonality {
        key_confidence: key.confidence,
        tonal_proportion: 1.0 - nonharmonic as f64 / notes as f64,
    })
}

/// Pitch class 0-11 of a (possibly fractional) semitone pitch.
pub fn pitch_class(pitch: f64) -> u8 {
    (pitch.round() as i64).rem_euclid(12) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ScoreEvent, TieState};
    use crate::key::KeyMode;
    use crate::phrase::segment;
    use crate::token::{extract_tokens, ChordReduction};
    use pretty_assertions::assert_eq;

    fn tokens(events: &[ScoreEvent]) -> Vec<Token> {
        extract_tokens(events, &ChordReduction::Skyline)
    }

    fn notes(pitches: &[f64]) -> Vec<Token> {
        tokens(
            &pitches
                .iter()
                .map(|&p| ScoreEvent::note(p, 1.0))
                .collect::<Vec<_>>(),
        )
    }

    fn c_major(confidence: f64) -> KeyDetection {
        KeyDetection {
            root: "C".into(),
            root_pitch_class: 0,
            mode: KeyMode::Major,
            confidence,
        }
    }

    #[test]
    fn arch_averages_positions_across_matching_phrases() {
        let toks = tokens(&[
            ScoreEvent::note(60.0, 1.0),
            ScoreEvent::note(64.0, 1.0),
            ScoreEvent::rest(1.0),
            ScoreEvent::note(62.0, 1.0),
            ScoreEvent::note(72.0, 1.0),
            ScoreEvent::rest(1.0),
            ScoreEvent::note(48.0, 1.0),
        ]);
        let phrases = segment(&toks);

        assert_eq!(melodic_arch(&phrases, 2), Some(vec![1.0, 8.0]));
        assert_eq!(melodic_arch(&phrases, 1), Some(vec![-12.0]));
        assert_eq!(melodic_arch(&phrases, 3), None);
        assert_eq!(melodic_arch(&phrases, 0), None);
    }

    #[test]
    fn arch_counts_trailing_phrase_only_at_its_exact_length() {
        // Trailing phrase of length 3 with no closing rest.
        let toks = notes(&[60.0, 62.0, 64.0]);
        let phrases = segment(&toks);

        assert_eq!(melodic_arch(&phrases, 3), Some(vec![0.0, 2.0, 4.0]));
        assert_eq!(melodic_arch(&phrases, 2), None);
        assert_eq!(avg_phrase_length(&phrases), Some(3.0));
    }

    #[test]
    fn arches_cover_every_observed_length() {
        let toks = tokens(&[
            ScoreEvent::rest(1.0),
            ScoreEvent::note(60.0, 1.0),
            ScoreEvent::rest(1.0),
            ScoreEvent::note(67.0, 1.0),
            ScoreEvent::note(65.0, 1.0),
        ]);
        let arches = melodic_arches(&segment(&toks));

        assert_eq!(arches.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(arches[&2], vec![7.0, 5.0]);
    }

    #[test]
    fn avg_phrase_length_includes_empty_phrases() {
        let toks = tokens(&[
            ScoreEvent::rest(1.0),
            ScoreEvent::note(60.0, 1.0),
            ScoreEvent::note(62.0, 1.0),
            ScoreEvent::rest(1.0),
        ]);
        let phrases = segment(&toks);

        assert_eq!(avg_phrase_length(&phrases), Some(1.0));
        assert_eq!(avg_phrase_length(&[]), None);
    }

    #[test]
    fn duration_histogram_bins_exact_multiples() {
        let toks = tokens(&[
            ScoreEvent::note(60.0, 0.25),
            ScoreEvent::note(60.0, 0.25),
            ScoreEvent::note(60.0, 0.5),
            ScoreEvent::note(60.0, 1.0),
        ]);

        let hist = note_duration_histogram(&toks).unwrap();

        let mut expected = [0.0; DURATION_BINS];
        expected[0] = 0.5;
        expected[1] = 0.25;
        expected[3] = 0.25;
        assert_eq!(hist, expected);
        assert!((hist.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn duration_histogram_keeps_off_grid_notes_in_denominator() {
        let toks = tokens(&[
            ScoreEvent::note(60.0, 1.0),
            ScoreEvent::note(60.0, 1.0 / 3.0),
            ScoreEvent::note(60.0, 6.0),
            ScoreEvent::note(60.0, 4.0),
        ]);

        let hist = note_duration_histogram(&toks).unwrap();

        assert_eq!(hist[3], 0.25);
        assert_eq!(hist[15], 0.25);
        assert!((hist.iter().sum::<f64>() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn duration_histogram_ignores_rests() {
        let toks = tokens(&[ScoreEvent::rest(1.0), ScoreEvent::note(60.0, 2.0)]);
        let hist = note_duration_histogram(&toks).unwrap();
        assert_eq!(hist[7], 1.0);

        assert_eq!(note_duration_histogram(&tokens(&[ScoreEvent::rest(1.0)])), None);
    }

    #[test]
    fn interval_histogram_scenario() {
        let hist = interval_histogram(&notes(&[60.0, 62.0, 59.0])).unwrap();

        let mut expected = [0.0; INTERVAL_BINS];
        expected[14] = 0.5;
        expected[9] = 0.5;
        assert_eq!(hist, expected);
    }

    #[test]
    fn interval_histogram_drops_leaps_beyond_an_octave() {
        let hist = interval_histogram(&notes(&[60.0, 80.0, 79.0])).unwrap();
        assert_eq!(hist[11], 1.0);

        assert_eq!(interval_histogram(&notes(&[60.0, 80.0])), None);
        assert_eq!(interval_histogram(&notes(&[60.0])), None);
    }

    #[test]
    fn interval_histogram_ignores_out_of_range_steps() {
        let hist = interval_histogram(&notes(&[1e300, -1e300, 60.0, 62.0])).unwrap();
        assert_eq!(hist[14], 1.0);

        assert_eq!(interval_histogram(&notes(&[f64::MAX, f64::MIN])), None);
    }

    #[test]
    fn interval_histogram_spans_rests_and_keeps_ties() {
        let toks = tokens(&[
            ScoreEvent::note(60.0, 1.0).with_tie(TieState::Start),
            ScoreEvent::note(60.0, 1.0).with_tie(TieState::Stop),
            ScoreEvent::rest(1.0),
            ScoreEvent::note(72.0, 1.0),
        ]);

        let hist = interval_histogram(&toks).unwrap();

        assert_eq!(hist[12], 0.5);
        assert_eq!(hist[24], 0.5);
    }

    #[test]
    fn histograms_sum_to_one() {
        let toks = notes(&[60.0, 62.0, 64.0, 65.0, 67.0, 65.0, 64.0, 62.0, 60.0, 55.0]);
        let intervals = interval_histogram(&toks).unwrap();
        let durations = note_duration_histogram(&toks).unwrap();

        assert!((intervals.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((durations.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tonality_counts_onsets_outside_the_key() {
        // C D F# G; F# is outside C major.
        let toks = notes(&[60.0, 62.0, 66.0, 67.0]);
        let tonality = nonharmonic_proportion(&toks, &c_major(0.8)).unwrap();

        assert_eq!(tonality.key_confidence, 0.8);
        assert_eq!(tonality.tonal_proportion, 0.75);
    }

    #[test]
    fn tonality_skips_tie_continuations() {
        let toks = tokens(&[
            ScoreEvent::note(61.0, 1.0).with_tie(TieState::Start),
            ScoreEvent::note(61.0, 1.0).with_tie(TieState::Continue),
            ScoreEvent::note(61.0, 1.0).with_tie(TieState::Stop),
            ScoreEvent::note(60.0, 1.0),
        ]);

        let tonality = nonharmonic_proportion(&toks, &c_major(0.5)).unwrap();
        assert_eq!(tonality.tonal_proportion, 0.5);
    }

    #[test]
    fn tonality_undefined_without_notes() {
        let toks = tokens(&[ScoreEvent::rest(1.0)]);
        assert_eq!(nonharmonic_proportion(&toks, &c_major(0.5)), None);
    }

    #[test]
    fn pitch_class_wraps_and_rounds() {
        assert_eq!(pitch_class(60.0), 0);
        assert_eq!(pitch_class(71.0), 11);
        assert_eq!(pitch_class(60.6), 1);
        assert_eq!(pitch_class(-1.0), 11);
    }
}
