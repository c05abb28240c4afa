//! Per-piece feature extraction.

use tracing::debug;

use score_analysis::aggregate::{
    avg_phrase_length, interval_histogram, melodic_arches, nonharmonic_proportion,
    note_duration_histogram,
};
use score_analysis::segment;

use crate::analyzer::TuneAnalyzer;
use crate::types::{FeatureVector, Piece, PieceTypeFlags};

/// Run the full extraction pipeline over one piece.
///
/// Undefined features stay `None`; nothing here fails.
pub fn extract(piece: &Piece, analyzer: &dyn TuneAnalyzer) -> FeatureVector {
    let tokens = analyzer.tokens(&piece.events);
    let phrases = segment(&tokens);
    let key = analyzer.analyze_key(&tokens);
    let tonality = key
        .as_ref()
        .and_then(|key| nonharmonic_proportion(&tokens, key));

    let metadata = &piece.metadata;
    let fv = FeatureVector {
        piece_id: piece.id.clone(),
        composer: metadata.composer.clone().filter(|c| !c.trim().is_empty()),
        meter: metadata.meter,
        key_sharps: metadata.key_sharps,
        instrumentation: metadata
            .parts
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        piece_type: PieceTypeFlags::from_metadata(metadata),
        phrase_length_avg: avg_phrase_length(&phrases),
        note_durations: note_duration_histogram(&tokens),
        intervals: interval_histogram(&tokens),
        melodic_arch: melodic_arches(&phrases),
        key,
        tonality,
    };

    debug!(
        piece = %piece.id,
        tokens = tokens.len(),
        phrases = phrases.len(),
        arch_lengths = fv.melodic_arch.len(),
        "extracted features"
    );

    fv
}
