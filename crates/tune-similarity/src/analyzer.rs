use score_analysis::{detect_key, extract_tokens, ChordReduction, KeyDetection, ScoreEvent, Token};

/// Pluggable analysis backend.
///
/// The default is [`HeuristicAnalyzer`]. Alternatives (a learned key model,
/// a different voice reduction) slot in without touching the feature engine.
pub trait TuneAnalyzer: Send + Sync {
    fn tokens(&self, events: &[ScoreEvent]) -> Vec<Token>;

    fn analyze_key(&self, tokens: &[Token]) -> Option<KeyDetection>;

    /// Distinguishes cached results of differently configured analyzers.
    fn cache_tag(&self) -> String;
}

/// Chord reduction plus Krumhansl-Schmuckler key detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer {
    pub reduction: ChordReduction,
}

impl HeuristicAnalyzer {
    pub fn new(reduction: ChordReduction) -> Self {
        Self { reduction }
    }
}

impl TuneAnalyzer for HeuristicAnalyzer {
    fn tokens(&self, events: &[ScoreEvent]) -> Vec<Token> {
        extract_tokens(events, &self.reduction)
    }

    fn analyze_key(&self, tokens: &[Token]) -> Option<KeyDetection> {
        detect_key(tokens)
    }

    fn cache_tag(&self) -> String {
        format!("heuristic-{}", self.reduction)
    }
}
