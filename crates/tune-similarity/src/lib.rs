pub mod analyzer;
pub mod cache;
pub mod features;
pub mod pairwise;
pub mod recommend;
pub mod similarity;
pub mod types;

pub use analyzer::{HeuristicAnalyzer, TuneAnalyzer};
pub use cache::{content_hash, FeatureCache};
pub use pairwise::{most_similar, score_all, PairScore, PairwiseScores, SkippedPair};
pub use recommend::{RecommendError, Recommender, SimilarityMatrix};
pub use similarity::{
    similarity, similarity_report, SimilarityError, SimilarityParams, SimilarityReport, Term,
    TermScore, TERM_WEIGHTS,
};
pub use types::{FeatureVector, Meter, Piece, PieceMetadata, PieceTypeFlags};

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::info;

/// Current extraction version. Bump to invalidate cached feature vectors.
pub const CURRENT_VERSION: u32 = 1;

/// Feature extraction with an optional SQLite cache in front.
///
/// Cached by `(content_hash, CURRENT_VERSION)`, where the key covers the
/// piece's metadata and events plus the analyzer's configuration.
pub struct FeatureEngine {
    analyzer: Arc<dyn TuneAnalyzer>,
    cache: Option<FeatureCache>,
}

impl FeatureEngine {
    /// Create with the default heuristic analyzer.
    pub fn new(cache_db_path: &Path) -> Result<Self> {
        Self::with_analyzer(Arc::new(HeuristicAnalyzer::default()), cache_db_path)
    }

    /// Create with a custom analyzer.
    pub fn with_analyzer(analyzer: Arc<dyn TuneAnalyzer>, cache_db_path: &Path) -> Result<Self> {
        let cache = FeatureCache::open(cache_db_path).context("opening feature cache")?;

        let pruned = cache.prune_stale(CURRENT_VERSION)?;
        if pruned > 0 {
            info!(pruned, version = CURRENT_VERSION, "dropped stale feature cache entries");
        }

        Ok(Self {
            analyzer,
            cache: Some(cache),
        })
    }

    /// No cache: every request recomputes.
    pub fn uncached(analyzer: Arc<dyn TuneAnalyzer>) -> Self {
        Self {
            analyzer,
            cache: None,
        }
    }

    /// Feature vector for a piece, from cache when available.
    pub fn features(&self, piece: &Piece) -> Result<FeatureVector> {
        let Some(cache) = &self.cache else {
            return Ok(self.compute(piece));
        };

        let key = format!("{}-{}", content_hash(piece)?, self.analyzer.cache_tag());

        if let Some(mut cached) = cache.get(&key, CURRENT_VERSION)? {
            info!(piece = %piece.id, key = %key, "feature cache hit");
            // Identical content may be stored under another name.
            cached.piece_id.clone_from(&piece.id);
            return Ok(cached);
        }

        info!(piece = %piece.id, key = %key, "feature cache miss, computing");

        let fv = self.compute(piece);
        cache.put(&key, CURRENT_VERSION, &fv)?;

        Ok(fv)
    }

    /// Extract features without touching the cache.
    pub fn compute(&self, piece: &Piece) -> FeatureVector {
        features::extract(piece, self.analyzer.as_ref())
    }

    /// Features for many pieces, in parallel, in input order.
    pub fn features_batch(&self, pieces: &[Piece]) -> Result<Vec<FeatureVector>> {
        info!(pieces = pieces.len(), "extracting features");
        pieces.par_iter().map(|piece| self.features(piece)).collect()
    }
}
