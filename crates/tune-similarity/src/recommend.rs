//! Similarity-driven recommendation from yes/no feedback.
//!
//! Preferences decay by half on every answer, then move toward (liked) or
//! away from (disliked) the similarity row of the piece just heard. A
//! piece that has been heard is never recommended again.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::pairwise::PairScore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecommendError {
    #[error("unknown piece '{0}'")]
    UnknownPiece(String),
}

/// Square similarity matrix over piece names, sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    names: Vec<String>,
    index: BTreeMap<String, usize>,
    rows: Vec<Vec<Option<f64>>>,
}

impl SimilarityMatrix {
    /// Build from pair records. Pieces are those appearing as `name1`;
    /// records naming anything else are ignored.
    pub fn from_scores(scores: &[PairScore]) -> Self {
        let names: Vec<String> = scores
            .iter()
            .map(|s| s.name1.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: BTreeMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut rows = vec![vec![None; names.len()]; names.len()];
        for (i, row) in rows.iter_mut().enumerate() {
            row[i] = Some(1.0);
        }

        for s in scores {
            if let (Some(&i), Some(&j)) = (index.get(&s.name1), index.get(&s.name2)) {
                if i != j {
                    rows[i][j] = Some(s.score);
                }
            }
        }

        Self { names, index, rows }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Result<usize, RecommendError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| RecommendError::UnknownPiece(name.to_string()))
    }

    pub fn get(&self, a: &str, b: &str) -> Result<Option<f64>, RecommendError> {
        Ok(self.rows[self.index_of(a)?][self.index_of(b)?])
    }
}

pub struct Recommender {
    matrix: SimilarityMatrix,
    preferences: Vec<f64>,
    excluded: BTreeSet<usize>,
}

impl Recommender {
    pub fn new(matrix: SimilarityMatrix) -> Self {
        let preferences = vec![0.0; matrix.len()];
        Self {
            matrix,
            preferences,
            excluded: BTreeSet::new(),
        }
    }

    /// Record an answer about `current`.
    pub fn feedback(&mut self, current: &str, liked: bool) -> Result<(), RecommendError> {
        let row = self.matrix.index_of(current)?;
        let sign = if liked { 1.0 } else { -1.0 };

        for (pref, sim) in self.preferences.iter_mut().zip(&self.matrix.rows[row]) {
            *pref = *pref / 2.0 + sign * sim.unwrap_or(0.0);
        }
        self.excluded.insert(row);

        Ok(())
    }

    /// The `k` best unheard pieces, highest preference first.
    pub fn top(&self, k: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .preferences
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.excluded.contains(i))
            .map(|(i, &p)| (self.matrix.names[i].as_str(), p))
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(k);
        ranked
    }

    pub fn preference(&self, name: &str) -> Result<f64, RecommendError> {
        Ok(self.preferences[self.matrix.index_of(name)?])
    }
}
