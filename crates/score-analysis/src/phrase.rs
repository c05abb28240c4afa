//! Phrase segmentation.
//!
//! A phrase is the run of onsets between two boundary markers. Rests and
//! fermata-marked tokens are boundaries and are not part of any phrase.
//! Tie continuations are skipped before the boundary check, so a fermata
//! on a tied continuation does not close a phrase.

use serde::{Deserialize, Serialize};

use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Phrase {
    tokens: Vec<Token>,
}

impl Phrase {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Pitches in onset order.
    pub fn pitches(&self) -> impl Iterator<Item = f64> + '_ {
        self.tokens.iter().filter_map(Token::pitch)
    }
}

/// Partition a token stream into phrases.
///
/// Every boundary closes the current phrase, even an empty one, so runs of
/// consecutive rests produce zero-length phrases. The trailing phrase is
/// emitted only if it is non-empty.
pub fn segment(tokens: &[Token]) -> Vec<Phrase> {
    let mut phrases = Vec::new();
    let mut current = Phrase::default();

    for token in tokens {
        if token.is_sustain() {
            continue;
        }

        if token.is_rest() || token.has_fermata() {
            phrases.push(std::mem::take(&mut current));
        } else {
            current.tokens.push(token.clone());
        }
    }

    if !current.is_empty() {
        phrases.push(current);
    }

    phrases
}
