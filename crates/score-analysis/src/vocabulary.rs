//! Class vocabulary for next-note training data.
//!
//! Pitches 0-108 map to themselves; rests and anything else get a fixed
//! class each.

use serde::{Deserialize, Serialize};

use crate::token::{Token, TokenKind};
use crate::{Error, Result};

pub const MAX_PITCH: u8 = 108;
pub const REST: u8 = 109;
pub const UNKNOWN: u8 = 110;
pub const VOCABULARY_SIZE: usize = 111;

/// A fixed-length window of classes and the class that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub input: Vec<u8>,
    pub target: u8,
}

impl Snippet {
    /// Transpose every pitch class by `shift` semitones.
    ///
    /// Returns `None` if a pitch would leave the vocabulary range.
    pub fn transposed(&self, shift: i32) -> Option<Snippet> {
        let input = self
            .input
            .iter()
            .map(|&class| transpose_class(class, shift))
            .collect::<Option<Vec<_>>>()?;
        Some(Snippet {
            input,
            target: transpose_class(self.target, shift)?,
        })
    }
}

fn transpose_class(class: u8, shift: i32) -> Option<u8> {
    if class > MAX_PITCH {
        return Some(class);
    }
    let moved = i32::from(class) + shift;
    if (0..=i32::from(MAX_PITCH)).contains(&moved) {
        Some(moved as u8)
    } else {
        None
    }
}

/// Map a token stream to vocabulary classes.
///
/// Leading rests are dropped and runs of rests collapse to one.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let mut classes = Vec::with_capacity(tokens.len());

    for token in tokens {
        match token.kind {
            TokenKind::Rest => {
                if classes.last().is_some_and(|&last| last != REST) {
                    classes.push(REST);
                }
            }
            TokenKind::Pitch(pitch) => classes.push(pitch_class_id(pitch)),
        }
    }

    classes
}

fn pitch_class_id(pitch: f64) -> u8 {
    if pitch.fract() == 0.0 && (0.0..=f64::from(MAX_PITCH)).contains(&pitch) {
        pitch as u8
    } else {
        UNKNOWN
    }
}

/// Every window of `n` classes paired with the class after it.
pub fn snippets(classes: &[u8], n: usize) -> Result<Vec<Snippet>> {
    if n == 0 {
        return Err(Error::EmptySnippetWindow);
    }

    Ok(classes
        .windows(n + 1)
        .map(|window| Snippet {
            input: window[..n].to_vec(),
            target: window[n],
        })
        .collect())
}
