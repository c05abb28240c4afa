//! Token stream extraction: one token per score event, chords reduced to a
//! single representative pitch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::{EventKind, Ornament, ScoreEvent, TieState};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "semitones", rename_all = "snake_case")]
pub enum TokenKind {
    Pitch(f64),
    Rest,
}

/// One musical event reduced to (pitch-or-rest, tie-state, ornaments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Quarter lengths
    pub duration: f64,
    pub tie: TieState,
    pub ornaments: Vec<Ornament>,
}

impl Token {
    pub fn pitch(&self) -> Option<f64> {
        match self.kind {
            TokenKind::Pitch(p) => Some(p),
            TokenKind::Rest => None,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, TokenKind::Rest)
    }

    pub fn has_fermata(&self) -> bool {
        self.ornaments.contains(&Ornament::Fermata)
    }

    /// Tie continuation: sounds, but is not a new onset.
    pub fn is_sustain(&self) -> bool {
        self.tie.is_sustain()
    }
}

/// Policy for collapsing a simultaneity to one pitch.
pub trait ChordReducer: Send + Sync {
    /// Returns `None` for an empty simultaneity.
    fn reduce(&self, pitches: &[f64]) -> Option<f64>;
}

/// Built-in reductions, named after the voice they keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordReduction {
    /// Highest absolute pitch (top voice)
    #[default]
    Skyline,
    /// Lowest absolute pitch (bass voice)
    Bassline,
}

impl ChordReducer for ChordReduction {
    fn reduce(&self, pitches: &[f64]) -> Option<f64> {
        let mut iter = pitches.iter().copied();
        let first = iter.next()?;
        Some(match self {
            ChordReduction::Skyline => iter.fold(first, |best, p| {
                if p.total_cmp(&best).is_gt() { p } else { best }
            }),
            ChordReduction::Bassline => iter.fold(first, |best, p| {
                if p.total_cmp(&best).is_lt() { p } else { best }
            }),
        })
    }
}

impl FromStr for ChordReduction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "highest" | "skyline" | "top" => Ok(ChordReduction::Skyline),
            "lowest" | "bassline" | "bass" => Ok(ChordReduction::Bassline),
            other => Err(crate::Error::UnknownChordReduction(other.to_string())),
        }
    }
}

impl fmt::Display for ChordReduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChordReduction::Skyline => write!(f, "highest"),
            ChordReduction::Bassline => write!(f, "lowest"),
        }
    }
}

/// Walk events in onset order and emit one token per event.
///
/// An empty chord carries no pitch and is emitted as a rest.
pub fn extract_tokens(events: &[ScoreEvent], reducer: &dyn ChordReducer) -> Vec<Token> {
    events
        .iter()
        .enumerate()
        .map(|(index, event)| {
            let kind = match &event.kind {
                EventKind::Note { pitch } => TokenKind::Pitch(*pitch),
                EventKind::Chord { pitches } => match reducer.reduce(pitches) {
                    Some(pitch) => TokenKind::Pitch(pitch),
                    None => {
                        debug!(index, "empty chord treated as rest");
                        TokenKind::Rest
                    }
                },
                EventKind::Rest => TokenKind::Rest,
            };

            Token {
                kind,
                duration: event.duration,
                tie: event.tie,
                ornaments: event.ornaments.clone(),
            }
        })
        .collect()
}
