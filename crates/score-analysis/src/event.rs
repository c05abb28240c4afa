//! Score events as handed over by an external score loader.
//!
//! An event is one notated onset (or silence) in time order. Pitches are
//! in semitones on the MIDI scale (middle C = 60.0) and may carry a
//! fractional part for microtonal spellings. Durations are in quarter
//! lengths.

use serde::{Deserialize, Serialize};

/// Tie position of an event within a sustained pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieState {
    #[default]
    None,
    Start,
    Continue,
    Stop,
}

impl TieState {
    /// Continue and Stop sustain an earlier onset rather than starting a new one.
    pub fn is_sustain(self) -> bool {
        matches!(self, TieState::Continue | TieState::Stop)
    }
}

/// Ornaments and expression marks attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ornament {
    Fermata,
    Trill,
    Mordent,
    Turn,
    Staccato,
    Accent,
    Other(String),
}

/// What sounds during an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Note { pitch: f64 },
    /// Simultaneous pitches, in any order.
    Chord { pitches: Vec<f64> },
    Rest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// Quarter lengths (1.0 = quarter note)
    pub duration: f64,
    #[serde(default)]
    pub tie: TieState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ornaments: Vec<Ornament>,
}

impl ScoreEvent {
    pub fn note(pitch: f64, duration: f64) -> Self {
        Self::new(EventKind::Note { pitch }, duration)
    }

    pub fn chord(pitches: Vec<f64>, duration: f64) -> Self {
        Self::new(EventKind::Chord { pitches }, duration)
    }

    pub fn rest(duration: f64) -> Self {
        Self::new(EventKind::Rest, duration)
    }

    fn new(kind: EventKind, duration: f64) -> Self {
        ScoreEvent {
            kind,
            duration,
            tie: TieState::None,
            ornaments: Vec::new(),
        }
    }

    pub fn with_tie(mut self, tie: TieState) -> Self {
        self.tie = tie;
        self
    }

    pub fn with_ornament(mut self, ornament: Ornament) -> Self {
        self.ornaments.push(ornament);
        self
    }
}
