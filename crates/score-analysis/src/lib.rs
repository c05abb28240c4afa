//! Melodic feature extraction over symbolic score events.
//!
//! The pipeline is leaf-first and purely functional:
//!
//! 1. [`token::extract_tokens`] reduces each score event (chords included)
//!    to a single [`Token`].
//! 2. [`phrase::segment`] splits the token stream into [`Phrase`]s at rests
//!    and fermatas, skipping tie continuations.
//! 3. The aggregators in [`aggregate`] compute the per-piece features.
//!    Each returns `None` when it has no qualifying data.
//!
//! # Example
//!
//! ```
//! use score_analysis::{aggregate, extract_tokens, segment, ChordReduction, ScoreEvent};
//!
//! let events = vec![
//!     ScoreEvent::note(60.0, 1.0),
//!     ScoreEvent::note(62.0, 1.0),
//!     ScoreEvent::rest(1.0),
//!     ScoreEvent::chord(vec![60.0, 64.0, 67.0], 2.0),
//! ];
//!
//! let tokens = extract_tokens(&events, &ChordReduction::Skyline);
//! let phrases = segment(&tokens);
//! assert_eq!(phrases.len(), 2);
//! assert_eq!(aggregate::avg_phrase_length(&phrases), Some(1.5));
//! ```

pub mod aggregate;
pub mod event;
pub mod key;
pub mod phrase;
pub mod token;
pub mod vocabulary;

pub use aggregate::Tonality;
pub use event::{EventKind, Ornament, ScoreEvent, TieState};
pub use key::{detect_key, KeyDetection, KeyMode};
pub use phrase::{segment, Phrase};
pub use token::{extract_tokens, ChordReducer, ChordReduction, Token, TokenKind};
pub use vocabulary::{encode, snippets, Snippet};

/// Errors from score analysis operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown chord reduction '{0}' (expected highest, lowest, skyline, bassline, top, or bass)")]
    UnknownChordReduction(String),

    #[error("snippet length must be at least 1")]
    EmptySnippetWindow,
}

pub type Result<T> = std::result::Result<T, Error>;
