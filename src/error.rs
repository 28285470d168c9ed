/// Error types shared across the crate
use thiserror::Error;

use crate::grid::PatternId;

/// Malformed beat-grid text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("line {line}: expected `<voice> <hits>`, hit string missing")]
    MissingHits { line: usize },

    #[error("line {line}: expected `<voice> <hits>`, found extra tokens")]
    ExtraTokens { line: usize },

    #[error("line {line}, column {column}: invalid hit character {found:?} (use x, - or |)")]
    InvalidHit {
        line: usize,
        column: usize,
        found: char,
    },

    #[error("pattern {pattern}: voice {voice} has {found} steps, expected {expected}")]
    LengthMismatch {
        pattern: PatternId,
        voice: String,
        expected: usize,
        found: usize,
    },

    #[error("pattern {pattern}: {source}")]
    InPattern {
        pattern: PatternId,
        #[source]
        source: Box<ParseError>,
    },
}

/// A trigger sink failed to hand off a hit
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriggerError {
    #[error("audio output: {0}")]
    Audio(String),

    #[error("midi output: {0}")]
    Midi(String),

    #[error("output not connected")]
    NotConnected,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unknown voice {0:?}")]
    UnknownVoice(String),

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
