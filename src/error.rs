use thiserror::Error;

/// Errors that can occur while building grammars and generators, or while
/// generating.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid grammar json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("grammar for {language} does not contain a production for {production}")]
    UnknownProduction { language: String, production: String },

    #[error("duplicate definition of production {0}")]
    DuplicateProduction(String),

    #[error("more than one replacement registered for production {0}")]
    DuplicateReplacement(String),

    #[error("invalid repetition of {min}..{max:?} with norm {norm}")]
    InvalidRepetition {
        min: u32,
        max: Option<u32>,
        norm: u32,
    },

    #[error("probability {0} is not within [0, 1]")]
    InvalidProbability(f64),

    #[error("cannot generate end of input")]
    EndOfInput,

    #[error("unknown character set: {0}")]
    UnsupportedCharacterSet(String),

    #[error("no alternatives are eligible for generation")]
    NoAlternatives,

    #[error("invalid code point: {0:#x}")]
    InvalidCodePoint(u32),

    #[error("unpredicted decision at {location}: {message}")]
    Unpredicted { location: String, message: String },

    #[error("input closed while waiting for a decision")]
    InputClosed,

    #[error("replacement for {production} failed: {message}")]
    Replacement { production: String, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
