use crate::model::raw::token_type_name;

use thiserror::Error;

pub type DeserializationResult<T> = std::result::Result<T, DeserializationError>;
pub type ParseResult<T> = std::result::Result<T, ParseError>;
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Low level errors raised while reading bytes out of a Binary XML buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeserializationError {
    #[error(
        "Offset {offset}: tried to read {what}, needed {need} bytes but only {have} are available"
    )]
    Truncated {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("Offset {offset}: tried to read an invalid byte `{value:#04x}` as binxml token")]
    InvalidToken { value: u8, offset: u64 },

    #[error("Offset {offset}: found token `{found}` while expecting {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        offset: u64,
    },

    #[error("Offset {offset}: {what}: invalid data")]
    InvalidData { what: &'static str, offset: u64 },

    #[error("Offset {offset}: maximum nesting depth of {limit} exceeded")]
    NestingTooDeep { limit: usize, offset: u64 },
}

impl DeserializationError {
    pub fn offset(&self) -> u64 {
        match self {
            DeserializationError::Truncated { offset, .. }
            | DeserializationError::InvalidToken { offset, .. }
            | DeserializationError::UnexpectedToken { offset, .. }
            | DeserializationError::InvalidData { offset, .. }
            | DeserializationError::NestingTooDeep { offset, .. } => *offset,
        }
    }
}

/// A structural fault: the token at `offset` could not be decoded.
///
/// These propagate to the nearest boundary, which is either the orchestrator
/// (rendering a `<ParseError>` document) or the recovery loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Failed to decode {} at offset {offset}: {source}", token_label(.token_type))]
pub struct ParseError {
    pub offset: u64,
    pub token_type: Option<u8>,
    #[source]
    pub source: DeserializationError,
}

fn token_label(token_type: &Option<u8>) -> String {
    match *token_type {
        Some(t) => format!("token `{}`", token_type_name(t)),
        None => "token".to_owned(),
    }
}

impl ParseError {
    pub fn new(offset: u64, token_type: Option<u8>, source: DeserializationError) -> Self {
        ParseError {
            offset,
            token_type,
            source,
        }
    }

    /// The underlying failure, without the offset/token prefix.
    pub fn message(&self) -> String {
        self.source.to_string()
    }

    /// Like [`ParseError::message`], minus the `Offset N:` lead-in when `N` is the
    /// offset of the failing token itself.
    pub fn detail(&self) -> String {
        let message = self.message();
        if self.source.offset() != self.offset {
            return message;
        }

        let prefix = format!("Offset {}: ", self.offset);
        match message.strip_prefix(&prefix) {
            Some(rest) => rest.to_owned(),
            None => message,
        }
    }

    /// The catalog name of the token that failed, or an empty string if the
    /// failure happened before a discriminator could be read.
    pub fn token_name(&self) -> String {
        self.token_type
            .map(|t| token_type_name(t).into_owned())
            .unwrap_or_default()
    }
}

/// Errors raised while rendering an already decoded token tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("maximum render nesting depth of {limit} exceeded while rendering {what}")]
    NestingTooDeep { limit: usize, what: String },
}
