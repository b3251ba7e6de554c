//! Error types shared across the client.

use crate::translate::TranslationError;
use crate::transport::TransportError;

/// Errors surfaced by [`BardClient`](crate::client::BardClient) and the decoder.
#[derive(Debug, thiserror::Error)]
pub enum BardError {
    /// Rejected before any I/O: empty question, malformed auth token.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("anti-forgery token not found: {0}")]
    TokenExtractionFailed(String),

    /// A mandatory part of the answer payload could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A citation span does not fit inside the answer text.
    #[error("invalid span {start}..{end} for answer of {len} chars")]
    InvalidSpan { start: i64, end: i64, len: usize },

    #[error("translation error: {0}")]
    Translation(#[from] TranslationError),
}

pub type BardResult<T> = Result<T, BardError>;
