//! # Error Types

use std::path::PathBuf;

/// Errors from tokenloom operations.
///
/// The pipeline itself is total: malformed inputs produce best-effort
/// outputs. Only the load surface and the chat-template handle return
/// errors.
#[derive(Debug, thiserror::Error)]
pub enum LoomError {
    /// The tokenizer document was not found.
    #[error("tokenizer file not found: {path}")]
    MissingFile {
        /// The path that was probed.
        path: PathBuf,
    },

    /// The tokenizer document was rejected by the JSON parser.
    #[error("malformed tokenizer document: {0}")]
    MalformedJson(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error from the chat-template engine.
    #[error("chat template error: {0}")]
    Template(String),
}

/// Result type for tokenloom operations.
pub type LoomResult<T> = core::result::Result<T, LoomError>;
