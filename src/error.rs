//! Crate-wide error type.
//!
//! Every failure path in dialexa ends in one of these variants. None of them
//! is fatal: the CLI renders the message and returns to the shell with a
//! non-zero exit code.

use thiserror::Error;

/// Errors surfaced by the client, the stream decoder and the front ends.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The provider's API key is not configured.
    #[error("{var} is not set. Export it or add `api_key` to the config file.")]
    MissingApiKey { var: String },

    /// A required input was empty after trimming.
    #[error("please enter {what} before continuing")]
    EmptyInput { what: &'static str },

    /// The endpoint answered with a non-2xx status.
    #[error("API error: HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, TLS or body-read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A batched response body could not be parsed.
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Local IO failure (reading stdin or writing output).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller cancelled the operation.
    #[error("cancelled")]
    Cancelled,
}

impl ChatError {
    /// True for the errors that block an action before any request is sent.
    pub fn is_precondition(&self) -> bool {
        matches!(self, ChatError::MissingApiKey { .. } | ChatError::EmptyInput { .. })
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
