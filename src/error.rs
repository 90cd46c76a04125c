//! Error types for a sync invocation.
//!
//! Every failure inside an invocation is a [`SyncError`]. The invocation
//! boundary ([`crate::invoke`]) turns any of them into the `{ "error": ... }`
//! response, so the runtime keeps the previous cursor and retries the same
//! window on its next call.

use thiserror::Error;

/// Errors that can occur while running a connector invocation.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No API credential was supplied to the invocation.
    #[error("{env_var} not found in environment, can't fetch data")]
    MissingCredential { env_var: String },

    /// A request kept failing until its retry budget ran out.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    FetchExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    /// The HTTP client could not be built or a request could not be sent.
    #[error("HTTP transport error: {0}")]
    Transport(String),

    /// A successful response carried a body we could not read.
    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// The source reported more results than it delivered.
    #[error("source returned an empty page at offset {offset} with {retrieved} of {total} results retrieved")]
    EmptyPage {
        offset: u64,
        retrieved: u64,
        total: u64,
    },

    /// The persisted cursor is not a timestamp we understand.
    #[error("invalid cursor '{0}': expected YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD")]
    InvalidCursor(String),

    /// Date arithmetic on a window left chrono's representable range.
    #[error("window out of range: {days} days from {from}")]
    WindowOutOfRange { from: String, days: i64 },

    /// A record lacks a field the identity policy needs.
    #[error("record is missing primary-key field '{field}'")]
    MissingKeyField { field: String },
}

impl SyncError {
    /// Whether this error is a configuration problem the runtime should
    /// treat as a no-op rather than a failed fetch.
    pub fn is_config(&self) -> bool {
        matches!(self, SyncError::MissingCredential { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
