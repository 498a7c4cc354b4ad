//! Error types for the document chat client.
//!
//! None of these are fatal to a session: extraction and render failures become
//! visible session state, query failures degrade to a fallback reply, and a
//! superseded upload is only ever logged.

use thiserror::Error;

/// Raised when a newer file selection cancels an upload sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Upload of '{file}' was superseded by a newer selection")]
pub struct UploadInterrupted {
    pub file: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Backend unreachable: {0}")]
    Transport(String),

    #[error("Backend rejected upload with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid upload response: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Cannot decode document: {0}")]
    Open(String),

    #[error("Cannot render page {page}: {message}")]
    Page { page: u32, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Backend unreachable: {0}")]
    Transport(String),

    #[error("Backend rejected query with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid query response: {0}")]
    Decode(String),
}

/// Reasons a file selection is refused before any state changes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("'{0}' is not a PDF document")]
    NotPdf(String),

    #[error("'{0}' is empty")]
    EmptyFile(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid backend URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
