//! Error types for the bizscan-core library.

use thiserror::Error;

use crate::models::config::SubmissionMethod;
use crate::review::SessionState;

/// Main error type for the bizscan library.
#[derive(Error, Debug)]
pub enum BizscanError {
    /// Extraction gateway error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Submission error.
    #[error("submission error: {0}")]
    Submission(#[from] SubmissionError),

    /// Review session error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Prefilled link parsing error.
    #[error("link error: {0}")]
    Link(#[from] LinkParseError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by an extraction gateway.
///
/// These carry internal detail for logs. Users only ever see the fixed
/// message attached to the session's `Error` state.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// No API key could be resolved.
    #[error("missing API key (set {0})")]
    MissingApiKey(String),

    /// The HTTP call to the service failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Service { status: u16, body: String },

    /// The service answered, but not with a usable record.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The image could not be prepared for upload.
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),
}

/// Errors raised by the submission adapter.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// The active method has no destination URL.
    #[error("no destination URL configured for {0}")]
    NotConfigured(SubmissionMethod),

    /// The request could not be dispatched (DNS, refused connection, timeout).
    #[error("transfer failed: {0}")]
    Transfer(String),
}

/// Errors raised by the review state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The event is not accepted in the current state.
    #[error("cannot {event} while {state}")]
    InvalidTransition {
        state: SessionState,
        event: &'static str,
    },

    /// Confirm was attempted without a destination for the active method.
    #[error("no destination URL configured for {0}")]
    NotConfigured(SubmissionMethod),
}

/// Errors raised while parsing a prefilled form link.
#[derive(Error, Debug)]
pub enum LinkParseError {
    /// Nothing was provided.
    #[error("link is empty")]
    Empty,

    /// A spreadsheet link was pasted instead of a prefilled form link.
    #[error("this is a spreadsheet link; paste the form's prefilled link instead")]
    SpreadsheetLink,

    /// The link is not a valid URL.
    #[error("invalid link: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type for the bizscan library.
pub type Result<T> = std::result::Result<T, BizscanError>;
