//! Error types for dpres-access-client
//!
//! This module provides the error taxonomy shared by both service clients:
//! - Validation errors raised before any network traffic
//! - Illegal-state errors for operations invoked out of order
//! - Remote "not found" signals, kept distinct from other HTTP failures
//! - Generic request failures carrying the response body for presentation

use reqwest::StatusCode;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for dpres-access-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dpres-access-client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "contract_id")
        key: Option<String>,
    },

    /// Input rejected before any request was sent
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Operation invoked in a state that forbids it
    #[error("cannot {operation}: {state}")]
    IllegalState {
        /// The operation that was attempted (e.g., "download", "delete")
        operation: &'static str,
        /// Description of the state that prevents the operation
        state: String,
    },

    /// The service answered 404 for the requested resource
    #[error("not found: {url}")]
    NotFound {
        /// URL that produced the 404 response
        url: String,
    },

    /// The service answered with a non-2xx status other than 404
    #[error("request to {url} failed with status {status}")]
    Api {
        /// HTTP status returned by the service
        status: StatusCode,
        /// URL of the failed request
        url: String,
        /// Raw response body, used to extract the service's error message
        body: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The service response did not follow the expected protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A caller-provided polling deadline elapsed before completion
    #[error("polling gave up after {waited:?}")]
    PollTimeout {
        /// Total time spent polling
        waited: Duration,
    },
}

/// Input validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Archive format is not one of the supported formats
    #[error("invalid archive format '{0}': only 'zip' and 'tar' are accepted")]
    InvalidArchiveFormat(String),

    /// Report file type is not one of the supported types
    #[error("invalid file type '{0}': only 'xml' and 'html' file formats are accepted")]
    InvalidReportType(String),

    /// Upload source does not exist
    #[error("file {0} does not exist")]
    FileNotFound(PathBuf),

    /// Upload source has zero length
    #[error("file {0} is empty")]
    EmptyFile(PathBuf),

    /// Upload source has a suffix the service does not accept
    #[error("file {path} format not supported: expected one of {expected}")]
    UnsupportedSuffix {
        /// The rejected file
        path: PathBuf,
        /// Human-readable list of accepted suffixes
        expected: String,
    },

    /// Chunk size of zero would never advance the upload
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Error payload returned by the service on failed requests
///
/// ```json
/// { "status": "fail", "data": { "message": "Transfer not found" } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    /// Envelope status discriminator, normally "fail" or "error"
    pub status: String,
    /// Error details
    pub data: ErrorPayloadData,
}

/// The `data` part of an [`ErrorPayload`]
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayloadData {
    /// Human-readable error message
    pub message: String,
}

impl Error {
    /// Returns true if the service reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Get the HTTP status code for errors that came from a response
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            Error::Api { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Message suitable for showing to a user
    ///
    /// For API errors whose body is a JSON [`ErrorPayload`] the service's own
    /// message is used; otherwise the raw body text, and finally the error's
    /// display form.
    pub fn api_message(&self) -> String {
        match self {
            Error::Api { status, body, .. } => {
                match serde_json::from_str::<ErrorPayload>(body) {
                    Ok(payload) => payload.data.message,
                    Err(_) if !body.trim().is_empty() => body.trim().to_string(),
                    Err(_) => format!("request failed with status {}", status),
                }
            }
            other => other.to_string(),
        }
    }
}
