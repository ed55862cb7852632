use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Why a single HTTP attempt did not succeed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl TransportError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Http(err) => err.status(),
            TransportError::Status { status, .. } => Some(*status),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Credential file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Failed to read credential file {}: {reason}", path.display())]
    ConfigRead { path: PathBuf, reason: String },

    #[error("Failed to write credential file {}: {reason}", path.display())]
    ConfigWrite { path: PathBuf, reason: String },

    #[error("The configured authCode {0:?} doesn't match the expected pattern (xxx-xxx)")]
    InvalidAuthCodeFormat(String),

    #[error("AuthCode {0} not found, please check your config")]
    AuthCodeNotFound(String),

    #[error("Registration failed: {0}")]
    Registration(#[source] Box<Error>),

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponseShape {
        endpoint: String,
        reason: String,
        payload: String,
    },

    #[error("Access token was rejected while requesting {path}")]
    Unauthorized { path: String },

    #[error("Access token is missing")]
    MissingAccessToken,

    #[error("Request to {path} failed after {attempts} attempt(s): {source}")]
    RequestFailure {
        path: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Invalid machine id {0:?}")]
    InvalidMachineId(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl Error {
    /// True for errors caused by the backend rejecting (or us lacking) a token.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Unauthorized { .. } | Error::MissingAccessToken)
    }

    /// HTTP status of the last failed attempt, if the failure came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::RequestFailure { source, .. } => source.status(),
            Error::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Error::Registration(inner) => inner.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
