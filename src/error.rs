//! Error types for the alert relay.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level relay errors. Every variant is reported to the caller as the
/// same flat failure; [`ErrorKind`] keeps the distinction for logging.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Secret retrieval error: {0}")]
    Secret(#[from] SecretError),

    #[error(
        "Could not find a Synapse user id in the notification subject: {}",
        .subject.as_deref().unwrap_or("<none>")
    )]
    UnparseableSubject { subject: Option<String> },

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Malformed event: {0}")]
    Event(String),
}

impl RelayError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Secret(_) => ErrorKind::SecretRetrieval,
            Self::UnparseableSubject { .. } => ErrorKind::UnparseableSubject,
            Self::Messaging(_) => ErrorKind::Messaging,
            Self::Event(_) => ErrorKind::MalformedEvent,
        }
    }
}

/// Failure categories, used as a structured logging field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    SecretRetrieval,
    UnparseableSubject,
    Messaging,
    MalformedEvent,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::SecretRetrieval => write!(f, "secret_retrieval"),
            Self::UnparseableSubject => write!(f, "unparseable_subject"),
            Self::Messaging => write!(f, "messaging"),
            Self::MalformedEvent => write!(f, "malformed_event"),
        }
    }
}

/// Configuration loading and environment errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {message}")]
    ParseFailed { path: PathBuf, message: String },

    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: String, message: String },

    #[error("Environment variable '{name}' is not set")]
    MissingVariable { name: String },

    #[error("Environment variable '{name}' is empty")]
    EmptyVariable { name: String },
}

/// Secret store errors.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Failed to retrieve parameter '{key}': {code}")]
    RetrievalFailed { key: String, code: String },

    #[error("Secret store response for '{key}' was malformed: {message}")]
    MalformedResponse { key: String, message: String },

    #[error("HTTP request to secret store failed: {0}")]
    HttpFailed(#[from] reqwest::Error),
}

/// Messaging API errors.
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Login failed with HTTP {status}: {body}")]
    LoginFailed { status: u16, body: String },

    #[error("Not logged in to the messaging API")]
    NotAuthenticated,

    #[error("Message body upload failed with HTTP {status}: {body}")]
    UploadFailed { status: u16, body: String },

    #[error("Send message failed with HTTP {status}: {body}")]
    SendFailed { status: u16, body: String },

    #[error("Failed to prepare cache directory '{path}': {source}")]
    CacheDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    HttpFailed(#[from] reqwest::Error),
}

/// Function-host runtime API errors.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Environment variable 'AWS_LAMBDA_RUNTIME_API' is not set")]
    MissingEndpoint,

    #[error("Runtime API response is missing the request id header")]
    MissingRequestId,

    #[error("Runtime API returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("HTTP request to runtime API failed: {0}")]
    HttpFailed(#[from] reqwest::Error),
}
