//! Crate-level error types.
//!
//! Every message a user can see is produced by a `Display` impl here, so no
//! raw transport or parser detail ever reaches the transcript.

use thiserror::Error;

/// Why a piece of free text was refused by the sanitizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{subject} cannot be empty")]
    Empty { subject: &'static str },
    #[error("{subject} is too long (maximum {max} characters)")]
    TooLong { subject: &'static str, max: usize },
    #[error("{subject} must be at least {min} characters long")]
    TooShort { subject: &'static str, min: usize },
    #[error("Name contains invalid characters. Please use only letters, numbers, spaces, and common punctuation.")]
    InvalidCharacters,
    #[error("{0}")]
    Unsafe(&'static str),
}

impl ValidationError {
    /// Short machine-friendly tag for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::Empty { .. } => "empty",
            ValidationError::TooLong { .. } => "too long",
            ValidationError::TooShort { .. } => "too short",
            ValidationError::InvalidCharacters => "invalid characters",
            ValidationError::Unsafe(_) => "unsafe content",
        }
    }
}

/// Failures talking to the authentication endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The server answered with a non-2xx status.
    #[error("{}", detail.as_deref().unwrap_or("Registration failed"))]
    Rejected { status: u16, detail: Option<String> },
    /// The request never produced a response.
    #[error("could not reach the authentication service: {0}")]
    Transport(String),
    /// A 2xx response whose body did not match the expected shape.
    #[error("unexpected response from the authentication service: {0}")]
    Decode(String),
}

/// Top-level error for the navigator library.
#[derive(Debug, Error)]
pub enum NavError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("no stream activity for {0} seconds")]
    StreamTimeout(u64),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for NavError {
    fn from(e: reqwest::Error) -> Self {
        NavError::Transport(e.to_string())
    }
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}
