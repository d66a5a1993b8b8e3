//! Error types for Tweetcast

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TweetcastError>;

#[derive(Error, Debug)]
pub enum TweetcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid upload state: {0}")]
    InvalidState(String),
}

impl TweetcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TweetcastError::InvalidInput(_) => 3,
            TweetcastError::Config(_) => 2,
            TweetcastError::Platform(PlatformError::Authentication(_)) => 2,
            TweetcastError::Platform(_) => 1,
            TweetcastError::Io(_) => 1,
            TweetcastError::InvalidState(_) => 1,
        }
    }

    /// HTTP status an inbound adapter should answer with
    ///
    /// Only client mistakes are 400-class; everything that went wrong
    /// downstream is reported as a 500.
    pub fn http_status(&self) -> u16 {
        match self {
            TweetcastError::InvalidInput(_) => 400,
            _ => 500,
        }
    }

    /// Whether the top-level retry loop should restart the upload
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TweetcastError::Platform(PlatformError::RateLimit { .. }))
    }

    /// Server-supplied wait hint attached to a rate-limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TweetcastError::Platform(PlatformError::RateLimit { retry_after, .. }) => *retry_after,
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Missing required credential: {0}")]
    MissingCredential(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Media processing failed: {0}")]
    Processing(String),

    #[error("Media processing timed out after {attempts} status checks ({elapsed:?})")]
    ProcessingTimeout { attempts: u32, elapsed: Duration },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl PlatformError {
    pub fn rate_limit(message: impl Into<String>) -> Self {
        PlatformError::RateLimit {
            message: message.into(),
            retry_after: None,
        }
    }
}
