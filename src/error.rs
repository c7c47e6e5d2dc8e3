//! Error types shared by the HTTP client, both caches and the server route.

use std::any::Any;
use std::fmt;

/// Result type for query-kit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for query-kit.
///
/// `Error` is `Clone` because a single fetch outcome is handed to every
/// waiter that coalesced onto it.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Upstream answered with a non-2xx status.
    ///
    /// Propagated to the caller as-is. Nothing in the crate retries.
    Http {
        /// HTTP status code returned by the upstream API
        status: u16,
        /// Status reason or response body excerpt
        message: String,
    },

    /// The request never produced a usable response.
    ///
    /// Common causes:
    /// - Connection refused or DNS failure
    /// - Response body was not the expected JSON shape
    /// - Client timeout (only when `http.timeout_secs` is configured)
    Transport(String),

    /// Serialization failed when writing a server-cache payload.
    SerializationError(String),

    /// Deserialization failed when reading a server-cache payload.
    ///
    /// **Recovery:** the entry is dropped and reloaded from upstream.
    DeserializationError(String),

    /// Invalid cache entry: corrupted envelope or bad magic.
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and cached payload.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// Caller-side misuse, e.g. one query key registered with two data types.
    ValidationError(String),

    /// Invalid or unreadable configuration.
    ConfigError(String),

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// HTTP status carried by this error, when there is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Turn the payload of a panicked fetch or load task into an error.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Error::Other(format!("task panicked: {}", message))
    }

    /// Whether the cached envelope should be discarded rather than served.
    pub fn is_corrupt_entry(&self) -> bool {
        matches!(
            self,
            Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http { status, message } => write!(f, "HTTP {}: {}", status, message),
            Error::Transport(msg) => write!(f, "Transport error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::Transport(e.to_string())
        } else if e.is_syntax() || e.is_data() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Error::Http {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => Error::Transport(e.to_string()),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Other(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
