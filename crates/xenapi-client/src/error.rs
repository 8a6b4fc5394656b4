//! XenAPI client error types.

use std::fmt;

/// Unified error type for all XenAPI client operations.
#[derive(Debug)]
pub enum XenError {
    /// Configuration source unreadable, malformed, or missing required fields
    Config(String),
    /// Login rejected by the server, or no credentials available
    Auth(String),
    /// Call that needs a session was made without one
    NotLoggedIn,
    /// Round-trip completed but the server reported failure
    Api(String),
    /// Call name matched no recognized operation
    UnsupportedMethod(String),
    /// Network / HTTP error
    Network(String),
    /// Malformed XML-RPC body or unexpected response shape
    Parse(String),
}

impl fmt::Display for XenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            Self::NotLoggedIn => write!(f, "not logged in"),
            Self::Api(msg) => write!(f, "XenAPI error: {}", msg),
            Self::UnsupportedMethod(name) => write!(f, "Unsupported XenAPI method '{}'", name),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for XenError {}

impl From<reqwest::Error> for XenError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            XenError::Network(format!("Request timed out: {}", e))
        } else if e.is_connect() {
            XenError::Network(format!("Connection failed: {}", e))
        } else {
            XenError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for XenError {
    fn from(e: serde_json::Error) -> Self {
        XenError::Parse(e.to_string())
    }
}

impl From<url::ParseError> for XenError {
    fn from(e: url::ParseError) -> Self {
        XenError::Config(format!("Invalid URI: {}", e))
    }
}

/// Convenience Result alias.
pub type XenResult<T> = Result<T, XenError>;

/// Convert XenError to a String for embedding callers.
impl From<XenError> for String {
    fn from(e: XenError) -> Self {
        e.to_string()
    }
}
