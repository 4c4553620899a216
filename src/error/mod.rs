//! Error types for the Cineverse client layer.

pub mod kind;

pub use kind::{ErrorKind, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all client-layer operations.
#[derive(Error, Debug)]
pub enum CineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Client error (status {status}): {detail}")]
    Client { status: u16, detail: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<CineError> },

    #[error("Backend not ready after {0}ms")]
    BackendTimeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CineError {
    /// Build a 4xx error from a response body, pulling out the server's `detail`.
    pub fn client(status: u16, body: &str) -> Self {
        Self::Client {
            status,
            detail: extract_detail(body).unwrap_or_else(|| body.trim().to_string()),
        }
    }

    /// Build a 5xx error from a response body.
    pub fn server(status: u16, body: &str) -> Self {
        Self::Server {
            status,
            message: extract_detail(body).unwrap_or_else(|| body.trim().to_string()),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Server { .. } => ErrorKind::Transient,
            Self::Client { .. } => ErrorKind::ClientError,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Self::BackendTimeout(_) => ErrorKind::TimeoutError,
            Self::Configuration(_) | Self::InvalidArgument(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the executor may retry after this error.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Suggest what the caller (usually the UI) should offer the user.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.kind() {
            ErrorKind::Transient | ErrorKind::RetriesExhausted => RecoverySuggestion::RetryLater,
            ErrorKind::ClientError => RecoverySuggestion::FixRequest,
            ErrorKind::ParseError => RecoverySuggestion::ReportBug,
            ErrorKind::TimeoutError => RecoverySuggestion::OfferManualRetry,
            ErrorKind::Configuration => RecoverySuggestion::CheckConfiguration,
        }
    }
}

impl From<reqwest::Error> for CineError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(0)
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for CineError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

/// FastAPI reports errors as `{"detail": "..."}`, or a list of validation
/// errors each carrying a `msg`.
fn extract_detail(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<String> = items
                .iter()
                .map(|item| {
                    item.get("msg")
                        .and_then(|m| m.as_str())
                        .map(ToString::to_string)
                        .unwrap_or_else(|| item.to_string())
                })
                .collect();
            Some(messages.join("; "))
        }
        other => Some(other.to_string()),
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CineError>;
