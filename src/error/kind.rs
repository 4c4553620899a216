//! Failure classification and recovery hints.

use serde::{Deserialize, Serialize};

/// Broad failure class that decides the retry and propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network failure, attempt timeout or 5xx. Retried by the executor.
    Transient,
    /// 4xx answer. Surfaced immediately with the server's detail message.
    ClientError,
    /// Response body is not valid for the expected shape.
    ParseError,
    /// Transient failures consumed the whole retry budget.
    RetriesExhausted,
    /// `wait_for_backend` gave up.
    TimeoutError,
    /// Bad configuration or invalid call.
    Configuration,
}

/// Suggested user-facing recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryLater,
    FixRequest,
    ReportBug,
    OfferManualRetry,
    CheckConfiguration,
}
