//! Request execution: per-attempt timeouts, response classification and
//! retry of transient failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderValue;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{join_url, CineConfig, DEFAULT_FIRST_ATTEMPT_TIMEOUT, DEFAULT_RETRY_ATTEMPT_TIMEOUT};
use crate::error::{CineError, Result};
use crate::request::RequestDescriptor;
use crate::transport::{json_headers, OutgoingRequest, RawResponse, Transport, REQUEST_ID_HEADER};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

/// Timeout for each attempt of one logical request.
///
/// The first call after the backend went to sleep may take tens of seconds,
/// so it gets the long budget; once an attempt has failed, later ones use
/// the short one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTimeouts {
    pub first_attempt: Duration,
    pub retry_attempt: Duration,
}

impl Default for AttemptTimeouts {
    fn default() -> Self {
        Self {
            first_attempt: DEFAULT_FIRST_ATTEMPT_TIMEOUT,
            retry_attempt: DEFAULT_RETRY_ATTEMPT_TIMEOUT,
        }
    }
}

impl AttemptTimeouts {
    /// Timeout for a 1-based attempt number.
    pub fn for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            self.first_attempt
        } else {
            self.retry_attempt
        }
    }
}

/// Issues logical requests against the backend.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    base_url: String,
    policy: RetryPolicy,
    timeouts: AttemptTimeouts,
    backend_ready: AtomicBool,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        policy: RetryPolicy,
        timeouts: AttemptTimeouts,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
            timeouts,
            backend_ready: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &CineConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(
            transport,
            config.base_url.clone(),
            config.retry_policy(),
            config.attempt_timeouts(),
        )
    }

    /// Attempt budget used by [`RequestExecutor::execute_default`].
    pub fn retry_budget(&self) -> u32 {
        self.policy.max_attempts
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Set after the first successful response. Informational only.
    pub fn backend_ready(&self) -> bool {
        self.backend_ready.load(Ordering::Acquire)
    }

    /// Execute with the configured retry budget.
    pub async fn execute_default(&self, request: &RequestDescriptor) -> Result<Value> {
        self.execute(request, self.policy.max_attempts).await
    }

    /// Execute one logical request, making at most `retry_budget` attempts.
    pub async fn execute(&self, request: &RequestDescriptor, retry_budget: u32) -> Result<Value> {
        request.validate()?;

        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!(
            "backend_request",
            request_id = %request_id,
            method = %request.method(),
            path = request.path(),
        );

        let policy = self.policy.clone().with_max_attempts(retry_budget);
        async {
            let outgoing = self.prepare(request, request_id)?;
            let payload = policy
                .execute(|attempt| {
                    let outgoing = outgoing.clone();
                    let timeout = self.timeouts.for_attempt(attempt);
                    async move {
                        tracing::debug!(attempt, timeout_ms = timeout.as_millis() as u64, "Sending request");
                        let response = with_timeout(timeout, self.transport.send(outgoing)).await?;
                        classify_response(response)
                    }
                })
                .await?;

            if !self.backend_ready.swap(true, Ordering::AcqRel) {
                tracing::info!("Backend answered; marking it ready");
            }
            Ok(payload)
        }
        .instrument(span)
        .await
    }

    fn prepare(&self, request: &RequestDescriptor, request_id: Uuid) -> Result<OutgoingRequest> {
        let mut headers = json_headers(request.bearer_token())?;
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            headers.insert(REQUEST_ID_HEADER, value);
        }

        let body = if request.is_read_only() {
            None
        } else {
            request.body().map(|body| body.to_string())
        };

        Ok(OutgoingRequest {
            method: request.method().clone(),
            url: join_url(&self.base_url, &request.path_and_query()),
            headers,
            body,
        })
    }
}

/// Map a raw response onto the error taxonomy.
///
/// 2xx bodies must be JSON (an empty body reads as `null`); 4xx is a client
/// error carrying the server's detail; 5xx is transient.
pub fn classify_response(response: RawResponse) -> Result<Value> {
    match response.status {
        200..=299 => {
            if response.body.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&response.body).map_err(|e| {
                CineError::Parse(format!(
                    "response body is not valid JSON (status {}): {e}",
                    response.status
                ))
            })
        }
        400..=499 => Err(CineError::client(response.status, &response.body)),
        500..=599 => Err(CineError::server(response.status, &response.body)),
        status => Err(CineError::Client {
            status,
            detail: format!("unexpected status {status}"),
        }),
    }
}
