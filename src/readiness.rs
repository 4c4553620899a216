//! Backend health classification and the "wait until reachable" gate.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::{join_url, CineConfig, DEFAULT_HEALTH_POLL_INTERVAL, DEFAULT_HEALTH_TIMEOUT};
use crate::error::{CineError, Result};
use crate::transport::{OutgoingRequest, Transport};
use crate::util::timeout::with_timeout;

pub const HEALTH_PATH: &str = "/health";

/// Stand-in deadline when the requested wait overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Health of the backend as seen from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HealthStatus {
    /// Answered with a success status within the timeout.
    Healthy,
    /// Answered, but not with success.
    Unhealthy,
    /// No answer in time: most likely asleep and starting up.
    ColdStart,
}

/// Result of one health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// HTTP status of the answer, if there was one.
    pub http_status: Option<u16>,
    /// Whether the backend finished loading its recommender, when reported.
    pub initialization_complete: Option<bool>,
    pub detail: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    initialization_complete: Option<bool>,
    #[serde(default)]
    detail: Option<String>,
}

/// Where UI bootstrap stands while waiting for the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BootstrapPhase {
    Idle,
    /// `wait_for_backend` is polling: show "server is waking up".
    WakingUp,
    Ready,
    /// Gave up: show "connection failed" with a manual retry.
    ConnectionFailed,
}

/// Issues health checks against `/health`.
pub struct ReadinessProbe {
    transport: Arc<dyn Transport>,
    url: String,
    timeout: Duration,
    poll_interval: Duration,
    phase_tx: watch::Sender<BootstrapPhase>,
}

impl ReadinessProbe {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> Self {
        let (phase_tx, _) = watch::channel(BootstrapPhase::Idle);
        Self {
            transport,
            url: join_url(base_url, HEALTH_PATH),
            timeout: DEFAULT_HEALTH_TIMEOUT,
            poll_interval: DEFAULT_HEALTH_POLL_INTERVAL,
            phase_tx,
        }
    }

    pub fn from_config(config: &CineConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, &config.base_url)
            .with_timeout(config.health_timeout)
            .with_poll_interval(config.health_poll_interval)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Current bootstrap phase.
    pub fn phase(&self) -> BootstrapPhase {
        *self.phase_tx.borrow()
    }

    /// Follow bootstrap phase changes.
    pub fn subscribe(&self) -> watch::Receiver<BootstrapPhase> {
        self.phase_tx.subscribe()
    }

    /// One bounded health check. Never fails: every outcome is a status.
    pub async fn check_health(&self) -> HealthReport {
        let request = OutgoingRequest::get(self.url.as_str());
        let outcome = with_timeout(self.timeout, self.transport.send(request)).await;
        let checked_at = Utc::now();

        let report = match outcome {
            Ok(response) => {
                let body = serde_json::from_str::<HealthBody>(&response.body).ok();
                let status = if response.is_success() {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy
                };
                HealthReport {
                    status,
                    http_status: Some(response.status),
                    initialization_complete: body.as_ref().and_then(|b| b.initialization_complete),
                    detail: body.and_then(|b| b.detail),
                    checked_at,
                }
            }
            Err(error) => HealthReport {
                status: HealthStatus::ColdStart,
                http_status: None,
                initialization_complete: None,
                detail: Some(error.to_string()),
                checked_at,
            },
        };

        tracing::debug!(status = %report.status, "Health check");
        report
    }

    /// Poll until the backend reports healthy or `max_wait` elapses.
    ///
    /// Checks still in flight at the deadline are cut off, so this returns
    /// no later than `max_wait`. A `max_wait` too large to represent (such as
    /// `Duration::MAX`) waits without a practical limit.
    pub async fn wait_for_backend(&self, max_wait: Duration) -> Result<()> {
        let started = Instant::now();
        let deadline = started
            .checked_add(max_wait)
            .unwrap_or_else(|| started + FAR_FUTURE);
        self.phase_tx.send_replace(BootstrapPhase::WakingUp);

        loop {
            match tokio::time::timeout_at(deadline, self.check_health()).await {
                Ok(report) if report.status == HealthStatus::Healthy => {
                    tracing::info!(
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Backend is ready"
                    );
                    self.phase_tx.send_replace(BootstrapPhase::Ready);
                    return Ok(());
                }
                Ok(report) => {
                    tracing::info!(status = %report.status, "Backend not ready yet");
                }
                Err(_) => break,
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep_until((now + self.poll_interval).min(deadline)).await;
            if Instant::now() >= deadline {
                break;
            }
        }

        tracing::warn!(max_wait_ms = max_wait.as_millis() as u64, "Backend did not become ready");
        self.phase_tx.send_replace(BootstrapPhase::ConnectionFailed);
        Err(CineError::BackendTimeout(
            u64::try_from(max_wait.as_millis()).unwrap_or(u64::MAX),
        ))
    }
}
