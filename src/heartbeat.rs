//! Keep-alive pings that stop the backend from idling out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{join_url, CineConfig, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_RETRY_ATTEMPT_TIMEOUT};
use crate::transport::{OutgoingRequest, Transport};
use crate::util::background::{shutdown_requested, BackgroundTask};
use crate::util::timeout::with_timeout;

pub const KEEP_ALIVE_PATH: &str = "/keep-alive";

/// Visibility of the host page or window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Snapshot returned by [`HeartbeatScheduler::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeartbeatStatus {
    pub is_active: bool,
    pub interval_ms: u64,
    pub pings_sent: u64,
    pub failures: u64,
    pub last_success_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct PingStats {
    pings_sent: AtomicU64,
    failures: AtomicU64,
    last_success_at: Mutex<Option<DateTime<Utc>>>,
}

struct HeartbeatState {
    task: Option<BackgroundTask>,
}

/// Pings the keep-alive endpoint immediately on start and then on a fixed
/// interval until stopped.
///
/// Ping failures are logged and counted but never surface to callers and
/// never stop the schedule.
pub struct HeartbeatScheduler {
    transport: Arc<dyn Transport>,
    url: String,
    interval: Duration,
    ping_timeout: Duration,
    state: Mutex<HeartbeatState>,
    stats: Arc<PingStats>,
}

impl HeartbeatScheduler {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> Self {
        Self {
            transport,
            url: join_url(base_url, KEEP_ALIVE_PATH),
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            ping_timeout: DEFAULT_RETRY_ATTEMPT_TIMEOUT,
            state: Mutex::new(HeartbeatState { task: None }),
            stats: Arc::new(PingStats::default()),
        }
    }

    pub fn from_config(config: &CineConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, &config.base_url)
            .with_interval(config.heartbeat_interval)
            .with_ping_timeout(config.retry_attempt_timeout)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Start pinging. Returns `false` if the scheduler was already active
    /// or its interval is zero.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        if self.interval.is_zero() {
            tracing::error!("Heartbeat interval is zero; not starting");
            return false;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.task.as_ref().is_some_and(BackgroundTask::is_running) {
            return false;
        }

        let transport = self.transport.clone();
        let url = self.url.clone();
        let interval = self.interval;
        let ping_timeout = self.ping_timeout;
        let stats = self.stats.clone();

        state.task = Some(BackgroundTask::spawn(
            "heartbeat",
            move |mut shutdown_rx| async move {
                let mut ticker = time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        changed = shutdown_rx.changed() => {
                            if shutdown_requested(changed, &shutdown_rx) {
                                break;
                            }
                        }
                        _ = ticker.tick() => {
                            tokio::select! {
                                _ = ping_once(transport.as_ref(), &url, ping_timeout, &stats) => {}
                                changed = shutdown_rx.changed() => {
                                    if shutdown_requested(changed, &shutdown_rx) {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
            },
        ));
        tracing::info!(interval_ms = interval.as_millis() as u64, "Heartbeat started");
        true
    }

    /// Stop pinging and wait for the background task to finish. Returns
    /// `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let task = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .task
            .take();
        match task {
            Some(task) => {
                let was_running = task.is_running();
                task.shutdown().await;
                tracing::info!("Heartbeat stopped");
                was_running
            }
            None => false,
        }
    }

    /// Hidden pages keep the heartbeat going, since other tabs may rely on
    /// the same backend; becoming visible restarts it if it had stopped.
    pub fn on_visibility_change(&self, visibility: Visibility) {
        match visibility {
            Visibility::Hidden => tracing::debug!("Page hidden; heartbeat keeps running"),
            Visibility::Visible => {
                if self.start() {
                    tracing::debug!("Page visible; heartbeat restarted");
                }
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .task
            .as_ref()
            .is_some_and(BackgroundTask::is_running)
    }

    pub fn status(&self) -> HeartbeatStatus {
        HeartbeatStatus {
            is_active: self.is_active(),
            interval_ms: self.interval.as_millis() as u64,
            pings_sent: self.stats.pings_sent.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            last_success_at: *self
                .stats
                .last_success_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Any HTTP answer counts as success; only network errors and timeouts fail.
async fn ping_once(transport: &dyn Transport, url: &str, timeout: Duration, stats: &PingStats) {
    stats.pings_sent.fetch_add(1, Ordering::Relaxed);
    match with_timeout(timeout, transport.send(OutgoingRequest::get(url))).await {
        Ok(response) => {
            tracing::debug!(status = response.status, "Heartbeat ping answered");
            *stats
                .last_success_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        }
        Err(error) => {
            stats.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %error, "Heartbeat ping failed");
        }
    }
}
