//! Shared test helpers and a scripted mock backend.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use cineverse_client::config::CineConfig;
use cineverse_client::error::{CineError, Result};
use cineverse_client::transport::{OutgoingRequest, RawResponse, Transport};

pub const BASE_URL: &str = "http://backend.test";

/// What the mock backend does for one request.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(u16, String),
    RespondAfter(Duration, u16, String),
    NetworkError(String),
    Hang,
}

impl Step {
    pub fn ok(body: &str) -> Self {
        Self::Respond(200, body.to_string())
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Respond(status, body.to_string())
    }

    pub fn network() -> Self {
        Self::NetworkError("connection refused".to_string())
    }
}

/// A request the mock backend received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: Option<String>,
    pub at: Instant,
}

/// Per-path scripted responses. Steps for a path are consumed in order; the
/// last one repeats. Unscripted paths answer `200 {}`.
#[derive(Default)]
pub struct MockBackend {
    routes: Mutex<HashMap<String, VecDeque<Step>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue steps for a path (no query string).
    pub fn on(&self, path: &str, steps: impl IntoIterator<Item = Step>) {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .extend(steps);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_step(&self, path: &str) -> Step {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(path) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
            Some(steps) if steps.len() == 1 => steps[0].clone(),
            _ => Step::ok("{}"),
        }
    }
}

#[async_trait]
impl Transport for MockBackend {
    async fn send(&self, request: OutgoingRequest) -> Result<RawResponse> {
        let path = path_of(&request.url);
        let step = self.next_step(&path);
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method.to_string(),
            path,
            url: request.url.clone(),
            authorization: request
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
            body: request.body.clone(),
            at: Instant::now(),
        });

        match step {
            Step::Respond(status, body) => {
                tokio::task::yield_now().await;
                Ok(RawResponse::new(status, body))
            }
            Step::RespondAfter(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(RawResponse::new(status, body))
            }
            Step::NetworkError(message) => Err(CineError::Network(message)),
            Step::Hang => std::future::pending().await,
        }
    }
}

fn path_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = without_scheme
        .find('/')
        .map(|i| &without_scheme[i..])
        .unwrap_or("/");
    path.split('?').next().unwrap_or(path).to_string()
}

pub fn test_config() -> CineConfig {
    CineConfig::builder().base_url(BASE_URL).build()
}

/// Let spawned tasks run without moving the paused clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
