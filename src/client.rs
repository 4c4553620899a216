//! The client layer: cache-first reads, invalidating mutations, and the
//! background heartbeat and sweeper lifecycle.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use serde_json::Value;

use crate::cache::{CacheKey, CachePolicy, CacheStore};
use crate::config::CineConfig;
use crate::error::{CineError, Result};
use crate::executor::RequestExecutor;
use crate::heartbeat::HeartbeatScheduler;
use crate::invalidation::{self, MutationKind};
use crate::readiness::ReadinessProbe;
use crate::request::RequestDescriptor;
use crate::transport::{HttpTransport, Transport};
use crate::util::background::BackgroundTask;

/// One instance of the resilience and caching layer.
///
/// Lifecycle: [`CineClient::new`] builds the components, [`CineClient::start`]
/// launches the heartbeat and the cache sweeper, [`CineClient::destroy`]
/// stops both. The client is meant to be created once and shared (it is
/// `Send + Sync`; wrap it in an `Arc`), not tied to any single view.
pub struct CineClient {
    config: CineConfig,
    executor: RequestExecutor,
    cache: CacheStore,
    heartbeat: HeartbeatScheduler,
    readiness: ReadinessProbe,
    sweeper: Mutex<Option<BackgroundTask>>,
    credential: RwLock<Credential>,
}

/// The bearer token plus a counter bumped on every change, so a read that
/// started under an older identity can tell its result is no longer valid.
struct Credential {
    token: Option<String>,
    generation: u64,
}

impl CineClient {
    /// Build a client that talks HTTP through reqwest.
    pub fn new(config: CineConfig) -> Result<Self> {
        config.validate()?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
        Self::with_transport(config, transport)
    }

    /// Build a client over any transport. The config is validated first.
    pub fn with_transport(config: CineConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            executor: RequestExecutor::from_config(&config, transport.clone()),
            cache: CacheStore::new(config.cache_ttl),
            heartbeat: HeartbeatScheduler::from_config(&config, transport.clone()),
            readiness: ReadinessProbe::from_config(&config, transport),
            sweeper: Mutex::new(None),
            credential: RwLock::new(Credential {
                token: config.api_token.clone(),
                generation: 0,
            }),
            config,
        })
    }

    /// Start the heartbeat and the periodic cache sweep. Idempotent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        self.heartbeat.start();
        let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if !sweeper.as_ref().is_some_and(BackgroundTask::is_running) {
            *sweeper = Some(self.cache.spawn_sweeper(self.config.sweep_interval)?);
        }
        Ok(())
    }

    /// Stop background work and drop every cached entry.
    pub async fn destroy(&self) {
        self.heartbeat.stop().await;
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }
        self.cache.clear();
        tracing::info!("Client layer destroyed");
    }

    pub fn config(&self) -> &CineConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn heartbeat(&self) -> &HeartbeatScheduler {
        &self.heartbeat
    }

    pub fn readiness(&self) -> &ReadinessProbe {
        &self.readiness
    }

    /// Replace the bearer credential. Cached responses may be user-specific,
    /// so a change of identity clears the cache.
    ///
    /// Reads still in flight under the previous credential finish, but their
    /// results are not cached.
    pub fn set_token(&self, token: Option<String>) {
        let mut credential = self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if credential.token != token {
            credential.token = token;
            credential.generation += 1;
            self.cache.clear();
            tracing::debug!(generation = credential.generation, "Credential changed; cache cleared");
        }
    }

    pub fn has_token(&self) -> bool {
        self.credential().token.is_some()
    }

    /// Cache-first read using the policy derived from the request.
    pub async fn read(&self, request: RequestDescriptor) -> Result<Value> {
        let policy = CachePolicy::for_request(&request, self.config.current_user_ttl);
        self.read_with_policy(request, policy).await
    }

    /// Cache-first read with an explicit policy.
    pub async fn read_with_policy(
        &self,
        request: RequestDescriptor,
        policy: CachePolicy,
    ) -> Result<Value> {
        if !request.is_read_only() {
            return Err(CineError::InvalidArgument(format!(
                "{} {} is not a read; use mutate",
                request.method(),
                request.path()
            )));
        }

        let key = CacheKey::for_request(&request);
        if policy != CachePolicy::NoStore {
            if let Some(payload) = self.cache.get(&key) {
                tracing::debug!(key = %key, "Cache hit");
                return Ok(payload);
            }
            tracing::debug!(key = %key, "Cache miss");
        }

        let (request, generation) = self.authorize(request);
        let payload = self.executor.execute_default(&request).await?;

        // Holding the read lock keeps `set_token` from clearing in between.
        let credential = self.credential();
        if credential.generation != generation {
            tracing::debug!(key = %key, "Credential changed during read; not caching");
            return Ok(payload);
        }
        match policy {
            CachePolicy::Default => self.cache.set(key, payload.clone()),
            CachePolicy::Ttl(ttl) => self.cache.set_with_ttl(key, payload.clone(), ttl),
            CachePolicy::NoStore => {}
        }
        drop(credential);
        Ok(payload)
    }

    /// Send a mutation, then purge what it made stale. A failed mutation
    /// leaves the cache untouched.
    pub async fn mutate(&self, request: RequestDescriptor, mutation: MutationKind) -> Result<Value> {
        if request.is_read_only() {
            return Err(CineError::InvalidArgument(format!(
                "{} {} does not mutate; use read",
                request.method(),
                request.path()
            )));
        }

        let (request, _) = self.authorize(request);
        let payload = self.executor.execute_default(&request).await?;
        invalidation::apply(&self.cache, &mutation);
        Ok(payload)
    }

    /// Attach the current credential and report which generation it was.
    fn authorize(&self, request: RequestDescriptor) -> (RequestDescriptor, u64) {
        let credential = self.credential();
        (
            request.with_default_bearer(credential.token.as_deref()),
            credential.generation,
        )
    }

    fn credential(&self) -> RwLockReadGuard<'_, Credential> {
        self.credential.read().unwrap_or_else(PoisonError::into_inner)
    }
}
