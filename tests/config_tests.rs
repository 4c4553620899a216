//! Tests for configuration loading.

use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use pretty_assertions::assert_eq;

use cineverse_client::config::{
    CineConfig, ENV_API_TOKEN, ENV_API_URL, ENV_CACHE_TTL_SECS, ENV_HEARTBEAT_INTERVAL_SECS,
    ENV_RETRY_BUDGET,
};
use cineverse_client::error::CineError;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 5] = [
    ENV_API_URL,
    ENV_API_TOKEN,
    ENV_CACHE_TTL_SECS,
    ENV_RETRY_BUDGET,
    ENV_HEARTBEAT_INTERVAL_SECS,
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clean_env() -> EnvGuard {
    let guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
    guard
}

#[test]
fn env_overrides_apply_on_top_of_defaults() {
    let _lock = env_lock_guard();
    let _env = clean_env();
    std::env::set_var(ENV_API_URL, "https://movies.example.test");
    std::env::set_var(ENV_API_TOKEN, "token-123");
    std::env::set_var(ENV_CACHE_TTL_SECS, "120");
    std::env::set_var(ENV_RETRY_BUDGET, " 5 ");
    std::env::set_var(ENV_HEARTBEAT_INTERVAL_SECS, "600");

    let config = CineConfig::default().with_env_overrides().unwrap();

    assert_eq!(config.base_url, "https://movies.example.test");
    assert_eq!(config.api_token.as_deref(), Some("token-123"));
    assert_eq!(config.cache_ttl, Duration::from_secs(120));
    assert_eq!(config.retry_budget, 5);
    assert_eq!(config.heartbeat_interval, Duration::from_secs(600));
    assert_eq!(config.current_user_ttl, Duration::from_secs(60));
}

#[test]
fn unset_env_leaves_values_alone() {
    let _lock = env_lock_guard();
    let _env = clean_env();

    let base = CineConfig::builder()
        .base_url("https://a.example.test")
        .retry_budget(7)
        .build();
    let config = base.with_env_overrides().unwrap();

    assert_eq!(config.base_url, "https://a.example.test");
    assert_eq!(config.retry_budget, 7);
}

#[test]
fn malformed_env_values_are_configuration_errors() {
    let _lock = env_lock_guard();
    let _env = clean_env();
    std::env::set_var(ENV_RETRY_BUDGET, "three");

    let err = CineConfig::default().with_env_overrides().unwrap_err();

    assert!(matches!(err, CineError::Configuration(_)));
    assert!(err.to_string().contains(ENV_RETRY_BUDGET));
}

#[test]
fn env_url_must_be_http() {
    let _lock = env_lock_guard();
    let _env = clean_env();
    std::env::set_var(ENV_API_URL, "ftp://movies.example.test");

    let err = CineConfig::from_env().unwrap_err();

    assert!(matches!(err, CineError::Configuration(_)));
}

#[test]
fn config_file_is_read_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
base_url = "https://cineverse.example.test"
retry_budget = 4
heartbeat_interval_secs = 300
health_timeout_ms = 1500
"#
    )
    .unwrap();

    let config = CineConfig::from_file(file.path()).unwrap();

    assert_eq!(config.base_url, "https://cineverse.example.test");
    assert_eq!(config.retry_budget, 4);
    assert_eq!(config.heartbeat_interval, Duration::from_secs(300));
    assert_eq!(config.health_timeout, Duration::from_millis(1500));
    assert_eq!(config.endpoint("/health"), "https://cineverse.example.test/health");
}

#[test]
fn missing_config_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = CineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();

    assert!(matches!(err, CineError::Configuration(_)));
}

#[test]
fn derived_policies_follow_the_config() {
    let config = CineConfig::builder()
        .base_url("http://localhost:10000")
        .retry_budget(5)
        .backoff_base(Duration::from_millis(500))
        .first_attempt_timeout(Duration::from_secs(60))
        .build();

    let policy = config.retry_policy();
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.delay_for(2), Duration::from_secs(1));

    let timeouts = config.attempt_timeouts();
    assert_eq!(timeouts.first_attempt, Duration::from_secs(60));
    assert_eq!(timeouts.retry_attempt, Duration::from_secs(30));
}
