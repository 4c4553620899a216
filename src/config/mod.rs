//! Configuration system (layered: code > env > config file).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use serde::Deserialize;

use crate::error::{CineError, Result};
use crate::executor::AttemptTimeouts;
use crate::util::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:10000";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CURRENT_USER_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_RETRY_BUDGET: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(10);
pub const DEFAULT_FIRST_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_RETRY_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
/// Just under the 15 minute idle-sleep threshold of typical free hosting tiers.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(14 * 60);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub const ENV_API_URL: &str = "CINEVERSE_API_URL";
pub const ENV_API_TOKEN: &str = "CINEVERSE_API_TOKEN";
pub const ENV_CACHE_TTL_SECS: &str = "CINEVERSE_CACHE_TTL_SECS";
pub const ENV_RETRY_BUDGET: &str = "CINEVERSE_RETRY_BUDGET";
pub const ENV_HEARTBEAT_INTERVAL_SECS: &str = "CINEVERSE_HEARTBEAT_INTERVAL_SECS";

/// Settings for one client layer instance.
///
/// ```
/// use cineverse_client::config::CineConfig;
/// use std::time::Duration;
///
/// let config = CineConfig::builder()
///     .base_url("https://api.example.test")
///     .cache_ttl(Duration::from_secs(120))
///     .build();
/// assert_eq!(config.retry_budget, 3);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct CineConfig {
    #[builder(into)]
    pub base_url: String,
    #[builder(into)]
    pub api_token: Option<String>,
    #[builder(default = DEFAULT_CACHE_TTL)]
    pub cache_ttl: Duration,
    #[builder(default = DEFAULT_CURRENT_USER_TTL)]
    pub current_user_ttl: Duration,
    #[builder(default = DEFAULT_SWEEP_INTERVAL)]
    pub sweep_interval: Duration,
    #[builder(default = DEFAULT_RETRY_BUDGET)]
    pub retry_budget: u32,
    #[builder(default = DEFAULT_BACKOFF_BASE)]
    pub backoff_base: Duration,
    #[builder(default = DEFAULT_BACKOFF_CAP)]
    pub backoff_cap: Duration,
    #[builder(default = DEFAULT_FIRST_ATTEMPT_TIMEOUT)]
    pub first_attempt_timeout: Duration,
    #[builder(default = DEFAULT_RETRY_ATTEMPT_TIMEOUT)]
    pub retry_attempt_timeout: Duration,
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL)]
    pub heartbeat_interval: Duration,
    #[builder(default = DEFAULT_HEALTH_TIMEOUT)]
    pub health_timeout: Duration,
    #[builder(default = DEFAULT_HEALTH_POLL_INTERVAL)]
    pub health_poll_interval: Duration,
}

impl Default for CineConfig {
    fn default() -> Self {
        Self::builder().base_url(DEFAULT_BASE_URL).build()
    }
}

/// On-disk shape of `config.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    api_token: Option<String>,
    cache_ttl_secs: Option<u64>,
    current_user_ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    retry_budget: Option<u32>,
    backoff_base_ms: Option<u64>,
    backoff_cap_ms: Option<u64>,
    first_attempt_timeout_secs: Option<u64>,
    retry_attempt_timeout_secs: Option<u64>,
    heartbeat_interval_secs: Option<u64>,
    health_timeout_ms: Option<u64>,
    health_poll_interval_ms: Option<u64>,
}

impl CineConfig {
    /// Defaults overlaid with the values of a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(contents)
            .map_err(|e| CineError::Configuration(format!("invalid config file: {e}")))?;
        let mut config = Self::default();
        config.merge_file(file);
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CineError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Defaults overlaid with `CINEVERSE_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let config = Self::default().with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Full resolution: the default config file if it exists, then env.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let base = match Self::default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Platform config location, e.g. `~/.config/cineverse/config.toml`.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "cineverse")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply environment variable overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            self.base_url = url;
        }
        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(secs) = env_parse::<u64>(ENV_CACHE_TTL_SECS)? {
            self.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(budget) = env_parse::<u32>(ENV_RETRY_BUDGET)? {
            self.retry_budget = budget;
        }
        if let Some(secs) = env_parse::<u64>(ENV_HEARTBEAT_INTERVAL_SECS)? {
            self.heartbeat_interval = Duration::from_secs(secs);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(CineError::Configuration(format!(
                "base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.retry_budget == 0 {
            return Err(CineError::Configuration(
                "retry budget must be at least 1".into(),
            ));
        }
        let durations = [
            ("heartbeat_interval", self.heartbeat_interval),
            ("sweep_interval", self.sweep_interval),
            ("first_attempt_timeout", self.first_attempt_timeout),
            ("retry_attempt_timeout", self.retry_attempt_timeout),
            ("health_timeout", self.health_timeout),
            ("health_poll_interval", self.health_poll_interval),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| value.is_zero()) {
            return Err(CineError::Configuration(format!("{name} must be non-zero")));
        }
        Ok(())
    }

    /// Absolute URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_budget,
            base_delay: self.backoff_base,
            max_delay: self.backoff_cap,
        }
    }

    pub fn attempt_timeouts(&self) -> AttemptTimeouts {
        AttemptTimeouts {
            first_attempt: self.first_attempt_timeout,
            retry_attempt: self.retry_attempt_timeout,
        }
    }

    fn merge_file(&mut self, file: FileConfig) {
        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if file.api_token.is_some() {
            self.api_token = file.api_token;
        }
        let secs = Duration::from_secs;
        let millis = Duration::from_millis;
        if let Some(v) = file.cache_ttl_secs {
            self.cache_ttl = secs(v);
        }
        if let Some(v) = file.current_user_ttl_secs {
            self.current_user_ttl = secs(v);
        }
        if let Some(v) = file.sweep_interval_secs {
            self.sweep_interval = secs(v);
        }
        if let Some(v) = file.retry_budget {
            self.retry_budget = v;
        }
        if let Some(v) = file.backoff_base_ms {
            self.backoff_base = millis(v);
        }
        if let Some(v) = file.backoff_cap_ms {
            self.backoff_cap = millis(v);
        }
        if let Some(v) = file.first_attempt_timeout_secs {
            self.first_attempt_timeout = secs(v);
        }
        if let Some(v) = file.retry_attempt_timeout_secs {
            self.retry_attempt_timeout = secs(v);
        }
        if let Some(v) = file.heartbeat_interval_secs {
            self.heartbeat_interval = secs(v);
        }
        if let Some(v) = file.health_timeout_ms {
            self.health_timeout = millis(v);
        }
        if let Some(v) = file.health_poll_interval_ms {
            self.health_poll_interval = millis(v);
        }
    }
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            CineError::Configuration(format!("{name} has an invalid value: '{raw}'"))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = CineConfig::default();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.current_user_ttl, Duration::from_secs(60));
        assert_eq!(config.sweep_interval, Duration::from_secs(900));
        assert_eq!(config.retry_budget, 3);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(840));
        assert_eq!(config.first_attempt_timeout, Duration::from_secs(90));
        assert_eq!(config.retry_attempt_timeout, Duration::from_secs(30));
        assert_eq!(config.health_timeout, Duration::from_secs(3));
        assert_eq!(config.health_poll_interval, Duration::from_secs(2));
        assert!(config.api_token.is_none());
    }

    #[test]
    fn toml_overrides_only_the_given_fields() {
        let config = CineConfig::from_toml_str(
            r#"
            base_url = "https://movies.example.test/"
            cache_ttl_secs = 30
            backoff_base_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://movies.example.test/");
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.backoff_base, Duration::from_millis(250));
        assert_eq!(config.backoff_cap, DEFAULT_BACKOFF_CAP);
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        let err = CineConfig::from_toml_str("cache_ttl = 30").unwrap_err();
        assert!(matches!(err, CineError::Configuration(_)));
    }

    #[test]
    fn zero_retry_budget_is_rejected() {
        let err = CineConfig::from_toml_str("retry_budget = 0").unwrap_err();
        assert!(err.to_string().contains("retry budget"));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = CineConfig::builder()
            .base_url(DEFAULT_BASE_URL)
            .heartbeat_interval(Duration::ZERO)
            .build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("heartbeat_interval"));

        let err = CineConfig::from_toml_str("health_poll_interval_ms = 0").unwrap_err();
        assert!(err.to_string().contains("health_poll_interval"));
    }

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let config = CineConfig::builder()
            .base_url("https://api.example.test/")
            .build();

        assert_eq!(
            config.endpoint("/movies/42"),
            "https://api.example.test/movies/42"
        );
        assert_eq!(config.endpoint("health"), "https://api.example.test/health");
    }
}
