use std::env;

use serde::{Deserialize, Serialize};

use crate::error::StampedeError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Upper bound on worker threads a single run may grow to.
pub const MAX_WORKERS_LIMIT: usize = 9999;

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `STAMPEDE_PROFILE` env var. When set (e.g. `STAGING`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("STAMPEDE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            run: RunConfig::from_env_profiled(p),
            http: HttpConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Check every section for out-of-range values.
    pub fn validate(&self) -> Result<(), StampedeError> {
        self.run.validate()?;
        self.http.validate()
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  run:   max_workers={}, assumed_task_ms={}, sample_interval_ms={}",
            self.run.max_workers,
            self.run.assumed_task_ms,
            self.run.sample_interval_ms
        );
        tracing::info!(
            "  http:  connect_timeout_ms={}, read_timeout_ms={}, cookie={}",
            self.http.connect_timeout_ms,
            self.http.read_timeout_ms,
            if self.http.cookie.is_some() { "(set)" } else { "(none)" }
        );
    }

    /// Return a redacted view safe for printing (cookie value omitted).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "run": self.run,
            "http": {
                "connect_timeout_ms": self.http.connect_timeout_ms,
                "read_timeout_ms": self.http.read_timeout_ms,
                "user_agent": self.http.user_agent,
                "cookie_set": self.http.cookie.is_some(),
            },
        })
    }
}

// ── Run ───────────────────────────────────────────────────────

/// Sizing and timing knobs for one load test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Hard cap on worker threads; dispatches beyond it are rejected.
    pub max_workers: usize,
    /// Assumed duration of the final task, used only to estimate percent complete.
    pub assumed_task_ms: u64,
    /// Cadence of the activity tracker while any worker is busy.
    pub sample_interval_ms: u64,
    /// Milliseconds represented by a full-height display bar.
    pub display_scale_ms: u64,
}

pub const DEFAULT_MAX_WORKERS: usize = 20;
pub const DEFAULT_ASSUMED_TASK_MS: u64 = 1000;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 25;
pub const DEFAULT_DISPLAY_SCALE_MS: u64 = 1000;

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            assumed_task_ms: DEFAULT_ASSUMED_TASK_MS,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            display_scale_ms: DEFAULT_DISPLAY_SCALE_MS,
        }
    }
}

impl RunConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_workers: profiled_env_usize(p, "MAX_WORKERS", DEFAULT_MAX_WORKERS),
            assumed_task_ms: profiled_env_u64(p, "ASSUMED_TASK_MS", DEFAULT_ASSUMED_TASK_MS),
            sample_interval_ms: profiled_env_u64(p, "SAMPLE_INTERVAL_MS", DEFAULT_SAMPLE_INTERVAL_MS),
            display_scale_ms: profiled_env_u64(p, "DISPLAY_SCALE_MS", DEFAULT_DISPLAY_SCALE_MS),
        }
    }

    pub fn validate(&self) -> Result<(), StampedeError> {
        if self.max_workers == 0 || self.max_workers > MAX_WORKERS_LIMIT {
            return Err(StampedeError::Config(format!(
                "max_workers must be between 1 and {}, got {}",
                MAX_WORKERS_LIMIT, self.max_workers
            )));
        }
        if self.sample_interval_ms == 0 {
            return Err(StampedeError::Config(
                "sample_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.display_scale_ms == 0 {
            return Err(StampedeError::Config(
                "display_scale_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ── HTTP ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub user_agent: String,
    /// Full value of the `Cookie` header sent with every probe.
    pub cookie: Option<String>,
}

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn default_user_agent() -> String {
    format!("stampede/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: default_user_agent(),
            cookie: None,
        }
    }
}

impl HttpConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            connect_timeout_ms: profiled_env_u64(p, "CONNECT_TIMEOUT_MS", DEFAULT_TIMEOUT_MS),
            read_timeout_ms: profiled_env_u64(p, "READ_TIMEOUT_MS", DEFAULT_TIMEOUT_MS),
            user_agent: profiled_env_or(p, "USER_AGENT", &default_user_agent()),
            cookie: profiled_env_opt(p, "COOKIE"),
        }
    }

    /// Set the cookie header value; an empty string clears it.
    pub fn set_cookie(&mut self, cookie: &str) {
        self.cookie = if cookie.is_empty() { None } else { Some(cookie.to_string()) };
    }

    pub fn validate(&self) -> Result<(), StampedeError> {
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(StampedeError::Config(
                "http timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.max_workers, 20);
        assert_eq!(config.run.assumed_task_ms, 1000);
        assert_eq!(config.run.sample_interval_ms, 25);
        assert!(config.http.cookie.is_none());
    }

    #[test]
    fn rejects_zero_workers() {
        let mut run = RunConfig::default();
        run.max_workers = 0;
        assert!(matches!(run.validate(), Err(StampedeError::Config(_))));
    }

    #[test]
    fn rejects_oversized_pool() {
        let mut run = RunConfig::default();
        run.max_workers = MAX_WORKERS_LIMIT + 1;
        assert!(run.validate().is_err());
    }

    #[test]
    fn rejects_zero_sample_interval() {
        let mut run = RunConfig::default();
        run.sample_interval_ms = 0;
        assert!(run.validate().is_err());
    }

    #[test]
    fn empty_cookie_clears() {
        let mut http = HttpConfig::default();
        http.set_cookie("session=abc");
        assert_eq!(http.cookie.as_deref(), Some("session=abc"));
        http.set_cookie("");
        assert!(http.cookie.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[run]\nmax_workers = 3\n").unwrap();
        assert_eq!(config.run.max_workers, 3);
        assert_eq!(config.run.assumed_task_ms, DEFAULT_ASSUMED_TASK_MS);
        assert_eq!(config.http.read_timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn redacted_summary_hides_cookie() {
        let mut config = Config::default();
        config.http.set_cookie("secret=1");
        let summary = config.redacted_summary().to_string();
        assert!(!summary.contains("secret=1"));
        assert!(summary.contains("\"cookie_set\":true"));
    }

    #[test]
    fn profile_label_default() {
        assert_eq!(Config::default().profile_label(), "default");
        assert_eq!(Config::for_profile("staging").profile, "STAGING");
    }
}
