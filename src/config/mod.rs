//! Configuration for a trimming run.
//!
//! Settings come from an optional TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax, and are then
//! overridden by command-line flags and their environment variables.
//!
//! # Example
//!
//! ```toml
//! host = "https://es.internal:9200"
//! username = "trimmer"
//! password = "${ES_PASSWORD}"
//! index_pattern = "logs-*"
//! max_age = "30d"
//! max_size = "500GB"
//!
//! [logging]
//! format = "json"
//! ```

mod logging;

use std::{fmt, path::Path, sync::LazyLock};

pub use logging::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    retention::RetentionPolicy,
    units::{DurationFormatError, SizeFormatError, parse_duration, parse_size},
};

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Root configuration for a trimming run.
///
/// Every field has a default so partial files load; [`TrimmerConfig::validate`]
/// decides whether the result is usable.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrimmerConfig {
    /// Cluster base URL, e.g. `https://localhost:9200`.
    #[serde(default)]
    pub host: String,

    /// Basic-auth username. Only used when a password is also set.
    #[serde(default)]
    pub username: Option<String>,

    /// Basic-auth password. Only used when a username is also set.
    #[serde(default)]
    pub password: Option<String>,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Index name pattern passed to `_cat/indices`.
    #[serde(default = "default_index_pattern")]
    pub index_pattern: String,

    /// Maximum index age, e.g. `"7d"`.
    #[serde(default)]
    pub max_age: Option<String>,

    /// Maximum total size of all matching indexes, e.g. `"100GB"`.
    #[serde(default)]
    pub max_size: Option<String>,

    /// Actually delete indexes. When false the run only produces a plan.
    #[serde(default)]
    pub delete_indexes: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on simultaneous settings lookups and deletions.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Query `_cluster/health` before listing indexes.
    #[serde(default = "default_true")]
    pub health_check: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TrimmerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: None,
            password: None,
            skip_tls_verify: false,
            index_pattern: default_index_pattern(),
            max_age: None,
            max_size: None,
            delete_indexes: false,
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_requests: default_max_concurrent_requests(),
            health_check: true,
            logging: LoggingConfig::default(),
        }
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for TrimmerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrimmerConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("index_pattern", &self.index_pattern)
            .field("max_age", &self.max_age)
            .field("max_size", &self.max_size)
            .field("delete_indexes", &self.delete_indexes)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("health_check", &self.health_check)
            .field("logging", &self.logging)
            .finish()
    }
}

fn default_index_pattern() -> String {
    "vector-*".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_requests() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl TrimmerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string. Does not validate.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: TrimmerConfig = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Credentials to send, only when both halves are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    /// Check the configuration and build the retention policy it describes.
    ///
    /// Runs before any client is constructed, so a bad configuration never
    /// touches the network.
    pub fn validate(&self) -> Result<RetentionPolicy, ConfigError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ConfigError::Validation(
                "elasticsearch host is required (use --host or ES_HOST)".into(),
            ));
        }

        let url = url::Url::parse(host)
            .map_err(|e| ConfigError::Validation(format!("invalid host '{host}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "host '{host}' must use http or https"
            )));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(ConfigError::Validation(
                "credentials must not be embedded in the host URL; use --username/--password"
                    .into(),
            ));
        }

        if self.index_pattern.trim().is_empty() {
            return Err(ConfigError::Validation("index pattern must not be empty".into()));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request timeout must be at least one second".into(),
            ));
        }

        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::Validation(
                "max concurrent requests must be at least 1".into(),
            ));
        }

        let age_cutoff = non_empty(&self.max_age)
            .map(|input| {
                parse_duration(input).map_err(|source| ConfigError::Age {
                    input: input.to_string(),
                    source,
                })
            })
            .transpose()?;

        let size_cap = non_empty(&self.max_size)
            .map(|input| {
                parse_size(input).map_err(|source| ConfigError::Size {
                    input: input.to_string(),
                    source,
                })
            })
            .transpose()?;

        RetentionPolicy::new(age_cutoff, size_cap).ok_or_else(|| {
            ConfigError::Validation(
                "must specify at least one of --max-age/MAX_AGE or --max-size/MAX_SIZE".into(),
            )
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Invalid max-size '{input}': {source}")]
    Size {
        input: String,
        #[source]
        source: SizeFormatError,
    },

    #[error("Invalid max-age '{input}': {source}")]
    Age {
        input: String,
        #[source]
        source: DurationFormatError,
    },
}

/// Expand `${VAR}` references, leaving anything after a `#` on a line alone.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in ENV_VAR_RE.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);
            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);
            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
