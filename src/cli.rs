//! Command-line surface.
//!
//! Every flag can also come from an environment variable. Flags win over the
//! config file; the config file wins over built-in defaults.

use std::path::PathBuf;

use clap::{Parser, builder::FalseyValueParser};

use crate::config::{ConfigError, LogFormat, LogLevel, TrimmerConfig};

/// Env vars read by [`Args`], for tests that need a clean environment.
#[cfg(test)]
pub(crate) const ENV_VARS: &[&str] = &[
    "ES_HOST",
    "ES_USERNAME",
    "ES_PASSWORD",
    "ES_SKIP_TLS",
    "INDEX_PATTERN",
    "MAX_AGE",
    "MAX_SIZE",
    "DELETE_INDEXES",
    "VERBOSE",
    "LOG_FORMAT",
    "LOG_LEVEL",
];

/// CLI arguments for log-trimmer
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Delete Elasticsearch indexes that exceed an age or total size limit",
    long_about = None
)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Elasticsearch base URL, e.g. https://localhost:9200
    #[arg(long, env = "ES_HOST")]
    pub host: Option<String>,

    /// Basic-auth username
    #[arg(long, env = "ES_USERNAME")]
    pub username: Option<String>,

    /// Basic-auth password
    #[arg(long, env = "ES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, env = "ES_SKIP_TLS", value_parser = FalseyValueParser::new())]
    pub skip_tls_verify: bool,

    /// Index name pattern to consider (defaults to vector-*)
    #[arg(long, env = "INDEX_PATTERN")]
    pub index_pattern: Option<String>,

    /// Delete indexes older than this, e.g. 7d, 12h, 2w
    #[arg(long, env = "MAX_AGE")]
    pub max_age: Option<String>,

    /// Keep the total size of matching indexes under this, e.g. 100GB
    #[arg(long, env = "MAX_SIZE")]
    pub max_size: Option<String>,

    /// Actually delete indexes (without this the run is a dry run)
    #[arg(long = "delete", env = "DELETE_INDEXES", value_parser = FalseyValueParser::new())]
    pub delete_indexes: bool,

    /// Shorthand for --log-level debug
    #[arg(short, long, env = "VERBOSE", value_parser = FalseyValueParser::new())]
    pub verbose: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    pub log_level: Option<LogLevel>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Maximum number of simultaneous requests to the cluster
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Skip the cluster health check before listing
    #[arg(long)]
    pub skip_health_check: bool,
}

impl Args {
    /// Merge the config file (if any) with the flags into one configuration.
    ///
    /// Boolean flags only ever switch a setting on; they cannot turn off
    /// something the config file enabled.
    pub fn into_config(self) -> Result<TrimmerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => TrimmerConfig::from_file(path)?,
            None => TrimmerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(username) = self.username {
            config.username = Some(username);
        }
        if let Some(password) = self.password {
            config.password = Some(password);
        }
        if let Some(pattern) = self.index_pattern {
            config.index_pattern = pattern;
        }
        if let Some(max_age) = self.max_age {
            config.max_age = Some(max_age);
        }
        if let Some(max_size) = self.max_size {
            config.max_size = Some(max_size);
        }
        if let Some(secs) = self.timeout {
            config.request_timeout_secs = secs;
        }
        if let Some(n) = self.concurrency {
            config.max_concurrent_requests = n;
        }

        config.skip_tls_verify |= self.skip_tls_verify;
        config.delete_indexes |= self.delete_indexes;
        if self.skip_health_check {
            config.health_check = false;
        }

        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        } else if self.verbose {
            config.logging.level = LogLevel::Debug;
        }

        Ok(config)
    }
}
