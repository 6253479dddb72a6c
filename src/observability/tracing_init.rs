use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the global tracing subscriber.
///
/// Events are written to stderr so the report on stdout stays clean.
/// `RUST_LOG` wins over everything in the config when it is set.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), TracingError> {
    let filter = build_env_filter(logging);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match (&logging.format, logging.timestamps) {
        (LogFormat::Pretty, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        (LogFormat::Pretty, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr)
                    .without_time(),
            )
            .try_init(),
        (LogFormat::Compact, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        (LogFormat::Compact, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .without_time(),
            )
            .try_init(),
        (LogFormat::Json, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        (LogFormat::Json, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_writer(std::io::stderr)
                    .without_time(),
            )
            .try_init(),
    };

    result.map_err(|e| TracingError::Init(e.to_string()))
}

/// Build the environment filter from logging config.
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    build_env_filter_from(config, std::env::var("RUST_LOG").ok())
}

fn build_env_filter_from(config: &LoggingConfig, rust_log: Option<String>) -> EnvFilter {
    let base_level = config.level.as_str();

    if let Some(env_filter) = rust_log {
        EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else if let Some(filter) = &config.filter {
        let combined = format!("{},{}", base_level, filter);
        EnvFilter::try_new(combined).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else {
        // Quiet the HTTP stack unless asked for
        EnvFilter::new(format!(
            "{},hyper=warn,hyper_util=warn,h2=warn,rustls=warn,reqwest=warn",
            base_level
        ))
    }
}

/// Tracing initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_filter_quiets_http_stack() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            ..Default::default()
        };
        let filter = build_env_filter_from(&config, None).to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("hyper=warn"));
    }

    #[test]
    fn test_config_filter_is_appended() {
        let config = LoggingConfig {
            filter: Some("log_trimmer=trace".into()),
            ..Default::default()
        };
        let filter = build_env_filter_from(&config, None).to_string();
        assert!(filter.contains("info"));
        assert!(filter.contains("log_trimmer=trace"));
        assert!(!filter.contains("reqwest=warn"));
    }

    #[test]
    fn test_rust_log_takes_precedence() {
        let config = LoggingConfig {
            filter: Some("log_trimmer=trace".into()),
            ..Default::default()
        };
        let filter = build_env_filter_from(&config, Some("warn".into())).to_string();
        assert_eq!(filter, "warn");
    }

    #[test]
    fn test_invalid_rust_log_falls_back_to_level() {
        let config = LoggingConfig {
            level: LogLevel::Error,
            ..Default::default()
        };
        let filter = build_env_filter_from(&config, Some("log_trimmer=loudest".into())).to_string();
        assert_eq!(filter, "error");
    }
}
