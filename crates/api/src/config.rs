use std::time::Duration;

use vista_ai::{PollPolicy, ProviderConfig};
use vista_infra::ledger::LedgerConfig;
use vista_observability::{LogFormat, TracingConfig};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Process configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. `DATABASE_URL`
/// is optional: without it the server runs on in-memory stores.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub log_format: LogFormat,
    pub vision_api_url: String,
    pub vision_api_key: String,
    pub vision_model: String,
    pub text_model: String,
    pub predictions_api_url: String,
    pub predictions_api_key: String,
    pub staging_model_version: String,
    pub enhancement_model_version: String,
    pub poll: PollPolicy,
    pub ledger: LedgerConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                     | Default                      |
    /// |-----------------------------|------------------------------|
    /// | `HOST`                      | `0.0.0.0`                    |
    /// | `PORT`                      | `8080`                       |
    /// | `DATABASE_URL`              | unset (in-memory stores)     |
    /// | `LOG_FORMAT`                | `json`                       |
    /// | `VISION_API_URL`            | `https://api.openai.com/v1`  |
    /// | `VISION_MODEL`              | `gpt-4o`                     |
    /// | `TEXT_MODEL`                | `gpt-4o-mini`                |
    /// | `PREDICTIONS_API_URL`       | `https://api.replicate.com`  |
    /// | `POLL_INTERVAL_MS`          | `2000`                       |
    /// | `POLL_MAX_WAIT_SECS`        | `300`                        |
    /// | `FREE_CREDIT_LIMIT`         | `3`                          |
    /// | `PRO_CREDIT_LIMIT`          | `50`                         |
    /// | `BUSINESS_CREDIT_LIMIT`     | `250`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = parse(&lookup, "PORT", 8080u16, "a port number")?;

        let log_format_raw = var("LOG_FORMAT", "json");
        let log_format: LogFormat = log_format_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "LOG_FORMAT",
            expected: "json or pretty",
            value: log_format_raw.clone(),
        })?;

        let poll_interval_ms = parse(&lookup, "POLL_INTERVAL_MS", 2_000u64, "milliseconds")?;
        let poll_max_wait_secs = parse(&lookup, "POLL_MAX_WAIT_SECS", 300u64, "seconds")?;

        let defaults = LedgerConfig::default();
        let ledger = LedgerConfig {
            free_limit: parse(&lookup, "FREE_CREDIT_LIMIT", defaults.free_limit, "an integer")?,
            pro_limit: parse(&lookup, "PRO_CREDIT_LIMIT", defaults.pro_limit, "an integer")?,
            business_limit: parse(
                &lookup,
                "BUSINESS_CREDIT_LIMIT",
                defaults.business_limit,
                "an integer",
            )?,
        };

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            log_format,
            vision_api_url: var("VISION_API_URL", "https://api.openai.com/v1"),
            vision_api_key: var("VISION_API_KEY", ""),
            vision_model: var("VISION_MODEL", "gpt-4o"),
            text_model: var("TEXT_MODEL", "gpt-4o-mini"),
            predictions_api_url: var("PREDICTIONS_API_URL", "https://api.replicate.com"),
            predictions_api_key: var("PREDICTIONS_API_KEY", ""),
            staging_model_version: var("STAGING_MODEL_VERSION", "staging-latest"),
            enhancement_model_version: var("ENHANCEMENT_MODEL_VERSION", "enhancement-latest"),
            poll: PollPolicy::new(
                Duration::from_millis(poll_interval_ms),
                Duration::from_secs(poll_max_wait_secs),
            ),
            ledger,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tracing(&self) -> TracingConfig {
        TracingConfig {
            format: self.log_format,
            ..TracingConfig::default()
        }
    }

    pub fn vision(&self) -> ProviderConfig {
        ProviderConfig::new(&self.vision_api_url, &self.vision_api_key, &self.vision_model)
    }

    /// Text generation shares the vision endpoint and key.
    pub fn text(&self) -> ProviderConfig {
        ProviderConfig::new(&self.vision_api_url, &self.vision_api_key, &self.text_model)
    }

    pub fn staging(&self) -> ProviderConfig {
        ProviderConfig::new(
            &self.predictions_api_url,
            &self.predictions_api_key,
            &self.staging_model_version,
        )
        .with_poll(self.poll)
    }

    pub fn enhancement(&self) -> ProviderConfig {
        ProviderConfig::new(
            &self.predictions_api_url,
            &self.predictions_api_key,
            &self.enhancement_model_version,
        )
        .with_poll(self.poll)
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, default: T, expected: &'static str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: core::str::FromStr,
{
    match lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
    }
}
