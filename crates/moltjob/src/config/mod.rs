use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::marketplace::admission::AdmissionPolicy;
use crate::marketplace::notifications::RetryPolicy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub admission: AdmissionPolicy,
    pub rate_limit: RateLimitConfig,
    pub credentials: CredentialConfig,
    pub notifications: NotificationConfig,
    pub payments: PaymentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let admission = AdmissionPolicy {
            daily_application_cap: parse_var("ADMISSION_DAILY_CAP", 3)?,
            utc_offset_minutes: parse_var("ADMISSION_UTC_OFFSET_MINUTES", 0)?,
        };

        let rate_limit = RateLimitConfig {
            max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", 60)?,
            window: Duration::from_secs(parse_var("RATE_LIMIT_WINDOW_SECS", 60)?),
            max_entries: parse_var("RATE_LIMIT_MAX_ENTRIES", 10_000)?,
            sweep_interval: Duration::from_secs(parse_var("RATE_LIMIT_SWEEP_SECS", 60)?),
        };

        let credentials = CredentialConfig {
            prefix_len: parse_var::<usize>("CREDENTIAL_PREFIX_LEN", 8)?.clamp(4, 32),
        };

        let notifications = NotificationConfig {
            orchestrator_url: env::var("ORCHESTRATOR_URL")
                .ok()
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            request_timeout: Duration::from_secs(parse_var("NOTIFY_TIMEOUT_SECS", 10)?),
            retry: RetryPolicy {
                max_retries: parse_var("NOTIFY_MAX_RETRIES", 2)?,
                unavailable_cooldown: Duration::from_secs(parse_var(
                    "NOTIFY_UNAVAILABLE_COOLDOWN_SECS",
                    30,
                )?),
                backoff_base: Duration::from_secs(parse_var("NOTIFY_BACKOFF_BASE_SECS", 5)?),
            },
            queue_capacity: parse_var("NOTIFY_QUEUE_CAPACITY", 256)?,
        };

        let payments = PaymentConfig {
            webhook_secret: env::var("PAYMENT_WEBHOOK_SECRET")
                .ok()
                .filter(|secret| !secret.is_empty()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: parse_var("APP_LOG_ANSI", false)?,
            },
            admission,
            rate_limit,
            credentials,
            notifications,
            payments,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Colourised output for interactive terminals.
    pub ansi: bool,
}

/// Per-identity request budget enforced at the HTTP boundary.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub max_entries: usize,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Hex characters of the secret kept in plaintext as the lookup index.
    pub prefix_len: usize,
}

/// Webhook delivery settings for counterparty agents.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub orchestrator_url: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub webhook_secret: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { name, value } => {
                write!(f, "{name} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
        }
    }
}
