use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

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
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("LEDGER_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("LEDGER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("LEDGER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("LEDGER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let credentials = match (
            non_empty_var("AWS_ACCESS_KEY_ID"),
            non_empty_var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Credentials {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteCredentials),
        };

        let storage = StorageConfig {
            root: PathBuf::from(
                env::var("LEDGER_STORE_ROOT").unwrap_or_else(|_| "object-store".to_string()),
            ),
            credentials,
            region: non_empty_var("AWS_REGION"),
        };

        let poll_interval_secs = env::var("LEDGER_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidPollInterval)?;

        let purge_processed = match env::var("LEDGER_PURGE_PROCESSED") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                name: "LEDGER_PURGE_PROCESSED",
            })?,
            Err(_) => false,
        };

        let pipeline = PipelineConfig {
            transactions_collection: env::var("LEDGER_TRANSACTIONS_COLLECTION")
                .unwrap_or_else(|_| "scetru-ml-bucket".to_string()),
            defaults_collection: env::var("LEDGER_DEFAULTS_COLLECTION")
                .unwrap_or_else(|_| "scetru-fcmb-do-good-table".to_string()),
            complete_table_collection: env::var("LEDGER_COMPLETE_TABLE_COLLECTION")
                .unwrap_or_else(|_| "complete-table".to_string()),
            staging_dir: PathBuf::from(
                env::var("LEDGER_STAGING_DIR")
                    .unwrap_or_else(|_| "processed_loan_request".to_string()),
            ),
            poll_interval: Duration::from_secs(poll_interval_secs),
            purge_processed,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage,
            pipeline,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Settings controlling the health and metrics server binding.
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Access key pair handed to the object store as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Where the object store lives and the opaque handles it is opened with.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub credentials: Option<Credentials>,
    pub region: Option<String>,
}

/// Collection names and cycle settings for the scoring pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub transactions_collection: String,
    pub defaults_collection: String,
    pub complete_table_collection: String,
    pub staging_dir: PathBuf,
    pub poll_interval: Duration,
    pub purge_processed: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPollInterval,
    InvalidFlag { name: &'static str },
    IncompleteCredentials,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "LEDGER_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "LEDGER_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPollInterval => {
                write!(f, "LEDGER_POLL_INTERVAL_SECS must be a positive integer")
            }
            ConfigError::InvalidFlag { name } => {
                write!(f, "{name} must be one of true/false/1/0/yes/no")
            }
            ConfigError::IncompleteCredentials => write!(
                f,
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidPollInterval
            | ConfigError::InvalidFlag { .. }
            | ConfigError::IncompleteCredentials => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "LEDGER_ENV",
            "LEDGER_HOST",
            "LEDGER_PORT",
            "LEDGER_LOG_LEVEL",
            "LEDGER_STORE_ROOT",
            "LEDGER_TRANSACTIONS_COLLECTION",
            "LEDGER_DEFAULTS_COLLECTION",
            "LEDGER_COMPLETE_TABLE_COLLECTION",
            "LEDGER_STAGING_DIR",
            "LEDGER_POLL_INTERVAL_SECS",
            "LEDGER_PURGE_PROCESSED",
            "AWS_ACCESS_KEY_ID",
            "AWS_SECRET_ACCESS_KEY",
            "AWS_REGION",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.pipeline.transactions_collection, "scetru-ml-bucket");
        assert_eq!(
            config.pipeline.defaults_collection,
            "scetru-fcmb-do-good-table"
        );
        assert_eq!(config.pipeline.complete_table_collection, "complete-table");
        assert_eq!(
            config.pipeline.staging_dir,
            PathBuf::from("processed_loan_request")
        );
        assert_eq!(config.pipeline.poll_interval, Duration::from_secs(1));
        assert!(!config.pipeline.purge_processed);
        assert!(config.storage.credentials.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LEDGER_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn rejects_half_configured_credentials() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("AWS_ACCESS_KEY_ID", "AKIA-TEST");
        match AppConfig::load() {
            Err(ConfigError::IncompleteCredentials) => {}
            other => panic!("expected incomplete credentials, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn credentials_debug_output_hides_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("AWS_ACCESS_KEY_ID", "AKIA-TEST");
        env::set_var("AWS_SECRET_ACCESS_KEY", "very-secret");
        let config = AppConfig::load().expect("config loads");
        let rendered = format!("{:?}", config.storage);
        assert!(rendered.contains("AKIA-TEST"));
        assert!(!rendered.contains("very-secret"));
        reset_env();
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LEDGER_POLL_INTERVAL_SECS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidPollInterval)
        ));
        reset_env();
    }

    #[test]
    fn parses_purge_flag() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LEDGER_PURGE_PROCESSED", "yes");
        let config = AppConfig::load().expect("config loads");
        assert!(config.pipeline.purge_processed);

        env::set_var("LEDGER_PURGE_PROCESSED", "maybe");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidFlag { .. })
        ));
        reset_env();
    }
}
