//! Configuration for Prospecta

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "PROSPECTA_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// External workflow service
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Email gateway and enrichment collaborators
    #[serde(default)]
    pub outbound: OutboundConfig,

    /// Automation engine tuning
    #[serde(default)]
    pub automation: AutomationEngineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database backend: "postgres" or "memory"
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Database URL (for postgres)
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Run embedded migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_db_backend(),
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            run_migrations: default_run_migrations(),
        }
    }
}

fn default_db_backend() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_run_migrations() -> bool {
    true
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_api_port() -> u16 {
    8080
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// External workflow service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Webhook endpoint receiving signed envelopes
    #[serde(default = "default_webhook_url")]
    pub webhook_url: String,

    /// Remote signing endpoint; when absent the envelope is signed locally
    pub signing_url: Option<String>,

    /// Shared secret for local HMAC signing
    pub signing_secret: Option<String>,

    /// Timeout for single workflow triggers, in seconds
    #[serde(default = "default_trigger_timeout")]
    pub timeout_secs: u64,

    /// Timeout for the signing sub-call, in seconds
    #[serde(default = "default_signing_timeout")]
    pub signing_timeout_secs: u64,

    /// Timeout for batch triggers, in seconds
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,

    /// Timeout for the health_check action, in seconds
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            webhook_url: default_webhook_url(),
            signing_url: None,
            signing_secret: None,
            timeout_secs: default_trigger_timeout(),
            signing_timeout_secs: default_signing_timeout(),
            batch_timeout_secs: default_batch_timeout(),
            health_check_timeout_secs: default_health_check_timeout(),
        }
    }
}

fn default_webhook_url() -> String {
    "http://localhost:5678/webhook/prospection".to_string()
}

fn default_trigger_timeout() -> u64 {
    15
}

fn default_signing_timeout() -> u64 {
    8
}

fn default_batch_timeout() -> u64 {
    30
}

fn default_health_check_timeout() -> u64 {
    5
}

/// Email gateway and enrichment collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundConfig {
    /// Email-send gateway endpoint
    pub email_send_url: Option<String>,

    /// Domain-enrichment proxy endpoint
    pub enrichment_url: Option<String>,

    /// Bearer token passed to both collaborators
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_outbound_timeout")]
    pub timeout_secs: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            email_send_url: None,
            enrichment_url: None,
            api_key: None,
            timeout_secs: default_outbound_timeout(),
        }
    }
}

fn default_outbound_timeout() -> u64 {
    15
}

/// Automation engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationEngineConfig {
    /// Health poll interval in seconds
    #[serde(default = "default_health_poll_interval")]
    pub health_poll_interval_secs: u64,

    /// Stats cache TTL in seconds
    #[serde(default = "default_stats_cache_ttl")]
    pub stats_cache_ttl_secs: u64,
}

impl Default for AutomationEngineConfig {
    fn default() -> Self {
        Self {
            health_poll_interval_secs: default_health_poll_interval(),
            stats_cache_ttl_secs: default_stats_cache_ttl(),
        }
    }
}

fn default_health_poll_interval() -> u64 {
    30
}

fn default_stats_cache_ttl() -> u64 {
    120
}

impl Config {
    /// Load configuration from a single TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the first file found, overlaid with
    /// `PROSPECTA__SECTION__KEY` environment variables
    pub fn load() -> crate::Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = Self::locate_file() {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                ::config::Environment::with_prefix("PROSPECTA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize::<Config>())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject intervals and timeouts that cannot be used as durations
    pub fn validate(&self) -> crate::Result<()> {
        let durations = [
            (
                "automation.health_poll_interval_secs",
                self.automation.health_poll_interval_secs,
            ),
            ("workflow.timeout_secs", self.workflow.timeout_secs),
            (
                "workflow.signing_timeout_secs",
                self.workflow.signing_timeout_secs,
            ),
            ("workflow.batch_timeout_secs", self.workflow.batch_timeout_secs),
            (
                "workflow.health_check_timeout_secs",
                self.workflow.health_check_timeout_secs,
            ),
            ("outbound.timeout_secs", self.outbound.timeout_secs),
        ];

        match durations.iter().find(|(_, secs)| *secs == 0) {
            Some((key, _)) => Err(crate::Error::Config(format!(
                "{} must be greater than zero",
                key
            ))),
            None => Ok(()),
        }
    }

    fn locate_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }

        [
            PathBuf::from("./prospecta.toml"),
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/prospecta/config.toml"),
        ]
        .into_iter()
        .find(|path| path.exists())
    }
}
