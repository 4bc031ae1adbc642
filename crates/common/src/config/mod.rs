//! Configuration management for Vis4T services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Roster spreadsheet and score reconciliation settings
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Embedded analytics dashboard settings
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Directory for temporary upload files
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Largest accepted upload body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create missing tables from the entity definitions on startup
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[serde(default = "default_access_expiration")]
    pub access_expiration_secs: u64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_expiration")]
    pub refresh_expiration_secs: u64,
}

/// Layout of the roster export template and reconciliation tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Leading rows above the header row
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,

    /// Trailing signature/summary rows
    #[serde(default = "default_footer_rows")]
    pub footer_rows: usize,

    /// Domain used for derived student mail addresses
    #[serde(default = "default_email_domain")]
    pub email_domain: String,

    /// Zero-padded width of persisted student identifiers
    #[serde(default = "default_student_id_width")]
    pub student_id_width: usize,

    /// Score associations inserted per statement
    #[serde(default = "default_reconcile_batch_size")]
    pub batch_size: usize,
}

/// Metabase static embedding settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DashboardConfig {
    /// Public Metabase site URL
    #[serde(default = "default_dashboard_site_url")]
    pub site_url: String,

    /// Embedding secret key
    pub secret_key: Option<String>,

    /// Dashboard shown for a whole class
    #[serde(default = "default_class_dashboard_id")]
    pub class_dashboard_id: i64,

    /// Dashboard shown for a single student
    #[serde(default = "default_student_dashboard_id")]
    pub student_dashboard_id: i64,

    /// Lifetime of a signed embed URL in seconds
    #[serde(default = "default_dashboard_ttl")]
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 60 }
fn default_max_concurrent() -> usize { 100 }
fn default_upload_dir() -> PathBuf { std::env::temp_dir().join("vis4t-uploads") }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_auto_migrate() -> bool { true }
fn default_access_expiration() -> u64 { 3600 }
fn default_refresh_expiration() -> u64 { 7 * 24 * 3600 }
fn default_header_rows() -> usize { 9 }
fn default_footer_rows() -> usize { 2 }
fn default_email_domain() -> String { "iuh.edu.vn".to_string() }
fn default_student_id_width() -> usize { 8 }
fn default_reconcile_batch_size() -> usize { 500 }
fn default_dashboard_site_url() -> String { "http://localhost:3000".to_string() }
fn default_class_dashboard_id() -> i64 { 2 }
fn default_student_dashboard_id() -> i64 { 3 }
fn default_dashboard_ttl() -> u64 { 600 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "vis4t".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            header_rows: default_header_rows(),
            footer_rows: default_footer_rows(),
            email_domain: default_email_domain(),
            student_id_width: default_student_id_width(),
            batch_size: default_reconcile_batch_size(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            site_url: default_dashboard_site_url(),
            secret_key: None,
            class_dashboard_id: default_class_dashboard_id(),
            student_dashboard_id: default_student_dashboard_id(),
            token_ttl_secs: default_dashboard_ttl(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("auth.access_expiration_secs", 3600)?
            .set_default("observability.log_level", "info")?
            .set_default("rate_limit.enabled", true)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__DATABASE__URL=postgres://...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// JWT signing secret; unset or empty is a configuration error
    pub fn jwt_secret(&self) -> Result<&str, ConfigError> {
        self.auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::Message("auth.jwt_secret is not set".to_string()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                max_concurrent_requests: default_max_concurrent(),
                upload_dir: default_upload_dir(),
                max_upload_bytes: default_max_upload_bytes(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/vis4t".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                auto_migrate: default_auto_migrate(),
            },
            auth: AuthConfig {
                jwt_secret: None,
                access_expiration_secs: default_access_expiration(),
                refresh_expiration_secs: default_refresh_expiration(),
            },
            ingestion: IngestionConfig::default(),
            dashboard: DashboardConfig::default(),
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: default_rate_limit(),
                burst: default_burst(),
                enabled: default_enabled(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.ingestion.header_rows, 9);
        assert_eq!(config.ingestion.footer_rows, 2);
        assert_eq!(config.ingestion.email_domain, "iuh.edu.vn");
    }

    #[test]
    fn test_missing_jwt_secret() {
        let mut config = AppConfig::default();
        assert!(config.jwt_secret().is_err());

        config.auth.jwt_secret = Some(String::new());
        assert!(config.jwt_secret().is_err());

        config.auth.jwt_secret = Some("s3cret".to_string());
        assert_eq!(config.jwt_secret().unwrap(), "s3cret");
    }
}
