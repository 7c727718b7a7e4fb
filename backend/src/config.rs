//! Configuration management for the Tendero backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with TENDERO_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Ledger rule tuning
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Where audit events go
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify access tokens
    pub secret: String,
}

/// Thresholds used by the credit and waste engines
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Days without purchases before a client or supplier turns INACTIVE
    pub inactive_after_days: i64,

    /// Maximum number of lots written off by one expiry sweep
    pub expiry_sweep_limit: i64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuditConfig {
    #[serde(default)]
    pub sink: AuditSink,
}

/// Audit destination
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditSink {
    /// `audit_logs` table
    #[default]
    Database,
    /// Structured log records only
    Log,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("TENDERO_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default(
                "ledger.inactive_after_days",
                shared::ledger::DEFAULT_INACTIVE_AFTER_DAYS,
            )?
            .set_default("ledger.expiry_sweep_limit", 500)?
            .set_default("audit.sink", "database")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (TENDERO_ prefix)
            .add_source(
                Environment::with_prefix("TENDERO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            inactive_after_days: shared::ledger::DEFAULT_INACTIVE_AFTER_DAYS,
            expiry_sweep_limit: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_defaults() {
        let ledger = LedgerConfig::default();
        assert_eq!(ledger.inactive_after_days, 30);
        assert_eq!(ledger.expiry_sweep_limit, 500);
    }

    #[test]
    fn test_audit_sink_parsing() {
        let audit: AuditConfig = serde_json::from_str(r#"{"sink":"log"}"#).unwrap();
        assert_eq!(audit.sink, AuditSink::Log);

        let audit: AuditConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(audit.sink, AuditSink::Database);
    }
}
