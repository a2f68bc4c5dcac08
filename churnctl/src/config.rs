//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `CHURNCTL_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `CHURNCTL_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `CHURNCTL_SERVER__PORT=8080` sets the `server.port` field.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CHURNCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server binding configuration
    pub server: ServerConfig,
    /// PostgreSQL connection settings
    pub database: DatabaseConfig,
    /// Session signing and initial admin user settings
    pub auth: AuthConfig,
    /// Classifier artifact locations
    pub model: ModelConfig,
    /// Email delivery for prediction reports
    pub email: EmailConfig,
}

/// HTTP server binding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string. Overridden by the DATABASE_URL environment variable when set.
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/churnctl".to_string(),
            max_connections: 10,
        }
    }
}

/// Authentication and initial admin user configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Secret key for signing session tokens (required for production)
    pub secret_key: Option<String>,
    /// How long a session token stays valid
    #[serde(with = "humantime_serde")]
    pub session_duration: Duration,
    /// Cookie name for the session token
    pub cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
    /// Minimum password length accepted at registration and password change
    pub password_min_length: usize,
    /// Allow new users to self-register
    pub allow_registration: bool,
    /// Username for the initial admin user (created on first startup)
    pub admin_username: String,
    /// Email address for the initial admin user
    pub admin_email: String,
    /// Password for the initial admin user (optional, can be set via environment)
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            session_duration: Duration::from_secs(24 * 60 * 60),
            cookie_name: "churnctl_session".to_string(),
            cookie_secure: true,
            password_min_length: 6,
            allow_registration: true,
            admin_username: "admin".to_string(),
            admin_email: "admin@example.com".to_string(),
            admin_password: None,
        }
    }
}

/// Classifier artifact configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Path to the logistic regression artifact (JSON)
    pub model_path: PathBuf,
    /// Path to the feature scaler artifact (JSON)
    pub scaler_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("artifacts/churn_model.json"),
            scaler_path: PathBuf::from("artifacts/scaler.json"),
        }
    }
}

/// Email configuration for prediction reports.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailConfig {
    /// Delivery mode: send via SMTP or write .eml files to disk
    pub mode: EmailMode,
    /// Directory for file-mode delivery
    pub file_path: String,
    /// Sender address used in the From header
    pub from_address: String,
    /// SMTP relay settings, used when mode is "smtp"
    pub smtp: SmtpConfig,
}

/// Email delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailMode {
    Smtp,
    File,
}

/// SMTP relay settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            mode: EmailMode::File,
            file_path: "./emails".to_string(),
            from_address: "ChurnCtl <noreply@churnctl.local>".to_string(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            model: ModelConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // DATABASE_URL takes precedence over everything else
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        Ok(config)
    }

    /// Build the figment for configuration loading (exposed for tests)
    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("CHURNCTL_").split("__"))
    }
}
