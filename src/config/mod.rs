//! Configuration management
//!
//! This module handles loading and parsing configuration for the rental backend.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Upload / object storage configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Outbound email configuration
    #[serde(default)]
    pub email: EmailConfig,
    /// Routing (travel distance) service configuration
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Social graph and moderation switches
    #[serde(default)]
    pub social: SocialConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            session_days: default_session_days(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_session_days() -> i64 {
    7
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/rentnest.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Public URL prefix the upload directory is served under
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Maximum file size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            public_prefix: default_public_prefix(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_prefix() -> String {
    "/uploads".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            _ => "bin",
        }
    }
}

/// Outbound email (SMTP) configuration
///
/// When `smtp_host` is empty, outgoing mail is only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_smtp_from")]
    pub from_address: String,
    #[serde(default = "default_smtp_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: default_smtp_from(),
            from_name: default_smtp_from_name(),
        }
    }
}

impl EmailConfig {
    /// Whether an SMTP relay has been configured
    pub fn is_configured(&self) -> bool {
        !self.smtp_host.trim().is_empty()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "noreply@rentnest.local".to_string()
}

fn default_smtp_from_name() -> String {
    "RentNest".to_string()
}

/// Routing service configuration used by the proximity filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Base URL of the driving-route endpoint
    #[serde(default = "default_routing_url")]
    pub base_url: String,
    /// API key appended to every request
    #[serde(default)]
    pub api_key: String,
    /// Accommodations strictly closer than this are kept
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    /// Concurrent lookups per listing request
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
    /// Cached distance lifetime in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Maximum cached coordinate pairs
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Request timeout in seconds
    #[serde(default = "default_routing_timeout")]
    pub timeout_seconds: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: default_routing_url(),
            api_key: String::new(),
            max_distance: default_max_distance(),
            lookup_concurrency: default_lookup_concurrency(),
            cache_ttl_seconds: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            timeout_seconds: default_routing_timeout(),
        }
    }
}

fn default_routing_url() -> String {
    "https://dev.virtualearth.net/REST/v1/Routes/Driving".to_string()
}

fn default_max_distance() -> f64 {
    10.0
}

fn default_lookup_concurrency() -> usize {
    8
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_routing_timeout() -> u64 {
    10
}

/// Social graph and moderation switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    /// Allow a user to follow themselves
    #[serde(default = "default_true")]
    pub allow_self_follow: bool,
    /// Restrict comment deletion to the comment author
    #[serde(default)]
    pub owner_only_comment_delete: bool,
    /// Minimum images required when creating an accommodation
    #[serde(default = "default_min_accommodation_images")]
    pub min_accommodation_images: usize,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            allow_self_follow: true,
            owner_only_comment_delete: false,
            min_accommodation_images: default_min_accommodation_images(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_min_accommodation_images() -> usize {
    3
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - RENTNEST_SERVER_HOST
    /// - RENTNEST_SERVER_PORT
    /// - RENTNEST_DATABASE_DRIVER
    /// - RENTNEST_DATABASE_URL
    /// - RENTNEST_UPLOAD_PATH
    /// - RENTNEST_SMTP_HOST / RENTNEST_SMTP_USERNAME / RENTNEST_SMTP_PASSWORD
    /// - RENTNEST_ROUTING_API_KEY
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("RENTNEST_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("RENTNEST_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("RENTNEST_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("RENTNEST_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("RENTNEST_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(path) = std::env::var("RENTNEST_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        if let Ok(host) = std::env::var("RENTNEST_SMTP_HOST") {
            self.email.smtp_host = host;
        }
        if let Ok(username) = std::env::var("RENTNEST_SMTP_USERNAME") {
            self.email.smtp_username = username;
        }
        if let Ok(password) = std::env::var("RENTNEST_SMTP_PASSWORD") {
            self.email.smtp_password = password;
        }

        if let Ok(key) = std::env::var("RENTNEST_ROUTING_API_KEY") {
            self.routing.api_key = key;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
