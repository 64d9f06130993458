//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with ATLAS_, `__` between sections)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! The database URL usually lives in the environment (`ATLAS_DATABASE__URL`
//! or the conventional `DATABASE_URL`), not in the config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Service identity reported by the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "local-service-atlas".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL. Empty means "use DATABASE_URL".
    pub url: String,
    /// Upper bound of the connection pool
    pub max_connections: u32,
    /// Create missing tables and indexes at startup
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            create_schema: true,
        }
    }
}

impl DatabaseConfig {
    /// The configured URL, falling back to the `DATABASE_URL` environment variable.
    pub fn resolved_url(&self) -> Option<String> {
        if !self.url.is_empty() {
            return Some(self.url.clone());
        }
        std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty())
    }
}

/// Evidence file storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for uploaded evidence files
    pub local_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: "./uploads".to_string(),
        }
    }
}

/// Listing and upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Page size used when a request does not ask for one
    pub page_size: u64,
    /// Largest page size a request may ask for
    pub max_page_size: u64,
    /// Maximum evidence upload size in MB
    pub max_upload_size_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_page_size: 500,
            max_upload_size_mb: 25,
        }
    }
}

impl LimitsConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g. ATLAS_SERVER__PORT, ATLAS_DATABASE__URL
            .add_source(
                Environment::with_prefix("ATLAS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

/// Initialize application configuration
///
/// Triggers the lazy load and logs which service is starting.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: service.name = {}, version = {}",
        config.service.name,
        config.service.version
    );
}

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

pub fn service() -> ServiceConfig {
    get_config().service
}

pub fn server() -> ServerConfig {
    get_config().server
}

pub fn database() -> DatabaseConfig {
    get_config().database
}

pub fn storage() -> StorageConfig {
    get_config().storage
}

pub fn limits() -> LimitsConfig {
    get_config().limits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.service.name, "local-service-atlas");
        assert_eq!(config.service.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.limits.page_size, 50);
        assert_eq!(config.limits.max_page_size, 500);
        assert!(config.database.create_schema);
    }

    #[test]
    fn test_upload_limit_in_bytes() {
        let limits = LimitsConfig {
            max_upload_size_mb: 2,
            ..LimitsConfig::default()
        };
        assert_eq!(limits.max_upload_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
bind_address = "127.0.0.1"
port = 9090

[database]
url = "sqlite::memory:"
max_connections = 1

[limits]
page_size = 20
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 1);
        assert_eq!(config.limits.page_size, 20);
        // Defaults should still apply for unspecified values
        assert_eq!(config.limits.max_upload_size_mb, 25);
        assert_eq!(config.storage.local_path, "./uploads");
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.service.name, "local-service-atlas");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_explicit_database_url_wins() {
        let database = DatabaseConfig {
            url: "postgres://localhost/atlas".to_string(),
            ..DatabaseConfig::default()
        };
        assert_eq!(
            database.resolved_url().as_deref(),
            Some("postgres://localhost/atlas")
        );
    }
}
