//! Server configuration.
//!
//! Settings are read from a TOML file and overridden by command-line
//! flags in `metastored`.
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 10010
//! db_path = "/var/lib/metastore/hms2.db"
//! memory_mode = false
//! stream_buffer = 64
//! copy_sd_location = false
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use metastore_common::constants::{DEFAULT_DB_FILE, DEFAULT_PORT, DEFAULT_STREAM_BUFFER};
use metastore_store::StoreConfig;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Catalog file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Keep the catalog in memory only.
    #[serde(default)]
    pub memory_mode: bool,

    /// Records buffered between a list scan and its response stream.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Fill an empty partition location from its storage descriptor on add.
    #[serde(default)]
    pub copy_sd_location: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_FILE)
}

fn default_stream_buffer() -> usize {
    DEFAULT_STREAM_BUFFER
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            memory_mode: false,
            stream_buffer: default_stream_buffer(),
            copy_sd_location: false,
        }
    }
}

impl ServerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the socket address.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the store settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        let config = if self.memory_mode {
            StoreConfig::in_memory()
        } else {
            StoreConfig::with_path(&self.db_path)
        };
        config.copy_sd_location(self.copy_sd_location)
    }

    /// Creates a builder for configuration.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

/// Builder for server configuration.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the catalog file.
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// Enables memory mode.
    pub fn memory_mode(mut self, enabled: bool) -> Self {
        self.config.memory_mode = enabled;
        self
    }

    /// Sets the list stream buffer size.
    pub fn stream_buffer(mut self, size: usize) -> Self {
        self.config.stream_buffer = size;
        self
    }

    /// Enables the write-side partition location fallback.
    pub fn copy_sd_location(mut self, enabled: bool) -> Self {
        self.config.copy_sd_location = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 10010);
        assert_eq!(config.db_path, PathBuf::from("hms2.db"));
        assert_eq!(config.stream_buffer, 64);
        assert!(!config.memory_mode);
        assert!(!config.copy_sd_location);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder()
            .host("localhost")
            .port(10011)
            .memory_mode(true)
            .stream_buffer(8)
            .build();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 10011);
        assert!(config.memory_mode);
        assert_eq!(config.stream_buffer, 8);
        assert_eq!(config.socket_addr(), "localhost:10011");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("port = 9000\nmemory_mode = true\n").unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.memory_mode);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.stream_buffer, 64);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("metastored.toml");

        let config = ServerConfig::builder()
            .host("testhost")
            .port(9999)
            .db_path("/data/catalog.db")
            .copy_sd_location(true)
            .build();

        config.save(&path).unwrap();

        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.host, "testhost");
        assert_eq!(loaded.port, 9999);
        assert_eq!(loaded.db_path, PathBuf::from("/data/catalog.db"));
        assert!(loaded.copy_sd_location);
    }

    #[test]
    fn test_store_config() {
        let config = ServerConfig::builder().db_path("/data/x.db").build();
        let store = config.store_config();
        assert_eq!(store.path, Some(PathBuf::from("/data/x.db")));
        assert!(!store.memory);

        let config = ServerConfig::builder()
            .memory_mode(true)
            .copy_sd_location(true)
            .build();
        let store = config.store_config();
        assert!(store.memory);
        assert!(store.copy_sd_location);
    }
}
