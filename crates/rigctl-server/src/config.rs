use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use librigctl::{DemoTelemetry, FieldSchema};
use rigctl_protocol::{DEFAULT_TEST_ID, FieldSpec, MAX_MESSAGE_BYTES};
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_NAME: &str = "Sample Test Object";
pub const DEFAULT_ADDRESS: &str = ":8080";

/// Config file as written on disk. Every key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub name: Option<String>,
    pub address: Option<String>,
    pub key: Option<String>,
    pub fields: Option<Vec<FieldSpec>>,
    pub static_dir: Option<PathBuf>,
    pub max_message_bytes: Option<usize>,
    pub default_test: Option<String>,
}

/// Server identity and runtime settings, fixed after startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub address: String,
    pub key: String,
    pub schema: Arc<FieldSchema>,
    pub static_dir: Option<PathBuf>,
    pub max_message_bytes: usize,
    pub default_test: String,
}

impl ServerConfig {
    /// Load from `path`. A missing file means all defaults; an unreadable
    /// or invalid one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, falling back to defaults");
            return Self::from_file_config(FileConfig::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let file = Self::parse(path, &contents)?;
        let config = Self::from_file_config(file)?;
        info!(path = %path.display(), "config data loaded");
        Ok(config)
    }

    /// Parse `contents` as TOML when `path` ends in `.toml`, JSON otherwise.
    pub fn parse(path: &Path, contents: &str) -> Result<FileConfig> {
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        if is_toml {
            toml::from_str(contents)
                .with_context(|| format!("invalid TOML config {}", path.display()))
        } else {
            serde_json::from_str(contents)
                .with_context(|| format!("invalid JSON config {}", path.display()))
        }
    }

    pub fn from_file_config(file: FileConfig) -> Result<Self> {
        let name = non_empty(file.name).unwrap_or_else(|| {
            info!("value of field 'name' not present in config, falling back to defaults");
            DEFAULT_NAME.to_string()
        });
        let address = non_empty(file.address).unwrap_or_else(|| {
            info!("value of field 'address' not present in config, falling back to defaults");
            DEFAULT_ADDRESS.to_string()
        });
        let key = non_empty(file.key).unwrap_or_else(|| {
            info!("value of field 'key' not present in config, falling back to defaults");
            String::new()
        });
        if key.is_empty() {
            warn!("an unset key is a large security risk");
        }

        let schema = match file.fields {
            Some(specs) => FieldSchema::new(specs).context("invalid field schema")?,
            None => {
                info!("value of field 'fields' not present in config, using demo fields");
                DemoTelemetry::schema()
            }
        };

        let max_message_bytes = match file.max_message_bytes {
            Some(0) | None => {
                info!(
                    default = MAX_MESSAGE_BYTES,
                    "value of field 'max_message_bytes' not present in config, falling back to defaults"
                );
                MAX_MESSAGE_BYTES
            }
            Some(limit) => limit,
        };

        let default_test = non_empty(file.default_test).unwrap_or_else(|| {
            info!("value of field 'default_test' not present in config, falling back to defaults");
            DEFAULT_TEST_ID.to_string()
        });

        Ok(Self {
            name,
            address,
            key,
            schema: Arc::new(schema),
            static_dir: file.static_dir,
            max_message_bytes,
            default_test,
        })
    }

    /// Address suitable for binding. A bare `:port` listens on all
    /// interfaces.
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
