//! Server configuration
//!
//! Layered: built-in defaults, then an optional YAML file, then
//! `FAROL_`-prefixed environment variables (e.g.
//! `FAROL_SERVER__PORT=9090`).

use serde::Deserialize;

use farol_api::ReleaseChannel;

#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    pub log_level: String,
    pub server: ServerConfig,
    pub persistence: PersistenceConfig,
    pub storage: StorageConfig,
    pub signing: SigningConfig,
    /// Device enrollments for the built-in static registry. In a full
    /// platform deployment the device service implements the registry
    /// instead.
    #[serde(default)]
    pub devices: Vec<DeviceEnrollment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Memory,
    Database,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Memory => write!(f, "memory"),
            StorageMode::Database => write!(f, "database"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub mode: StorageMode,
    #[serde(default)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory firmware binaries are stored under
    pub base_dir: String,
    /// Base URL devices reach this server at; embedded in download URLs
    pub public_url: String,
    /// Secret for HMAC-signing binary download URLs
    pub url_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    pub private_key_path: String,
    pub public_key_path: String,
    /// Generate and persist a key pair on first start when none exists
    pub auto_generate: bool,
    pub key_bits: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEnrollment {
    pub device_id: String,
    pub template_id: String,
    pub channel: ReleaseChannel,
}

impl Configuration {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .set_default("log_level", "info")?
            .set_default("server.address", "0.0.0.0")?
            .set_default("server.port", 8080_i64)?
            .set_default("persistence.mode", "memory")?
            .set_default("storage.base_dir", "data/binaries")?
            .set_default("storage.public_url", "http://127.0.0.1:8080")?
            .set_default("storage.url_secret", "change-me")?
            .set_default("signing.private_key_path", "keys/release_signing.pem")?
            .set_default("signing.public_key_path", "keys/release_signing.pub.pem")?
            .set_default("signing.auto_generate", true)?
            .set_default("signing.key_bits", 2048_i64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("FAROL").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let configuration = Configuration::load("does-not-exist").unwrap();
        assert_eq!(configuration.server.port, 8080);
        assert_eq!(configuration.persistence.mode, StorageMode::Memory);
        assert!(configuration.signing.auto_generate);
        assert!(configuration.devices.is_empty());
    }
}
