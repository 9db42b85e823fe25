use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// `s3` for any S3-compatible provider, `memory` for local development.
    pub backend: String,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for R2/MinIO; empty means AWS.
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
    pub presign_ttl_minutes: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Allowed model-file extensions mapped to their byte limits. A file
    /// whose extension is not a key here is rejected outright.
    #[serde(default = "default_limits")]
    pub limits: HashMap<String, u64>,
    /// Byte limit for caller-supplied preview images.
    #[serde(default = "default_max_preview_size")]
    pub max_preview_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            limits: default_limits(),
            max_preview_size: default_max_preview_size(),
        }
    }
}

fn default_limits() -> HashMap<String, u64> {
    HashMap::from([
        ("stl".to_string(), 100 * 1024 * 1024),
        ("3mf".to_string(), 200 * 1024 * 1024),
        ("obj".to_string(), 50 * 1024 * 1024),
        ("ply".to_string(), 50 * 1024 * 1024),
    ])
}

fn default_max_preview_size() -> u64 {
    8 * 1024 * 1024
}

impl UploadConfig {
    /// The size limit for `extension`, or `None` when the type is not
    /// accepted at all. Extensions are matched lowercase.
    pub fn limit_for(&self, extension: &str) -> Option<u64> {
        self.limits.get(extension).copied()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("storage.backend", "s3")?
            .set_default("storage.bucket", "printvault")?
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.path_style", false)?
            .set_default("storage.presign_ttl_minutes", 15)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., PRINTVAULT__DATABASE__URL)
            .add_source(Environment::with_prefix("PRINTVAULT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_config() -> UploadConfig {
        UploadConfig {
            limits: HashMap::from([
                ("stl".to_string(), 100),
                ("3mf".to_string(), 200),
            ]),
            max_preview_size: 8,
        }
    }

    #[test]
    fn limit_lookup_by_extension() {
        let cfg = upload_config();
        assert_eq!(cfg.limit_for("stl"), Some(100));
        assert_eq!(cfg.limit_for("3mf"), Some(200));
        assert_eq!(cfg.limit_for("exe"), None);
    }
}
