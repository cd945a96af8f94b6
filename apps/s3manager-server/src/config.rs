//! Configuration management for S3 Manager Server

use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::service::ServiceConfig;

/// Default upload ceiling (32 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 32 << 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub features: FeatureConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests running longer than this are aborted, backend calls included
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: String,
    pub force_path_style: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Minio,
    R2,
    S3,
    B2,
    /// In-process store, nothing persists across restarts
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    pub max_upload_bytes: u64,
    /// When false, every delete route answers 403
    pub allow_delete: bool,
    /// Serve downloads as attachments instead of inline content
    pub force_download: bool,
    /// List every key below a path by default instead of one level
    pub list_recursive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                request_timeout_secs: 60,
            },
            storage: StorageConfig {
                provider: StorageProvider::Minio,
                endpoint: Some("http://localhost:9000".to_string()),
                access_key: None,
                secret_key: None,
                region: "us-east-1".to_string(),
                force_path_style: true,
            },
            features: FeatureConfig {
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                allow_delete: true,
                force_download: true,
                list_recursive: false,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = match optional("S3_PROVIDER")
            .unwrap_or_else(|| "minio".to_string())
            .to_lowercase()
            .as_str()
        {
            "minio" => StorageProvider::Minio,
            "r2" => StorageProvider::R2,
            "s3" => StorageProvider::S3,
            "b2" => StorageProvider::B2,
            "memory" => StorageProvider::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    var: "S3_PROVIDER",
                    value: other.to_string(),
                })
            }
        };

        // Only AWS itself resolves endpoints and credentials on its own
        let needs_explicit_backend = !matches!(provider, StorageProvider::S3 | StorageProvider::Memory);
        let endpoint = optional("S3_ENDPOINT");
        let access_key = optional("S3_ACCESS_KEY");
        let secret_key = optional("S3_SECRET_KEY");
        if needs_explicit_backend {
            endpoint.as_ref().ok_or(ConfigError::Missing("S3_ENDPOINT"))?;
            access_key.as_ref().ok_or(ConfigError::Missing("S3_ACCESS_KEY"))?;
            secret_key.as_ref().ok_or(ConfigError::Missing("S3_SECRET_KEY"))?;
        }

        Ok(Config {
            server: ServerConfig {
                host: optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed("SERVER_PORT", 8080)?,
                request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", 60)?,
            },
            storage: StorageConfig {
                provider,
                endpoint,
                access_key,
                secret_key,
                region: optional("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                force_path_style: parsed("S3_FORCE_PATH_STYLE", provider != StorageProvider::S3)?,
            },
            features: FeatureConfig {
                max_upload_bytes: parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
                allow_delete: parsed("ALLOW_DELETE", true)?,
                force_download: parsed("FORCE_DOWNLOAD", true)?,
                list_recursive: parsed("LIST_RECURSIVE", false)?,
            },
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Settings the storage service needs
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            max_upload_bytes: self.features.max_upload_bytes,
            ..ServiceConfig::default()
        }
    }
}

fn optional(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}
