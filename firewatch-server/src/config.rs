// Server configuration: defaults, config file, FIREWATCH_* environment

use firewatch_eye::VisionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "FIREWATCH_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: HttpConfig,
    pub vision: VisionConfig,
    pub proxy: ProxyConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_address: String,
    pub port: u16,
    /// Scratch directory for uploads, cleared as each request finishes
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub timeout_secs: u64,
    /// Hosts the camera proxy may contact. Empty allows any host.
    pub allowed_hosts: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            allowed_hosts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from a JSON, TOML or YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_str(&content)
    }

    /// Parse configuration, trying JSON, then TOML, then YAML
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        if let Ok(config) = serde_json::from_str::<ServerConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = toml::from_str::<ServerConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = serde_yaml::from_str::<ServerConfig>(content) {
            return Ok(config);
        }

        Err(ConfigError::ParseError("Unknown format".to_string()))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(std::env::vars())
    }

    /// Apply `FIREWATCH_*` overrides from an explicit set of variables
    pub fn apply_env_from<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "HOST" => self.server.bind_address = value,
                "PORT" => self.server.port = parse_var(&key, &value)?,
                "UPLOAD_DIR" => self.server.upload_dir = PathBuf::from(value),
                "MAX_UPLOAD_BYTES" => self.server.max_upload_bytes = parse_var(&key, &value)?,
                "MODEL_PATH" => self.vision.model_path = PathBuf::from(value),
                "MODEL_SHA256" => self.vision.model_sha256 = Some(value),
                "SATELLITE_MODEL_PATH" => {
                    self.vision.satellite_model_path = Some(PathBuf::from(value))
                }
                "CONFIDENCE_THRESHOLD" => {
                    self.vision.confidence_threshold = parse_var(&key, &value)?
                }
                "PROXY_TIMEOUT_SECS" => self.proxy.timeout_secs = parse_var(&key, &value)?,
                "PROXY_ALLOWED_HOSTS" => self.proxy.allowed_hosts = split_list(&value),
                "CORS_ORIGINS" => self.cors.allowed_origins = split_list(&value),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port cannot be 0".to_string(),
            ));
        }

        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server.bind_address cannot be empty".to_string(),
            ));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_upload_bytes must be > 0".to_string(),
            ));
        }

        if self.proxy.timeout_secs == 0 || self.proxy.timeout_secs > 300 {
            return Err(ConfigError::ValidationError(
                "proxy.timeout_secs must be between 1 and 300".to_string(),
            ));
        }

        if self.proxy.allowed_hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "proxy.allowed_hosts cannot contain empty entries".to_string(),
            ));
        }

        for origin in &self.cors.allowed_origins {
            if !origin.starts_with("http://") && !origin.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "cors origin '{}' must start with http:// or https://",
                    origin
                )));
            }
        }

        self.vision
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("vision: {}", e)))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ParseError(format!("{} has invalid value '{}'", key, value)))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
