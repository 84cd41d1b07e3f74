mod env_manager;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{Result, WorkspaceError};

pub use env_manager::{get_env_value, Credentials, HOST_ENV, TOKEN_ENV};

/// Environment variable pointing at an alternative config file
pub const CONFIG_FILE_ENV: &str = "DBRX_CONFIG_FILE";

/// Main configuration struct for the application
///
/// Holds the workspace connection settings together with the knobs used by
/// the HTTP client (timeouts, retries, rate limits) and the sync pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace host, e.g. `adb-1234567890123456.7.azuredatabricks.net`
    pub host: Option<String>,
    /// Personal access token used as bearer credential
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Total attempts per request, first one included; transient failures are
    /// retried until this budget is spent
    pub max_retries: u32,
    /// Base delay between retries in milliseconds, multiplied by the attempt number
    pub retry_delay_ms: u64,
    /// Client-side request budget per minute
    pub requests_per_minute: usize,
    /// How long `get-status` answers stay cached, in seconds; 0 disables caching
    pub status_cache_ttl_secs: u64,
    /// Upper bound on concurrent imports during a sync
    pub max_concurrent_imports: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            token: None,
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 500,
            requests_per_minute: 300,
            status_cache_ttl_secs: 30,
            max_concurrent_imports: 4,
        }
    }
}

impl Config {
    /// Creates a configuration for the given host and token with default settings
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| WorkspaceError::Config("Could not find config directory".into()))?;
        Ok(config_dir.join("dbrx-api-tool").join("config.toml"))
    }

    /// Loads configuration from `path`, or from `DBRX_CONFIG_FILE`, or from the
    /// default config file location, then applies environment overrides.
    ///
    /// A missing config file is not an error; defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => match get_env_value(CONFIG_FILE_ENV) {
                Some(p) => PathBuf::from(p),
                None => Self::default_path()?,
            },
        };

        let mut config = Self::from_file(&config_path)?;
        config.apply_credentials(Credentials::from_env());
        Ok(config)
    }

    /// Reads a TOML config file, returning defaults when it does not exist
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| WorkspaceError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| WorkspaceError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Writes the configuration as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| WorkspaceError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| WorkspaceError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| WorkspaceError::Config(format!("Failed to write config: {}", e)))
    }

    /// Overrides host and token with any values present in `credentials`
    pub fn apply_credentials(&mut self, credentials: Credentials) {
        if let Some(host) = credentials.host {
            self.host = Some(host);
        }
        if let Some(token) = credentials.token {
            self.token = Some(token);
        }
    }

    /// Validates that the settings are usable for talking to a workspace
    pub fn validate(&self) -> Result<()> {
        self.host()?;
        self.token()?;
        if self.max_retries == 0 {
            return Err(WorkspaceError::Config("max_retries must be at least 1".into()));
        }
        if self.requests_per_minute == 0 {
            return Err(WorkspaceError::Config("requests_per_minute must be at least 1".into()));
        }
        if self.max_concurrent_imports == 0 {
            return Err(WorkspaceError::Config("max_concurrent_imports must be at least 1".into()));
        }
        Ok(())
    }

    /// Retrieves the configured host
    pub fn host(&self) -> Result<&str> {
        match self.host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => Ok(host),
            _ => Err(WorkspaceError::Config(format!(
                "Workspace host not configured (set {} or pass --host)",
                HOST_ENV
            ))),
        }
    }

    /// Retrieves the configured token
    pub fn token(&self) -> Result<&str> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(WorkspaceError::Auth(format!(
                "Access token not configured (set {} or pass --token)",
                TOKEN_ENV
            ))),
        }
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base delay between retries
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Lifetime of cached status lookups
    pub fn status_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.status_cache_ttl_secs)
    }
}
