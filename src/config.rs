use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::page::PageContext;

/// Main sitelog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    pub paths: PathsConfig,
    pub logger: LoggerConfig,
    pub page: PageConfig,
}

/// Diagnostic log level for sitelog's own log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory backing the key-value storage
    pub storage: PathBuf,
    /// Default directory for exported logs
    pub exports: PathBuf,
}

/// Delivery profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Batch entries to the endpoint, mirror to console on debug or local hosts
    #[default]
    Batched,
    /// Never send; mirror every entry to the console immediately
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Remote collection URL; absent disables sending
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Tag attached to every entry
    pub site_id: Option<String>,
    pub track_page_views: bool,
    pub flush_interval_ms: u64,
    pub max_batch_size: usize,
    /// Mirror entries to the console regardless of hostname
    pub debug_mode: bool,
    pub profile: Profile,
}

/// Overrides merged over a resolved [`LoggerConfig`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggerOverrides {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub site_id: Option<String>,
    pub track_page_views: Option<bool>,
    pub flush_interval_ms: Option<u64>,
    pub max_batch_size: Option<usize>,
    pub debug_mode: Option<bool>,
    pub profile: Option<Profile>,
}

/// Static description of the page the host reports
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PageConfig {
    /// Defaults to `$HOSTNAME`, else `localhost`. A local host turns on console
    /// mirroring, so set this for quiet CLI runs.
    pub hostname: String,
    pub path: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
}

pub const MIN_FLUSH_INTERVAL_MS: u64 = 100;

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            paths: PathsConfig::default(),
            logger: LoggerConfig::default(),
            page: PageConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let sitelog_dir = Config::sitelog_dir();

        Self {
            storage: sitelog_dir.join("storage"),
            exports: sitelog_dir.join("exports"),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            site_id: None,
            track_page_views: true,
            flush_interval_ms: 30_000,
            max_batch_size: 20,
            debug_mode: false,
            profile: Profile::Batched,
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
            path: "/".to_string(),
            referrer: None,
            user_agent: None,
        }
    }
}

impl LoggerConfig {
    /// Merge `overrides` over this config and normalize the result
    pub fn merged(&self, overrides: &LoggerOverrides) -> Self {
        let mut config = self.clone();
        if let Some(ref endpoint) = overrides.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if let Some(ref api_key) = overrides.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(ref site_id) = overrides.site_id {
            config.site_id = Some(site_id.clone());
        }
        if let Some(track) = overrides.track_page_views {
            config.track_page_views = track;
        }
        if let Some(interval) = overrides.flush_interval_ms {
            config.flush_interval_ms = interval;
        }
        if let Some(size) = overrides.max_batch_size {
            config.max_batch_size = size;
        }
        if let Some(debug) = overrides.debug_mode {
            config.debug_mode = debug;
        }
        if let Some(profile) = overrides.profile {
            config.profile = profile;
        }
        config.normalized()
    }

    /// Clamp values that would stall delivery and drop blank endpoints
    pub fn normalized(mut self) -> Self {
        self.max_batch_size = self.max_batch_size.max(1);
        self.flush_interval_ms = self.flush_interval_ms.max(MIN_FLUSH_INTERVAL_MS);
        if self.endpoint.as_deref().is_some_and(|e| e.trim().is_empty()) {
            self.endpoint = None;
        }
        self
    }

    /// Endpoint used for delivery; the local profile never sends
    pub fn delivery_endpoint(&self) -> Option<&str> {
        match self.profile {
            Profile::Batched => self.endpoint.as_deref(),
            Profile::Local => None,
        }
    }
}

impl PageConfig {
    pub fn to_context(&self) -> PageContext {
        let defaults = PageContext::default();
        PageContext {
            hostname: self.hostname.clone(),
            path: self.path.clone(),
            referrer: self.referrer.clone(),
            screen: None,
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Check SITELOG_CONFIG env var
        if let Ok(env_path) = std::env::var("SITELOG_CONFIG") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from SITELOG_CONFIG: {}", e);
                    }
                }
            }
        }

        // Try SITELOG_DIR/sitelog.yaml
        if let Ok(sitelog_dir) = std::env::var("SITELOG_DIR") {
            let path = PathBuf::from(sitelog_dir).join("sitelog.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from SITELOG_DIR: {}", e);
                    }
                }
            }
        }

        // Try ~/.config/sitelog/sitelog.yaml
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("sitelog").join("sitelog.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        // Try ./sitelog.yaml (for development)
        let local_config = PathBuf::from("sitelog.yaml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load local config: {}", e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Get the sitelog directory (storage, exports and logs live here)
    pub fn sitelog_dir() -> PathBuf {
        std::env::var("SITELOG_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sitelog")
        })
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}
