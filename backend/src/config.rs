//! Service configuration file support.
//!
//! Settings are read from a TOML file when one is found and fall back to
//! defaults otherwise. A few environment variables override the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "FORECAST_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub forecast: ForecastSettings,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    /// Candidate ports, tried in order until one binds.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

/// Forecasting limits and defaults applied to every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    #[serde(default = "default_interval_width")]
    pub interval_width: f64,
    #[serde(default = "default_max_future_periods")]
    pub max_future_periods: usize,
    /// Observed / expected points below which a demand request is rejected.
    #[serde(default = "default_min_density")]
    pub min_density: f64,
    /// Gaps wider than this many steps are reported.
    #[serde(default = "default_max_gap_steps")]
    pub max_gap_steps: u64,
    #[serde(default = "default_true")]
    pub render_plots: bool,
    #[serde(default = "default_plot_width")]
    pub plot_width: u32,
    #[serde(default = "default_plot_height")]
    pub plot_height: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_ports() -> Vec<u16> {
    vec![5001, 5002, 5000]
}

fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_interval_width() -> f64 {
    0.95
}

fn default_max_future_periods() -> usize {
    3650
}

fn default_min_density() -> f64 {
    0.7
}

fn default_max_gap_steps() -> u64 {
    7
}

fn default_true() -> bool {
    true
}

fn default_plot_width() -> u32 {
    1000
}

fn default_plot_height() -> u32 {
    600
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            ports: default_ports(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            interval_width: default_interval_width(),
            max_future_periods: default_max_future_periods(),
            min_density: default_min_density(),
            max_gap_steps: default_max_gap_steps(),
            render_plots: default_true(),
            plot_width: default_plot_width(),
            plot_height: default_plot_height(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration for the server binary.
    ///
    /// Uses the file named by `FORECAST_CONFIG` if set, otherwise the first
    /// `forecast.toml` found in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    ///
    /// Falls back to defaults when no file exists. Environment overrides are
    /// applied last.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// [`load`](Self::load) with variables read through `lookup`.
    pub fn load_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Self::from_default_location()?.unwrap_or_default(),
        };
        config.apply_env_overrides_from(lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn from_default_location() -> Result<Option<Self>, ConfigError> {
        let search_paths = [
            PathBuf::from("forecast.toml"),
            PathBuf::from("backend/forecast.toml"),
            PathBuf::from("../forecast.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                tracing::info!(path = %path.display(), "Loading configuration file");
                return Self::from_file(&path).map(Some);
            }
        }
        tracing::debug!("No forecast.toml found, using defaults");
        Ok(None)
    }

    /// Apply `HOST`, `PORT` and `FORECAST_MAX_PERIODS` from `lookup`.
    ///
    /// A `PORT` replaces the whole candidate list.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            let port = port.trim().parse::<u16>().map_err(|_| ConfigError::InvalidOverride {
                key: "PORT".to_string(),
                value: port.clone(),
            })?;
            self.server.ports = vec![port];
        }
        if let Some(periods) = lookup("FORECAST_MAX_PERIODS") {
            self.forecast.max_future_periods =
                periods
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOverride {
                        key: "FORECAST_MAX_PERIODS".to_string(),
                        value: periods.clone(),
                    })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.ports.is_empty() {
            return Err(ConfigError::Invalid("server.ports must not be empty".into()));
        }
        let f = &self.forecast;
        if !(f.interval_width > 0.0 && f.interval_width < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "forecast.interval_width must lie strictly between 0 and 1, got {}",
                f.interval_width
            )));
        }
        if f.max_future_periods == 0 {
            return Err(ConfigError::Invalid(
                "forecast.max_future_periods must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&f.min_density) {
            return Err(ConfigError::Invalid(format!(
                "forecast.min_density must lie in [0, 1], got {}",
                f.min_density
            )));
        }
        if f.plot_width == 0 || f.plot_height == 0 {
            return Err(ConfigError::Invalid("plot dimensions must be positive".into()));
        }
        Ok(())
    }
}
