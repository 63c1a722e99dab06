use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for SolarScope
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SolarScopeConfig {
    /// Vision model endpoint used for rooftop analysis
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Constants fed into the energy and financial formulas
    #[serde(default)]
    pub parameters: SolarParameters,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OpenAI-compatible chat completions endpoint that accepts images
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceConfig {
    /// Base URL for the API (e.g., "https://openrouter.ai/api/v1")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Multimodal model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer credential; requests are sent unauthenticated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after a failed request (0 = single attempt)
    #[serde(default)]
    pub max_retries: u32,

    /// Sent as `HTTP-Referer` for OpenRouter app attribution
    #[serde(default)]
    pub app_url: Option<String>,

    /// Sent as `X-Title` for OpenRouter app attribution
    #[serde(default)]
    pub app_title: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            app_url: None,
            app_title: None,
        }
    }
}

impl InferenceConfig {
    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}

/// Formula constants. Orientation is not an input to any of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SolarParameters {
    /// Fraction of incident energy converted by the panels
    #[serde(default = "default_panel_efficiency")]
    pub panel_efficiency: f64,

    /// Average daily insolation at the site, kWh/m²/day
    #[serde(default = "default_insolation")]
    pub insolation: f64,

    /// Insolation used to size the system from its yearly output
    #[serde(default = "default_insolation")]
    pub reference_insolation: f64,

    /// Installed cost in currency units per watt
    #[serde(default = "default_cost_per_watt")]
    pub cost_per_watt: f64,

    /// Share of the cost covered by incentives, in [0, 1)
    #[serde(default = "default_incentive_fraction")]
    pub incentive_fraction: f64,

    /// Price of grid electricity per kWh
    #[serde(default = "default_electricity_rate")]
    pub electricity_rate: f64,
}

impl Default for SolarParameters {
    fn default() -> Self {
        Self {
            panel_efficiency: default_panel_efficiency(),
            insolation: default_insolation(),
            reference_insolation: default_insolation(),
            cost_per_watt: default_cost_per_watt(),
            incentive_fraction: default_incentive_fraction(),
            electricity_rate: default_electricity_rate(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Level name (off, error, warn, info, debug, trace) or RUST_LOG directives
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_model() -> String {
    "opengvlab/internvl3-14b:free".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_panel_efficiency() -> f64 {
    0.20
}
fn default_insolation() -> f64 {
    5.0
}
fn default_cost_per_watt() -> f64 {
    3.0
}
fn default_incentive_fraction() -> f64 {
    0.3
}
fn default_electricity_rate() -> f64 {
    0.12
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with file discovery and environment overrides
pub struct ConfigManager {
    config: SolarScopeConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.solarscope.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Same as [`ConfigManager::load`], but an explicit path replaces file discovery.
    pub fn load_with(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        info!("Loading SolarScope configuration...");

        Self::load_dotenv();

        let (config, config_path) = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                (Self::read_toml_file(path)?, Some(path.to_path_buf()))
            }
            None => Self::load_config_file()?,
        };

        let config = Self::apply_env_overrides(config);

        Self::validate_config(&config)?;

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Log what was loaded. Call once a subscriber is installed; loading
    /// usually happens before logging is configured.
    pub fn log_summary(&self) {
        info!("Configuration loaded");
        if let Some(ref path) = self.config_path {
            info!("   Config file: {}", path.display());
        } else {
            info!("   Config file: NONE (using defaults)");
        }
        info!("   Inference endpoint: {}", self.config.inference.base_url);
        info!("   Vision model: {}", self.config.inference.model);
        for warning in self.warnings() {
            warn!("{}", warning);
        }
    }

    /// Problems that do not fail validation but will likely fail a request.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.config.inference.api_key.is_none() {
            warnings.push(
                "No API key configured (set OPENROUTER_API_KEY or SOLARSCOPE_API_KEY); requests will be sent unauthenticated"
                    .to_string(),
            );
        }
        warnings
    }

    /// Build a manager around an already-assembled config (validation still applies).
    pub fn from_config(config: SolarScopeConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            } else {
                info!("Loaded .env file from current directory");
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".solarscope.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .solarscope.env: {}", e);
                } else {
                    info!("Loaded .solarscope.env from home directory");
                }
            }
        }
    }

    /// Find and load config file
    /// Search order:
    /// 1. ./.solarscope.toml (current directory)
    /// 2. ~/.solarscope/config.toml (user config)
    /// 3. Use defaults
    fn load_config_file() -> Result<(SolarScopeConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".solarscope.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        info!("No config file found, using defaults");
        Ok((SolarScopeConfig::default(), None))
    }

    /// `~/.solarscope/config.toml`, if a home directory is known
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".solarscope").join("config.toml"))
    }

    /// Read TOML config file
    pub fn read_toml_file(path: &Path) -> Result<SolarScopeConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(config: SolarScopeConfig) -> SolarScopeConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; unparsable numeric values are ignored.
    pub fn apply_overrides<F>(mut config: SolarScopeConfig, lookup: F) -> SolarScopeConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        // Inference configuration
        if let Some(key) = lookup("SOLARSCOPE_API_KEY").or_else(|| lookup("OPENROUTER_API_KEY"))
        {
            config.inference.api_key = Some(key);
        }
        if let Some(url) = lookup("SOLARSCOPE_BASE_URL") {
            config.inference.base_url = url;
        }
        if let Some(model) = lookup("SOLARSCOPE_MODEL") {
            config.inference.model = model;
        }
        if let Some(timeout) = lookup("SOLARSCOPE_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.inference.timeout_secs = secs;
            }
        }
        if let Some(retries) = lookup("SOLARSCOPE_MAX_RETRIES") {
            if let Ok(n) = retries.parse() {
                config.inference.max_retries = n;
            }
        }

        // Formula parameters
        if let Some(insolation) = lookup("SOLARSCOPE_INSOLATION") {
            if let Ok(value) = insolation.parse() {
                config.parameters.insolation = value;
            }
        }
        if let Some(rate) = lookup("SOLARSCOPE_ELECTRICITY_RATE") {
            if let Ok(value) = rate.parse() {
                config.parameters.electricity_rate = value;
            }
        }

        // Logging
        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }

        config
    }

    /// Validate configuration
    pub fn validate_config(config: &SolarScopeConfig) -> Result<(), ConfigError> {
        let inference = &config.inference;
        if inference.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "inference.base_url must not be empty".to_string(),
            ));
        }
        if inference.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "inference.model must not be empty".to_string(),
            ));
        }
        if inference.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "inference.timeout_secs must be at least 1".to_string(),
            ));
        }

        let params = &config.parameters;
        if !(params.panel_efficiency > 0.0 && params.panel_efficiency <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid panel efficiency: {}. Must be in (0, 1]",
                params.panel_efficiency
            )));
        }
        if !(0.0..1.0).contains(&params.incentive_fraction) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid incentive fraction: {}. Must be in [0, 1)",
                params.incentive_fraction
            )));
        }
        for (name, value) in [
            ("insolation", params.insolation),
            ("reference_insolation", params.reference_insolation),
            ("cost_per_watt", params.cost_per_watt),
            ("electricity_rate", params.electricity_rate),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid {}: {}. Must be a positive number",
                    name, value
                )));
            }
        }

        if !is_log_directive(&config.logging.level) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {:?}. Use a level (off, error, warn, info, debug, trace) or RUST_LOG directives",
                config.logging.level
            )));
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &SolarScopeConfig {
        &self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = SolarScopeConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

/// Levels match case-insensitively; anything else is handed to the subscriber's
/// `EnvFilter` as RUST_LOG directives (`solarscope_ai`, `info,reqwest=warn`).
fn is_log_directive(level: &str) -> bool {
    let level = level.trim();
    if level.is_empty() {
        return false;
    }
    if level.parse::<LevelFilter>().is_ok() {
        return true;
    }
    level.split(',').all(|directive| {
        let directive = directive.trim();
        !directive.is_empty() && !directive.contains(char::is_whitespace)
    })
}
