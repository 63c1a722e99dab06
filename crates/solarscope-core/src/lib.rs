pub mod config_manager;
pub mod error;
pub mod formulas;
pub mod image;
pub mod normalizer;
pub mod recommendations;
pub mod report;
pub mod types;

pub use config_manager::{
    ConfigError, ConfigManager, InferenceConfig, LoggingConfig, SolarParameters, SolarScopeConfig,
};
pub use error::{ImageError, NormalizeError};
pub use formulas::{
    estimate_energy, estimate_energy_with, estimate_financials, estimate_financials_with,
};
pub use image::{ImageFormat, RooftopImage};
pub use normalizer::{normalize, try_normalize, ResponseShape};
pub use recommendations::{recommendations, Recommendation};
pub use report::SolarReport;
pub use types::*;
