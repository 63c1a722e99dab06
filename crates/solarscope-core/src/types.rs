use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical rooftop description used by every downstream computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RooftopAnalysis {
    /// Suitable rooftop area in square metres (> 0)
    pub area_m2: f64,
    /// Azimuth the roof faces, degrees in [0, 360)
    pub orientation_deg: f64,
    /// Share of the roof in shade, percent in [0, 100]
    pub shading_percent: f64,
    pub obstructions: Vec<String>,
}

impl RooftopAnalysis {
    pub const PLACEHOLDER_AREA_M2: f64 = 100.0;
    pub const PLACEHOLDER_ORIENTATION_DEG: f64 = 180.0;
    pub const PLACEHOLDER_SHADING_PERCENT: f64 = 10.0;

    /// Conservative stand-in used whenever no trustworthy model output exists.
    pub fn placeholder() -> Self {
        Self {
            area_m2: Self::PLACEHOLDER_AREA_M2,
            orientation_deg: Self::PLACEHOLDER_ORIENTATION_DEG,
            shading_percent: Self::PLACEHOLDER_SHADING_PERCENT,
            obstructions: vec!["chimney".to_string()],
        }
    }
}

impl Default for RooftopAnalysis {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Where a [`RooftopAnalysis`] came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Parsed from the vision model's answer
    Model,
    /// Placeholder data was substituted
    Placeholder { reason: String },
}

impl AnalysisSource {
    pub fn placeholder(reason: impl Into<String>) -> Self {
        AnalysisSource::Placeholder {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AnalysisSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisSource::Model => write!(f, "vision model"),
            AnalysisSource::Placeholder { reason } => write!(f, "placeholder data ({})", reason),
        }
    }
}

/// A canonical record together with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub analysis: RooftopAnalysis,
    pub source: AnalysisSource,
}

impl AnalysisOutcome {
    pub fn from_model(analysis: RooftopAnalysis) -> Self {
        Self {
            analysis,
            source: AnalysisSource::Model,
        }
    }

    pub fn placeholder(reason: impl Into<String>) -> Self {
        Self {
            analysis: RooftopAnalysis::placeholder(),
            source: AnalysisSource::placeholder(reason),
        }
    }

    pub fn used_placeholder(&self) -> bool {
        matches!(self.source, AnalysisSource::Placeholder { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyEstimate {
    /// Area left after subtracting the shaded share
    pub usable_area_m2: f64,
    /// Estimated yearly production, rounded to 2 decimals
    pub annual_kwh: f64,
}

/// Years until the system pays for itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "years", rename_all = "snake_case")]
pub enum PaybackPeriod {
    Years(f64),
    /// No production, so no revenue to recover the cost from
    NotApplicable,
}

impl PaybackPeriod {
    pub fn years(&self) -> Option<f64> {
        match self {
            PaybackPeriod::Years(years) => Some(*years),
            PaybackPeriod::NotApplicable => None,
        }
    }
}

impl fmt::Display for PaybackPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaybackPeriod::Years(years) => write!(f, "{} years", years),
            PaybackPeriod::NotApplicable => write!(f, "not applicable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialEstimate {
    pub system_size_w: f64,
    pub total_cost: f64,
    /// Cost once the incentive is applied, rounded to 2 decimals
    pub cost_after_incentive: f64,
    pub payback: PaybackPeriod,
}
