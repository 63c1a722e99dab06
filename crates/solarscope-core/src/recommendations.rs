use crate::config_manager::SolarParameters;
use crate::types::RooftopAnalysis;
use serde::{Deserialize, Serialize};

/// Footprint assumed for a single panel
pub const PANEL_AREA_M2: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub label: String,
    pub detail: String,
}

impl Recommendation {
    fn new(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            detail: detail.into(),
        }
    }
}

pub fn panel_count(record: &RooftopAnalysis) -> u64 {
    (record.area_m2 / PANEL_AREA_M2).floor().max(0.0) as u64
}

/// Installation guidance shown alongside the estimates.
pub fn recommendations(record: &RooftopAnalysis, params: &SolarParameters) -> Vec<Recommendation> {
    vec![
        Recommendation::new(
            "Panel Type",
            format!(
                "Monocrystalline ({:.0}% efficiency)",
                params.panel_efficiency * 100.0
            ),
        ),
        Recommendation::new(
            "Number of Panels",
            format!(
                "~{} ({}m² per panel)",
                panel_count(record),
                PANEL_AREA_M2
            ),
        ),
        Recommendation::new("Mounting", "Flush mount, south-facing"),
        Recommendation::new("Maintenance", "Annual cleaning, monitor via app"),
        Recommendation::new(
            "Compliance",
            "Follow NEC 2020 standards, check local net metering policies",
        ),
    ]
}
