use crate::config_manager::SolarParameters;
use crate::formulas::{estimate_energy, estimate_financials};
use crate::recommendations::{recommendations, Recommendation};
use crate::types::{AnalysisOutcome, EnergyEstimate, FinancialEstimate};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything derived for one rooftop in a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarReport {
    pub outcome: AnalysisOutcome,
    pub energy: EnergyEstimate,
    pub financials: FinancialEstimate,
    pub recommendations: Vec<Recommendation>,
    pub parameters: SolarParameters,
}

impl SolarReport {
    pub fn build(outcome: AnalysisOutcome, params: &SolarParameters) -> Self {
        let energy = estimate_energy(&outcome.analysis, params);
        let financials = estimate_financials(energy.annual_kwh, params);
        let recommendations = recommendations(&outcome.analysis, params);

        info!(
            "Estimated {} kWh/year, payback {}",
            energy.annual_kwh, financials.payback
        );

        Self {
            outcome,
            energy,
            financials,
            recommendations,
            parameters: *params,
        }
    }
}
