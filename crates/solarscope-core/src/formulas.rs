//! Closed-form energy and payback estimates.
//!
//! Rounding is applied once, at the end of each function, so intermediate
//! values keep full precision (payback is derived from the unrounded cost).

use crate::config_manager::SolarParameters;
use crate::types::{EnergyEstimate, FinancialEstimate, PaybackPeriod, RooftopAnalysis};

pub const DAYS_PER_YEAR: f64 = 365.0;

/// Yearly production for a rooftop using the configured insolation and efficiency.
pub fn estimate_energy(record: &RooftopAnalysis, params: &SolarParameters) -> EnergyEstimate {
    estimate_energy_with(record, params.insolation, params.panel_efficiency)
}

/// `orientation_deg` is deliberately not part of the formula.
pub fn estimate_energy_with(
    record: &RooftopAnalysis,
    insolation: f64,
    panel_efficiency: f64,
) -> EnergyEstimate {
    let usable_area_m2 = record.area_m2 * (1.0 - record.shading_percent / 100.0);
    let annual_kwh = usable_area_m2 * insolation * DAYS_PER_YEAR * panel_efficiency;

    EnergyEstimate {
        usable_area_m2,
        annual_kwh: round_to(annual_kwh, 2),
    }
}

pub fn estimate_financials(annual_kwh: f64, params: &SolarParameters) -> FinancialEstimate {
    estimate_financials_with(
        annual_kwh,
        params.cost_per_watt,
        params.incentive_fraction,
        params.electricity_rate,
        params.reference_insolation,
    )
}

pub fn estimate_financials_with(
    annual_kwh: f64,
    cost_per_watt: f64,
    incentive_fraction: f64,
    electricity_rate: f64,
    reference_insolation: f64,
) -> FinancialEstimate {
    let system_size_w = annual_kwh / (reference_insolation * DAYS_PER_YEAR) * 1000.0;
    let total_cost = system_size_w * cost_per_watt;
    let cost_after_incentive = total_cost * (1.0 - incentive_fraction);

    let annual_revenue = annual_kwh * electricity_rate;
    let payback = if annual_revenue > 0.0 && annual_revenue.is_finite() {
        let years = cost_after_incentive / annual_revenue;
        if years.is_finite() {
            PaybackPeriod::Years(round_to(years, 1))
        } else {
            PaybackPeriod::NotApplicable
        }
    } else {
        PaybackPeriod::NotApplicable
    };

    FinancialEstimate {
        system_size_w,
        total_cost,
        cost_after_incentive: round_to(cost_after_incentive, 2),
        payback,
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
