//! Immutable engine settings, built once at startup from configuration.

use crate::domain::bonus::BonusTiers;
use crate::domain::cities::CityTable;

/// Read-only configuration shared by every report run.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Operators on payroll.
    pub roster: Vec<String>,
    pub cities: CityTable,
    pub tiers: BonusTiers,
    /// Salary per order for an operator.
    pub order_fee: f64,
    /// Salary per department order for the head.
    pub head_rate: f64,
    pub head_name: String,
    /// Minimum personal conversion (ratio) an operator must exceed to get a bonus.
    pub min_conversion_grade: f64,
    /// Depth of the call history used for caller deduplication.
    pub history_days: u32,
}

/// Map a raw operator name onto the roster (case-insensitive substring), or keep it.
pub fn normalize_operator_name(name: &str, roster: &[String]) -> String {
    let lower = name.to_lowercase();
    roster
        .iter()
        .find(|o| lower.contains(&o.to_lowercase()))
        .cloned()
        .unwrap_or_else(|| name.to_string())
}
