//! The aggregated monthly P&L row.

use crate::model::{Amount, PeriodKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One aggregated P&L row per (location, year, month).
///
/// Cost totals are stored as positive magnitudes; `resultaat` is always
/// derived from the other seven columns, never read from the raw data.
/// The row is fully overwritten on every aggregation run, so a re-run over
/// unchanged raw data reproduces it exactly.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPeriod {
    pub location_id: String,
    pub year: i32,
    pub month: u32,
    pub revenue_total: Amount,
    pub cost_of_sales_total: Amount,
    pub labor_total: Amount,
    pub depreciation_total: Amount,
    pub other_costs_total: Amount,
    pub receivables_income: Amount,
    pub financial_income_expense: Amount,
    pub resultaat: Amount,
}

impl AggregatedPeriod {
    pub fn key(&self) -> PeriodKey {
        PeriodKey::new(self.location_id.clone(), self.year, self.month)
    }
}

/// The canonical resultaat formula.
///
/// Cost arguments are positive magnitudes; financial income/expense keeps its
/// sign (an expense-heavy month is negative).
#[allow(clippy::too_many_arguments)]
pub fn resultaat(
    revenue: Decimal,
    cost_of_sales: Decimal,
    labor: Decimal,
    depreciation: Decimal,
    other_costs: Decimal,
    receivables_income: Decimal,
    financial_income_expense: Decimal,
) -> Decimal {
    revenue - cost_of_sales - labor - depreciation - other_costs
        + receivables_income
        + financial_income_expense
}
