//! Compares aggregated P&L rows against accountant-provided expected
//! figures and reports the deltas. Read-only: the report carries no
//! remediation, only output.

use crate::model::{AggregatedPeriod, Amount};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

/// Default acceptable deviation between aggregated and expected figures.
pub const DEFAULT_TOLERANCE_PCT: &str = "2.5";

/// One expected-figures row, as provided by the accountant.
// "year","month","revenue","resultaat"
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExpectedFigure {
    pub year: i32,
    pub month: u32,
    pub revenue: Amount,
    pub resultaat: Amount,
}

/// Loads expected figures from a CSV file.
pub fn load_expected(path: &Path) -> Result<Vec<ExpectedFigure>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open expected figures at {}", path.display()))?;
    let mut figures = Vec::new();
    for record in reader.deserialize() {
        let figure: ExpectedFigure =
            record.with_context(|| format!("Invalid expected row in {}", path.display()))?;
        figures.push(figure);
    }
    Ok(figures)
}

/// How far a month's figures are from the expected ones.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Both deltas are exactly zero.
    Exact,
    /// The worst delta is within the tolerance.
    Acceptable,
    /// The worst delta exceeds the tolerance.
    Major,
}

serde_plain::derive_display_from_serialize!(Verdict);
serde_plain::derive_fromstr_from_deserialize!(Verdict);

/// The comparison for a single month.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MonthDelta {
    pub month: u32,
    pub expected_revenue: Amount,
    pub actual_revenue: Amount,
    pub revenue_delta: Amount,
    /// Absolute percentage deviation of revenue from expected.
    pub revenue_delta_pct: Decimal,
    pub expected_resultaat: Amount,
    pub actual_resultaat: Amount,
    pub resultaat_delta: Amount,
    /// Absolute percentage deviation of resultaat from expected.
    pub resultaat_delta_pct: Decimal,
    pub verdict: Verdict,
}

/// The full report for one location and year.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub location_id: String,
    pub year: i32,
    pub tolerance_pct: Decimal,
    pub months: Vec<MonthDelta>,
    /// Expected months for which no aggregated row exists.
    pub missing: Vec<u32>,
    pub exact: usize,
    pub acceptable: usize,
    pub major: usize,
    pub generated_at: DateTime<Utc>,
}

impl ReconcileReport {
    /// Renders the per-month lines plus the portfolio summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Reconciliation for {} {} (tolerance {}%)",
            self.location_id, self.year, self.tolerance_pct
        );
        for m in &self.months {
            let _ = writeln!(
                out,
                "  {:02}: revenue {} vs {} ({}%), resultaat {} vs {} ({}%) -> {}",
                m.month,
                m.actual_revenue,
                m.expected_revenue,
                m.revenue_delta_pct.round_dp(2),
                m.actual_resultaat,
                m.expected_resultaat,
                m.resultaat_delta_pct.round_dp(2),
                m.verdict
            );
        }
        for month in &self.missing {
            let _ = writeln!(out, "  {month:02}: no aggregated row");
        }
        let _ = write!(
            out,
            "  Summary: {} exact, {} acceptable, {} major, {} missing",
            self.exact,
            self.acceptable,
            self.major,
            self.missing.len()
        );
        out
    }
}

/// Compares expected figures against the aggregated rows for one location
/// and year. `actuals` is keyed by month.
pub fn compare(
    location_id: &str,
    year: i32,
    expected: &[ExpectedFigure],
    actuals: &BTreeMap<u32, AggregatedPeriod>,
    tolerance_pct: Decimal,
) -> ReconcileReport {
    let mut months = Vec::new();
    let mut missing = Vec::new();
    let mut exact = 0;
    let mut acceptable = 0;
    let mut major = 0;

    for figure in expected.iter().filter(|f| f.year == year) {
        let Some(actual) = actuals.get(&figure.month) else {
            missing.push(figure.month);
            continue;
        };

        let revenue_delta = actual.revenue_total.value() - figure.revenue.value();
        let resultaat_delta = actual.resultaat.value() - figure.resultaat.value();
        let revenue_delta_pct = delta_pct(revenue_delta, figure.revenue.value());
        let resultaat_delta_pct = delta_pct(resultaat_delta, figure.resultaat.value());

        let worst = revenue_delta_pct.max(resultaat_delta_pct);
        let verdict = if revenue_delta.is_zero() && resultaat_delta.is_zero() {
            exact += 1;
            Verdict::Exact
        } else if worst <= tolerance_pct {
            acceptable += 1;
            Verdict::Acceptable
        } else {
            major += 1;
            Verdict::Major
        };

        months.push(MonthDelta {
            month: figure.month,
            expected_revenue: figure.revenue,
            actual_revenue: actual.revenue_total,
            revenue_delta: Amount::new(revenue_delta),
            revenue_delta_pct,
            expected_resultaat: figure.resultaat,
            actual_resultaat: actual.resultaat,
            resultaat_delta: Amount::new(resultaat_delta),
            resultaat_delta_pct,
            verdict,
        });
    }

    ReconcileReport {
        location_id: location_id.to_string(),
        year,
        tolerance_pct,
        months,
        missing,
        exact,
        acceptable,
        major,
        generated_at: Utc::now(),
    }
}

/// Absolute percentage deviation. A non-zero delta against a zero expected
/// value cannot be expressed as a ratio and is pinned at 100% (always a
/// major mismatch).
fn delta_pct(delta: Decimal, expected: Decimal) -> Decimal {
    if expected.is_zero() {
        if delta.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE_HUNDRED
        }
    } else {
        (delta / expected * Decimal::ONE_HUNDRED).abs()
    }
}

/// Parses the tolerance given on the command line.
pub fn parse_tolerance(s: &str) -> std::result::Result<Decimal, String> {
    Decimal::from_str(s).map_err(|e| format!("Invalid tolerance '{s}': {e}"))
}
