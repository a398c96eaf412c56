use serde::{Deserialize, Serialize};

/// The eight fixed P&L buckets that every raw ledger line rolls into.
///
/// Four of them are cost buckets whose aggregated totals are stored as
/// positive magnitudes; `NetResult` marks rollup lines that some ledger
/// exports carry and is never summed into a stored total.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Netto-omzet: revenue.
    Revenue,
    /// Kostprijs van de omzet: cost of goods/services sold.
    CostOfSales,
    /// Lonen, salarissen, sociale lasten: labor costs.
    Labor,
    /// Afschrijvingen: depreciation.
    Depreciation,
    /// Overige bedrijfskosten: the catch-all cost bucket.
    OtherCosts,
    /// Opbrengst van vorderingen: receivables income.
    ReceivablesIncome,
    /// Financiële baten en lasten: financial income and expense.
    FinancialIncomeExpense,
    /// Resultaat: a pre-computed net-result rollup line from the export.
    NetResult,
}

serde_plain::derive_display_from_serialize!(Bucket);
serde_plain::derive_fromstr_from_deserialize!(Bucket);

impl Bucket {
    /// True for the buckets whose summed (negative) raw amounts are stored
    /// as positive cost magnitudes.
    pub fn is_cost(&self) -> bool {
        matches!(
            self,
            Bucket::CostOfSales | Bucket::Labor | Bucket::Depreciation | Bucket::OtherCosts
        )
    }
}
