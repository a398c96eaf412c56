//! Classifies a raw ledger line into one of the eight P&L buckets.
//!
//! The classifier is an ordered keyword match over the Dutch accounting
//! texts on a line (category, subcategory and GL account name). The first
//! matching rule wins, and the rule order carries meaning: cost-of-sales is
//! checked before revenue because "Kostprijs van de omzet" contains "omzet",
//! and receivables income is checked before both because "Opbrengst van
//! vorderingen" contains "opbrengst".
//!
//! The function is total: a line that matches nothing falls through to the
//! catch-all cost bucket. That is a policy choice, not an error.

use crate::model::Bucket;

/// Maps a line's category/subcategory/GL account texts to a bucket.
///
/// Matching is case-insensitive and runs over the three texts joined
/// together, so a keyword may live in any of them.
pub fn classify(category: &str, subcategory: Option<&str>, gl_account: &str) -> Bucket {
    let haystack = format!(
        "{} {} {}",
        category,
        subcategory.unwrap_or(""),
        gl_account
    )
    .to_lowercase();

    if haystack.contains("opbrengst") && haystack.contains("vordering") {
        return Bucket::ReceivablesIncome;
    }
    // Before the revenue rule: "kostprijs van de omzet" contains "omzet".
    if haystack.contains("kostprijs") || haystack.contains("inkoop") {
        return Bucket::CostOfSales;
    }
    if haystack.contains("netto-omzet")
        || haystack.contains("omzet")
        || haystack.contains("opbrengst")
    {
        return Bucket::Revenue;
    }
    if haystack.contains("lonen")
        || haystack.contains("salaris")
        || haystack.contains("arbeid")
        || haystack.contains("personeel")
        || haystack.contains("sociale lasten")
    {
        return Bucket::Labor;
    }
    if haystack.contains("afschrijving") {
        return Bucket::Depreciation;
    }
    // "financi" covers both "financieel" and "financiële".
    if haystack.contains("financi") || haystack.contains("rente") {
        return Bucket::FinancialIncomeExpense;
    }
    if haystack.contains("resultaat") {
        return Bucket::NetResult;
    }
    Bucket::OtherCosts
}
