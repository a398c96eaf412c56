//! Raw general-ledger line items and the period key they aggregate under.

use crate::model::Amount;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identifies one aggregation period: a location and a calendar month.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub location_id: String,
    pub year: i32,
    pub month: u32,
}

impl PeriodKey {
    pub fn new(location_id: impl Into<String>, year: i32, month: u32) -> Self {
        Self {
            location_id: location_id.into(),
            year,
            month,
        }
    }
}

impl Display for PeriodKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}-{:02}", self.location_id, self.year, self.month)
    }
}

/// A single general-ledger line item as stored by the import.
///
/// Sign convention follows the upstream export: revenue-like categories carry
/// positive amounts, cost-like categories negative ones. Lines are immutable
/// once imported and only superseded by a re-import of their period.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RawLedgerLine {
    pub location_id: String,
    pub year: i32,
    pub month: u32,
    /// Top-level accounting category, e.g. "Netto-omzet".
    pub category: String,
    /// Optional second-level category.
    pub subcategory: Option<String>,
    /// General-ledger account name or code, e.g. "8000 Omzet keuken".
    pub gl_account: String,
    pub amount: Amount,
    /// Identifies the import run that produced this line.
    pub import_id: String,
}

impl RawLedgerLine {
    pub fn key(&self) -> PeriodKey {
        PeriodKey::new(self.location_id.clone(), self.year, self.month)
    }
}

// "location_id","year","month","category","subcategory","gl_account","amount"
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct CsvLedgerRecord {
    pub(crate) location_id: String,
    pub(crate) year: i32,
    pub(crate) month: u32,
    pub(crate) category: String,
    #[serde(default)]
    pub(crate) subcategory: String,
    pub(crate) gl_account: String,
    pub(crate) amount: Amount,
}

impl CsvLedgerRecord {
    /// Converts the CSV record into a ledger line tagged with `import_id`.
    /// An empty subcategory cell becomes `None`.
    pub(crate) fn into_line(self, import_id: &str) -> RawLedgerLine {
        let subcategory = if self.subcategory.trim().is_empty() {
            None
        } else {
            Some(self.subcategory)
        };
        RawLedgerLine {
            location_id: self.location_id,
            year: self.year,
            month: self.month,
            category: self.category,
            subcategory,
            gl_account: self.gl_account,
            amount: self.amount,
            import_id: import_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_period_key_display() {
        let key = PeriodKey::new("van-woustraat", 2024, 3);
        assert_eq!(key.to_string(), "van-woustraat 2024-03");
    }

    #[test]
    fn test_csv_record_into_line() {
        let record = CsvLedgerRecord {
            location_id: "centrum".to_string(),
            year: 2024,
            month: 7,
            category: "Netto-omzet".to_string(),
            subcategory: "  ".to_string(),
            gl_account: "8000 Omzet keuken".to_string(),
            amount: Amount::from_str("1250.00").unwrap(),
        };
        let line = record.into_line("import-1");
        assert_eq!(line.subcategory, None);
        assert_eq!(line.import_id, "import-1");
        assert_eq!(line.key(), PeriodKey::new("centrum", 2024, 7));
    }

    #[test]
    fn test_csv_parse() {
        let data = "location_id,year,month,category,subcategory,gl_account,amount\n\
                    centrum,2024,7,Netto-omzet,,8000 Omzet keuken,1250.00\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let records: Vec<CsvLedgerRecord> =
            reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, "Netto-omzet");
        assert!(records[0].amount.is_positive());
    }
}
