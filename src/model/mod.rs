//! Data types shared across the pipeline.

mod amount;
mod bucket;
mod ledger;
mod period;

pub use amount::Amount;
pub use bucket::Bucket;
pub(crate) use ledger::CsvLedgerRecord;
pub use ledger::{PeriodKey, RawLedgerLine};
pub use period::{resultaat, AggregatedPeriod};
