//! Rolls raw ledger lines up into one `AggregatedPeriod` per period key.
//!
//! The aggregator reads from a paginated [`LedgerSource`] and writes to a
//! [`PeriodSink`]. The source paginates at a fixed page size, so the fetch
//! loop keeps requesting pages until a short page comes back; assuming one
//! response holds all rows silently drops data on large periods.
//!
//! In batch mode each key succeeds or fails on its own: an error for one key
//! is recorded in the summary and never aborts its siblings.

use crate::classify::classify;
use crate::model::{resultaat, AggregatedPeriod, Amount, Bucket, PeriodKey, RawLedgerLine};
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Page size of the raw line source.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// At most this many error messages are carried in a [`RunSummary`]; the
/// `failed` count is not capped.
pub const ERROR_CAP: usize = 10;

/// A paginated, read-only source of raw ledger lines.
#[async_trait]
pub trait LedgerSource {
    /// Fetches one page of lines for `key`, ordered stably. A page shorter
    /// than `limit` means the source is exhausted.
    async fn fetch_page(
        &self,
        key: &PeriodKey,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<RawLedgerLine>>;

    /// Returns every distinct period key present in the source, narrowed by
    /// the given filters.
    async fn distinct_keys(
        &self,
        location_id: Option<&str>,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Vec<PeriodKey>>;
}

/// A write-by-key sink for aggregated periods. An upsert fully overwrites
/// any prior row for the same key.
#[async_trait]
pub trait PeriodSink {
    async fn upsert_period(&self, period: &AggregatedPeriod) -> Result<()>;
}

/// Filters for batch aggregation. An empty scope means every key in the
/// source.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Scope {
    pub location_id: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Outcome of aggregating a single key.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum KeyOutcome {
    /// The aggregated row that was written.
    Written(AggregatedPeriod),
    /// The source held no lines for the key. Not an error.
    NoData,
}

/// What happened during an aggregation run, one count per key.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Per-key error messages, capped at [`ERROR_CAP`].
    pub errors: Vec<String>,
}

impl RunSummary {
    fn record_error(&mut self, message: String) {
        self.failed += 1;
        if self.errors.len() < ERROR_CAP {
            self.errors.push(message);
        }
    }

    /// Folds one key's outcome into the counts. Both entry points go through
    /// here so they cannot report the same outcome differently.
    fn record(&mut self, key: &PeriodKey, outcome: Result<KeyOutcome>) {
        self.processed += 1;
        match outcome {
            Ok(KeyOutcome::Written(_)) => self.succeeded += 1,
            Ok(KeyOutcome::NoData) => {
                debug!("No raw lines for {key}, skipping");
                self.skipped += 1;
            }
            Err(e) => {
                warn!("Aggregation failed for {key}: {e:#}");
                self.record_error(format!("{key}: {e:#}"));
            }
        }
    }

    /// One-line human summary, e.g. for the CLI.
    pub fn describe(&self) -> String {
        format!(
            "Aggregated {} period(s): {} succeeded, {} skipped (no data), {} failed",
            self.processed, self.succeeded, self.skipped, self.failed
        )
    }
}

/// Sums of signed raw amounts per bucket, accumulated while walking a key's
/// lines.
#[derive(Debug, Default)]
struct BucketTotals {
    revenue: Decimal,
    cost_of_sales: Decimal,
    labor: Decimal,
    depreciation: Decimal,
    other_costs: Decimal,
    receivables_income: Decimal,
    financial_income_expense: Decimal,
}

impl BucketTotals {
    fn add(&mut self, bucket: Bucket, amount: Decimal) {
        match bucket {
            Bucket::Revenue => self.revenue += amount,
            Bucket::CostOfSales => self.cost_of_sales += amount,
            Bucket::Labor => self.labor += amount,
            Bucket::Depreciation => self.depreciation += amount,
            Bucket::OtherCosts => self.other_costs += amount,
            Bucket::ReceivablesIncome => self.receivables_income += amount,
            Bucket::FinancialIncomeExpense => self.financial_income_expense += amount,
            // Pre-computed rollup lines from the export would double-count
            // the derived resultaat, so they are never summed.
            Bucket::NetResult => {
                debug!("Skipping net-result rollup line of {amount}");
            }
        }
    }

    /// Finalizes the totals into a period row. Cost buckets flip sign so the
    /// stored magnitudes are positive.
    fn into_period(self, key: &PeriodKey) -> AggregatedPeriod {
        let cost_of_sales = -self.cost_of_sales;
        let labor = -self.labor;
        let depreciation = -self.depreciation;
        let other_costs = -self.other_costs;
        let result = resultaat(
            self.revenue,
            cost_of_sales,
            labor,
            depreciation,
            other_costs,
            self.receivables_income,
            self.financial_income_expense,
        );
        AggregatedPeriod {
            location_id: key.location_id.clone(),
            year: key.year,
            month: key.month,
            revenue_total: Amount::new(self.revenue),
            cost_of_sales_total: Amount::new(cost_of_sales),
            labor_total: Amount::new(labor),
            depreciation_total: Amount::new(depreciation),
            other_costs_total: Amount::new(other_costs),
            receivables_income: Amount::new(self.receivables_income),
            financial_income_expense: Amount::new(self.financial_income_expense),
            resultaat: Amount::new(result),
        }
    }
}

/// Drives aggregation runs over a source/sink pair.
pub struct Aggregator<'a, S, K> {
    source: &'a S,
    sink: &'a K,
    page_size: u32,
    throttle: Duration,
}

impl<'a, S, K> Aggregator<'a, S, K>
where
    S: LedgerSource,
    K: PeriodSink,
{
    pub fn new(source: &'a S, sink: &'a K) -> Self {
        Self {
            source,
            sink,
            page_size: DEFAULT_PAGE_SIZE,
            throttle: Duration::ZERO,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        // A page size of zero would loop forever.
        self.page_size = page_size.max(1);
        self
    }

    /// Sets the delay between keys in batch mode, the simple self-throttle
    /// used against rate-limited sources.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Aggregates a single key: exhausts the paginated source, classifies
    /// and sums every line, and upserts the resulting row.
    pub async fn aggregate_key(&self, key: &PeriodKey) -> Result<KeyOutcome> {
        let lines = self.fetch_all(key).await?;
        if lines.is_empty() {
            return Ok(KeyOutcome::NoData);
        }
        debug!("Aggregating {} line(s) for {key}", lines.len());

        let mut totals = BucketTotals::default();
        for line in &lines {
            let bucket = classify(&line.category, line.subcategory.as_deref(), &line.gl_account);
            totals.add(bucket, line.amount.value());
        }
        let period = totals.into_period(key);
        self.sink.upsert_period(&period).await?;
        Ok(KeyOutcome::Written(period))
    }

    /// Aggregates exactly the given key, reporting a no-data key as skipped.
    pub async fn run_key(&self, key: &PeriodKey) -> RunSummary {
        let mut summary = RunSummary::default();
        summary.record(key, self.aggregate_key(key).await);
        summary
    }

    /// Discovers every key matching `scope` and aggregates each in turn.
    /// Per-key failures go into the summary; only key discovery itself is
    /// fatal.
    pub async fn run(&self, scope: &Scope) -> Result<RunSummary> {
        let keys = self
            .source
            .distinct_keys(scope.location_id.as_deref(), scope.year, scope.month)
            .await?;
        debug!("Discovered {} period key(s) to aggregate", keys.len());

        let mut summary = RunSummary::default();
        for (i, key) in keys.iter().enumerate() {
            if i > 0 && !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }
            summary.record(key, self.aggregate_key(key).await);
        }
        Ok(summary)
    }

    async fn fetch_all(&self, key: &PeriodKey) -> Result<Vec<RawLedgerLine>> {
        let mut lines = Vec::new();
        let mut offset = 0u32;
        loop {
            let page = self.source.fetch_page(key, offset, self.page_size).await?;
            let page_len = page.len() as u32;
            lines.extend(page);
            if page_len < self.page_size {
                break;
            }
            offset += page_len;
        }
        Ok(lines)
    }
}
