//! This module is responsible for reading, writing and managing the SQLite
//! stores: the raw ledger lines and the aggregated periods.
//!
//! The raw line reads are deliberately paginated (`LIMIT`/`OFFSET` ordered by
//! rowid) so the aggregator exercises the same page-exhausting loop it would
//! run against a remote paginated API.

mod migrations;

use crate::aggregate::{LedgerSource, PeriodSink};
use crate::model::{AggregatedPeriod, Amount, PeriodKey, RawLedgerLine};
use crate::Result;
use anyhow::{bail, Context};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// The schema version this build of the program expects.
const TARGET_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone)]
pub(crate) struct Db {
    pool: SqlitePool,
}

impl Db {
    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the database schema
    pub(crate) async fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A database file already exists at {}", path.display());
        }
        let pool = open_pool(path, true).await?;

        sqlx::query("CREATE TABLE schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .context("Failed to create schema_version table")?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .context("Failed to insert initial schema version")?;

        migrations::run(&pool, 0, TARGET_SCHEMA_VERSION).await?;
        debug!("Created SQLite database at {}", path.display());
        Ok(Self { pool })
    }

    /// - Validates that there is a SQLite file at `path`
    /// - Updates the database schema with migrations if it is out-of-date
    pub(crate) async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!(
                "The database file is missing '{}', run 'pnl init' first",
                path.display()
            );
        }
        let pool = open_pool(path, false).await?;
        let current = schema_version(&pool).await?;
        migrations::run(&pool, current, TARGET_SCHEMA_VERSION).await?;
        Ok(Self { pool })
    }

    /// Inserts raw lines for the periods they belong to, deleting any lines
    /// previously stored for those periods first. Delete and reinsert happen
    /// in one transaction per call.
    pub(crate) async fn replace_lines(&self, lines: &[RawLedgerLine]) -> Result<u64> {
        let mut keys: Vec<PeriodKey> = lines.iter().map(RawLedgerLine::key).collect();
        keys.sort();
        keys.dedup();

        let mut tx = self.pool.begin().await.context("Failed to begin import")?;
        for key in &keys {
            sqlx::query(
                "DELETE FROM raw_ledger_lines WHERE location_id = ? AND year = ? AND month = ?",
            )
            .bind(&key.location_id)
            .bind(key.year)
            .bind(key.month)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to delete prior lines for {key}"))?;
        }
        for line in lines {
            sqlx::query(
                "INSERT INTO raw_ledger_lines \
                 (location_id, year, month, category, subcategory, gl_account, amount, import_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&line.location_id)
            .bind(line.year)
            .bind(line.month)
            .bind(&line.category)
            .bind(line.subcategory.as_deref())
            .bind(&line.gl_account)
            .bind(line.amount.value().to_string())
            .bind(&line.import_id)
            .execute(&mut *tx)
            .await
            .context("Failed to insert raw ledger line")?;
        }
        tx.commit().await.context("Failed to commit import")?;
        Ok(lines.len() as u64)
    }

    /// Returns the number of rows in the raw_ledger_lines table.
    pub(crate) async fn count_lines(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM raw_ledger_lines")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count raw ledger lines")?;
        Ok(row.0 as u64)
    }

    /// Reads a period row, if one has been aggregated.
    pub(crate) async fn get_period(&self, key: &PeriodKey) -> Result<Option<AggregatedPeriod>> {
        let row = sqlx::query(
            "SELECT location_id, year, month, revenue_total, cost_of_sales_total, labor_total, \
             depreciation_total, other_costs_total, receivables_income, \
             financial_income_expense, resultaat \
             FROM aggregated_periods WHERE location_id = ? AND year = ? AND month = ?",
        )
        .bind(&key.location_id)
        .bind(key.year)
        .bind(key.month)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read aggregated period for {key}"))?;
        row.map(|r| period_from_row(&r)).transpose()
    }

    /// Reads every aggregated row for a location and year, keyed by month.
    pub(crate) async fn periods_for(
        &self,
        location_id: &str,
        year: i32,
    ) -> Result<BTreeMap<u32, AggregatedPeriod>> {
        let rows = sqlx::query(
            "SELECT location_id, year, month, revenue_total, cost_of_sales_total, labor_total, \
             depreciation_total, other_costs_total, receivables_income, \
             financial_income_expense, resultaat \
             FROM aggregated_periods WHERE location_id = ? AND year = ? ORDER BY month",
        )
        .bind(location_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to read aggregated periods for {location_id} {year}"))?;

        let mut periods = BTreeMap::new();
        for row in &rows {
            let period = period_from_row(row)?;
            periods.insert(period.month, period);
        }
        Ok(periods)
    }
}

#[async_trait]
impl LedgerSource for Db {
    async fn fetch_page(
        &self,
        key: &PeriodKey,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<RawLedgerLine>> {
        let rows = sqlx::query(
            "SELECT location_id, year, month, category, subcategory, gl_account, amount, import_id \
             FROM raw_ledger_lines WHERE location_id = ? AND year = ? AND month = ? \
             ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(&key.location_id)
        .bind(key.year)
        .bind(key.month)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to fetch raw lines for {key}"))?;

        rows.iter()
            .map(|row| {
                let amount_text: String = row.try_get("amount")?;
                let amount = Amount::from_str(&amount_text)
                    .with_context(|| format!("Invalid stored amount '{amount_text}'"))?;
                Ok(RawLedgerLine {
                    location_id: row.try_get("location_id")?,
                    year: row.try_get("year")?,
                    month: row.try_get("month")?,
                    category: row.try_get("category")?,
                    subcategory: row.try_get("subcategory")?,
                    gl_account: row.try_get("gl_account")?,
                    amount,
                    import_id: row.try_get("import_id")?,
                })
            })
            .collect()
    }

    async fn distinct_keys(
        &self,
        location_id: Option<&str>,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Vec<PeriodKey>> {
        // NULL binds make each filter optional.
        let rows = sqlx::query(
            "SELECT DISTINCT location_id, year, month FROM raw_ledger_lines \
             WHERE (?1 IS NULL OR location_id = ?1) \
               AND (?2 IS NULL OR year = ?2) \
               AND (?3 IS NULL OR month = ?3) \
             ORDER BY location_id, year, month",
        )
        .bind(location_id)
        .bind(year)
        .bind(month)
        .fetch_all(&self.pool)
        .await
        .context("Failed to discover period keys")?;

        rows.iter()
            .map(|row| {
                Ok(PeriodKey {
                    location_id: row.try_get("location_id")?,
                    year: row.try_get("year")?,
                    month: row.try_get("month")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PeriodSink for Db {
    async fn upsert_period(&self, period: &AggregatedPeriod) -> Result<()> {
        // Full overwrite by primary key; no merge, no partial update.
        sqlx::query(
            "INSERT OR REPLACE INTO aggregated_periods \
             (location_id, year, month, revenue_total, cost_of_sales_total, labor_total, \
              depreciation_total, other_costs_total, receivables_income, \
              financial_income_expense, resultaat) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&period.location_id)
        .bind(period.year)
        .bind(period.month)
        .bind(period.revenue_total.value().to_string())
        .bind(period.cost_of_sales_total.value().to_string())
        .bind(period.labor_total.value().to_string())
        .bind(period.depreciation_total.value().to_string())
        .bind(period.other_costs_total.value().to_string())
        .bind(period.receivables_income.value().to_string())
        .bind(period.financial_income_expense.value().to_string())
        .bind(period.resultaat.value().to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert aggregated period for {}", period.key()))?;
        Ok(())
    }
}

async fn open_pool(path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .context("Failed to parse SQLite connection string")?
        .create_if_missing(create);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open SQLite database at {}", path.display()))
}

async fn schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: (i32,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to query schema version")?;
    Ok(row.0)
}

fn amount_field(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Amount> {
    let text: String = row.try_get(column)?;
    Amount::from_str(&text).with_context(|| format!("Invalid stored amount '{text}' in {column}"))
}

fn period_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<AggregatedPeriod> {
    Ok(AggregatedPeriod {
        location_id: row.try_get("location_id")?,
        year: row.try_get("year")?,
        month: row.try_get("month")?,
        revenue_total: amount_field(row, "revenue_total")?,
        cost_of_sales_total: amount_field(row, "cost_of_sales_total")?,
        labor_total: amount_field(row, "labor_total")?,
        depreciation_total: amount_field(row, "depreciation_total")?,
        other_costs_total: amount_field(row, "other_costs_total")?,
        receivables_income: amount_field(row, "receivables_income")?,
        financial_income_expense: amount_field(row, "financial_income_expense")?,
        resultaat: amount_field(row, "resultaat")?,
    })
}
