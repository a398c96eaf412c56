//! These structs provide the CLI interface for the pnl CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// pnl: A command-line tool for monthly P&L reporting.
///
/// The purpose of this program is to roll raw general-ledger line items up
/// into one aggregated P&L row per location and month, classifying each line
/// into a fixed set of buckets by its Dutch accounting category texts, and to
/// reconcile the aggregated figures against accountant-provided expected
/// numbers.
///
/// Raw lines live in a local SQLite store; load them with `pnl import` and
/// roll them up with `pnl aggregate`. `pnl serve` exposes the same
/// aggregation as a small HTTP endpoint.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory, the configuration file and the SQLite
    /// store.
    ///
    /// This is the first command you should run. Decide what directory you
    /// want to store data in and pass it as --pnl-home (default:
    /// $HOME/pnl).
    Init,
    /// Import raw general-ledger lines from a CSV file.
    ///
    /// Expected header: location_id,year,month,category,subcategory,
    /// gl_account,amount. Lines previously imported for any (location,
    /// year, month) touched by the file are deleted and replaced.
    Import(ImportArgs),
    /// Aggregate raw lines into monthly P&L rows.
    Aggregate(AggregateArgs),
    /// Compare aggregated rows against accountant-provided expected figures.
    Reconcile(ReconcileArgs),
    /// Run the HTTP server exposing aggregation as an endpoint.
    Serve(ServeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where pnl data and configuration is held. Defaults to
    /// ~/pnl
    #[arg(long, env = "PNL_HOME", default_value_t = default_pnl_home())]
    pnl_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, pnl_home: PathBuf) -> Self {
        Self {
            log_level,
            pnl_home: pnl_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn pnl_home(&self) -> &DisplayPath {
        &self.pnl_home
    }
}

/// Args for the `pnl import` command.
#[derive(Debug, Parser, Clone)]
pub struct ImportArgs {
    /// The CSV file holding raw ledger lines.
    #[arg(long)]
    file: PathBuf,
}

impl ImportArgs {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// Args for the `pnl aggregate` command.
///
/// Omitting all three filters means "aggregate every period present in the
/// raw store".
#[derive(Debug, Default, Parser, Clone)]
pub struct AggregateArgs {
    /// Only aggregate periods of this location.
    #[arg(long)]
    location: Option<String>,

    /// Only aggregate periods of this year.
    #[arg(long)]
    year: Option<i32>,

    /// Only aggregate this month (1-12). Requires --year.
    #[arg(long, requires = "year")]
    month: Option<u32>,
}

impl AggregateArgs {
    pub fn new(location: Option<String>, year: Option<i32>, month: Option<u32>) -> Self {
        Self {
            location,
            year,
            month,
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn month(&self) -> Option<u32> {
        self.month
    }
}

/// Args for the `pnl reconcile` command.
#[derive(Debug, Parser, Clone)]
pub struct ReconcileArgs {
    /// The location to reconcile.
    #[arg(long)]
    location: String,

    /// The year to reconcile.
    #[arg(long)]
    year: i32,

    /// CSV file of expected figures with header: year,month,revenue,resultaat
    #[arg(long)]
    expected: PathBuf,

    /// Acceptable deviation in percent; overrides the configured value.
    #[arg(long, value_parser = crate::reconcile::parse_tolerance)]
    tolerance: Option<rust_decimal::Decimal>,
}

impl ReconcileArgs {
    pub fn new(
        location: impl Into<String>,
        year: i32,
        expected: impl Into<PathBuf>,
        tolerance: Option<rust_decimal::Decimal>,
    ) -> Self {
        Self {
            location: location.into(),
            year,
            expected: expected.into(),
            tolerance,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn expected(&self) -> &Path {
        &self.expected
    }

    pub fn tolerance(&self) -> Option<rust_decimal::Decimal> {
        self.tolerance
    }
}

/// Args for the `pnl serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1:8355")]
    bind: String,
}

impl ServeArgs {
    pub fn new(bind: impl Into<String>) -> Self {
        Self { bind: bind.into() }
    }

    pub fn bind(&self) -> &str {
        &self.bind
    }
}

fn default_pnl_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("pnl"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --pnl-home or PNL_HOME instead of relying on the default \
                pnl home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("pnl")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aggregate_all() {
        let args = Args::try_parse_from(["pnl", "aggregate"]).unwrap();
        let Command::Aggregate(agg) = args.command() else {
            panic!("expected aggregate command");
        };
        assert!(agg.location().is_none());
        assert!(agg.year().is_none());
        assert!(agg.month().is_none());
    }

    #[test]
    fn test_parse_aggregate_single_key() {
        let args = Args::try_parse_from([
            "pnl",
            "aggregate",
            "--location",
            "centrum",
            "--year",
            "2024",
            "--month",
            "3",
        ])
        .unwrap();
        let Command::Aggregate(agg) = args.command() else {
            panic!("expected aggregate command");
        };
        assert_eq!(agg.location(), Some("centrum"));
        assert_eq!(agg.year(), Some(2024));
        assert_eq!(agg.month(), Some(3));
    }

    #[test]
    fn test_month_requires_year() {
        let result = Args::try_parse_from(["pnl", "aggregate", "--month", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_reconcile() {
        let args = Args::try_parse_from([
            "pnl",
            "reconcile",
            "--location",
            "centrum",
            "--year",
            "2024",
            "--expected",
            "expected.csv",
            "--tolerance",
            "1.5",
        ])
        .unwrap();
        let Command::Reconcile(rec) = args.command() else {
            panic!("expected reconcile command");
        };
        assert_eq!(rec.location(), "centrum");
        assert_eq!(rec.year(), 2024);
        assert!(rec.tolerance().is_some());
    }
}
