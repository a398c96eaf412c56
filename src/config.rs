//! Configuration file handling.
//!
//! The configuration file is stored at `$PNL_HOME/config.json` and contains
//! the tunables of the pipeline: the raw-source page size, the inter-key
//! throttle delay used in batch runs, and the reconciliation tolerance.
//! There are no process-wide singletons; everything the pipeline needs is
//! carried on the `Config` object handed to the command handlers.

use crate::db::Db;
use crate::reconcile::DEFAULT_TOLERANCE_PCT;
use crate::{utils, Result};
use anyhow::{bail, Context};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const APP_NAME: &str = "pnl";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const PNL_SQLITE: &str = "pnl.sqlite";
const DEFAULT_PAGE_SIZE: u32 = 1000;
const DEFAULT_THROTTLE_MS: u64 = 250;

/// The `Config` object represents the configuration of the app. You
/// instantiate it by providing the path to `$PNL_HOME` and from there it
/// loads `$PNL_HOME/config.json` and opens the SQLite stores.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the data directory with an initial `config.json` holding
    /// default settings and a fresh SQLite database.
    ///
    /// # Errors
    /// - Returns an error if the directory cannot be created or a database
    ///   already exists there.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the pnl home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile::default();
        config_file.save(&config_path).await?;

        let sqlite_path = root.join(PNL_SQLITE);
        let db = Db::init(&sqlite_path)
            .await
            .context("Unable to create SQLite DB")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    /// This will
    /// - validate that `pnl_home` exists and that the config file exists
    /// - load the config file
    /// - open the SQLite database, migrating its schema if needed
    pub async fn load(pnl_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = pnl_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Pnl Home is missing, run 'pnl init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let sqlite_path = root.join(PNL_SQLITE);
        let db = Db::load(&sqlite_path)
            .await
            .context("Unable to load SQLite DB")?;

        Ok(Self {
            root,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    /// Page size used when fetching raw ledger lines.
    pub fn page_size(&self) -> u32 {
        self.config_file.page_size
    }

    /// Delay between period keys in batch aggregation runs.
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.config_file.throttle_ms)
    }

    /// Reconciliation tolerance as a percentage.
    pub fn tolerance_pct(&self) -> Result<Decimal> {
        Decimal::from_str(&self.config_file.tolerance_pct).with_context(|| {
            format!(
                "Invalid tolerance_pct '{}' in {}",
                self.config_file.tolerance_pct,
                self.config_path.display()
            )
        })
    }
}

/// Represents the serialization and deserialization format of the
/// configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "pnl",
///   "config_version": 1,
///   "page_size": 1000,
///   "throttle_ms": 250,
///   "tolerance_pct": "2.5"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "pnl"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Page size for raw ledger line fetches
    page_size: u32,

    /// Milliseconds to sleep between period keys in batch runs
    throttle_ms: u64,

    /// Reconciliation tolerance percentage, kept as a string so the decimal
    /// survives serialization exactly
    tolerance_pct: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            page_size: DEFAULT_PAGE_SIZE,
            throttle_ms: DEFAULT_THROTTLE_MS,
            tolerance_pct: DEFAULT_TOLERANCE_PCT.to_string(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("pnl_home");

        let config = Config::create(&home_dir).await.unwrap();

        assert_eq!(config.page_size(), 1000);
        assert_eq!(config.throttle(), Duration::from_millis(250));
        assert_eq!(
            config.tolerance_pct().unwrap(),
            Decimal::from_str("2.5").unwrap()
        );
        assert!(config.config_path().is_file());
        assert!(config.sqlite_path().is_file());
    }

    #[tokio::test]
    async fn test_config_create_then_load() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("pnl_home");
        let created = Config::create(&home_dir).await.unwrap();

        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(created.root(), loaded.root());
        assert_eq!(created.page_size(), loaded.page_size());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(dir.path().join("nope")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_load_missing_config_file() {
        let dir = TempDir::new().unwrap();
        // Home exists but holds no config.json.
        let result = Config::load(dir.path()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "page_size": 1000,
            "throttle_ms": 250,
            "tolerance_pct": "2.5"
        }"#;
        std::fs::write(&path, json).unwrap();

        let result = ConfigFile::load(&path).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let original = ConfigFile {
            page_size: 500,
            throttle_ms: 0,
            tolerance_pct: "1.0".to_string(),
            ..ConfigFile::default()
        };
        original.save(&path).await.unwrap();

        let loaded = ConfigFile::load(&path).await.unwrap();
        assert_eq!(original, loaded);
    }

    #[tokio::test]
    async fn test_invalid_tolerance_is_an_error() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("pnl_home");
        let config = Config::create(&home_dir).await.unwrap();

        let broken = ConfigFile {
            tolerance_pct: "not-a-number".to_string(),
            ..ConfigFile::default()
        };
        broken.save(config.config_path()).await.unwrap();

        let reloaded = Config::load(&home_dir).await.unwrap();
        assert!(reloaded.tolerance_pct().is_err());
    }
}
