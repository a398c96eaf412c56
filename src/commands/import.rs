use crate::args::ImportArgs;
use crate::commands::Out;
use crate::model::{CsvLedgerRecord, RawLedgerLine};
use crate::{Config, Result};
use anyhow::Context;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// What an import run did.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub import_id: String,
    pub lines: u64,
    pub periods: usize,
}

/// Load raw ledger lines from a CSV file into the raw store.
///
/// Every (location, year, month) touched by the file is superseded: its
/// previously stored lines are deleted and the file's lines take their
/// place. One import id tags all lines of the run.
pub async fn import(config: Config, args: ImportArgs) -> Result<Out<ImportOutcome>> {
    let path = args.file();
    let import_id = Uuid::new_v4().to_string();
    debug!("Importing {} as import {import_id}", path.display());

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open import file at {}", path.display()))?;
    let mut lines: Vec<RawLedgerLine> = Vec::new();
    for record in reader.deserialize() {
        let record: CsvLedgerRecord =
            record.with_context(|| format!("Invalid row in {}", path.display()))?;
        lines.push(record.into_line(&import_id));
    }

    let mut periods: Vec<_> = lines.iter().map(RawLedgerLine::key).collect();
    periods.sort();
    periods.dedup();

    let count = config.db().replace_lines(&lines).await?;
    let outcome = ImportOutcome {
        import_id,
        lines: count,
        periods: periods.len(),
    };
    Ok(Out::new(
        format!(
            "Imported {} line(s) across {} period(s) from {}",
            outcome.lines,
            outcome.periods,
            path.display()
        ),
        outcome,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_config(dir: &TempDir) -> Config {
        Config::create(dir.path().join("home")).await.unwrap()
    }

    fn write_csv(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_import_csv() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir).await;
        let path = write_csv(
            &dir,
            "lines.csv",
            "location_id,year,month,category,subcategory,gl_account,amount\n\
             centrum,2024,1,Netto-omzet,,8000 Omzet keuken,1000.00\n\
             centrum,2024,1,Kostprijs van de omzet,,7000,-400.00\n\
             centrum,2024,2,Netto-omzet,,8000 Omzet keuken,1100.00\n",
        );

        let out = import(config.clone(), ImportArgs::new(&path)).await.unwrap();
        let outcome = out.structure().unwrap();
        assert_eq!(outcome.lines, 3);
        assert_eq!(outcome.periods, 2);
        assert_eq!(config.db().count_lines().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_reimport_supersedes() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir).await;
        let first = write_csv(
            &dir,
            "first.csv",
            "location_id,year,month,category,subcategory,gl_account,amount\n\
             centrum,2024,1,Netto-omzet,,8000,1000.00\n\
             centrum,2024,1,Netto-omzet,,8010,500.00\n",
        );
        let second = write_csv(
            &dir,
            "second.csv",
            "location_id,year,month,category,subcategory,gl_account,amount\n\
             centrum,2024,1,Netto-omzet,,8000,999.00\n",
        );

        import(config.clone(), ImportArgs::new(&first)).await.unwrap();
        import(config.clone(), ImportArgs::new(&second)).await.unwrap();
        assert_eq!(config.db().count_lines().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_import_invalid_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir).await;
        let result = import(config, ImportArgs::new(dir.path().join("missing.csv"))).await;
        assert!(result.is_err());
    }
}
