use crate::aggregate::{Aggregator, RunSummary, Scope};
use crate::args::AggregateArgs;
use crate::commands::Out;
use crate::model::PeriodKey;
use crate::{Config, Result};

/// Roll raw lines up into aggregated P&L rows.
///
/// With `--location`, `--year` and `--month` all present, exactly that
/// period is aggregated. Any filter left out widens the run to every
/// matching period in the raw store; leaving them all out aggregates
/// everything.
pub async fn aggregate(config: Config, args: AggregateArgs) -> Result<Out<RunSummary>> {
    let db = config.db();
    let aggregator = Aggregator::new(db, db)
        .with_page_size(config.page_size())
        .with_throttle(config.throttle());

    let summary = match (args.location(), args.year(), args.month()) {
        (Some(location), Some(year), Some(month)) => {
            let key = PeriodKey::new(location, year, month);
            aggregator.run_key(&key).await
        }
        (location, year, month) => {
            let scope = Scope {
                location_id: location.map(str::to_string),
                year,
                month,
            };
            aggregator.run(&scope).await?
        }
    };

    Ok(Out::new(summary.describe(), summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ImportArgs;
    use crate::commands::import;
    use tempfile::TempDir;

    async fn seeded_config(dir: &TempDir) -> Config {
        let config = Config::create(dir.path().join("home")).await.unwrap();
        let csv_path = dir.path().join("lines.csv");
        std::fs::write(
            &csv_path,
            "location_id,year,month,category,subcategory,gl_account,amount\n\
             centrum,2024,1,Netto-omzet,,8000,1000.00\n\
             centrum,2024,1,Kostprijs van de omzet,,7000,-400.00\n\
             centrum,2024,2,Netto-omzet,,8000,1100.00\n\
             noord,2024,1,Netto-omzet,,8000,700.00\n",
        )
        .unwrap();
        import(config.clone(), ImportArgs::new(&csv_path))
            .await
            .unwrap();
        config
    }

    #[tokio::test]
    async fn test_aggregate_all() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;

        let out = aggregate(config.clone(), AggregateArgs::default())
            .await
            .unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 0);

        let key = PeriodKey::new("centrum", 2024, 1);
        let period = config.db().get_period(&key).await.unwrap().unwrap();
        assert_eq!(period.revenue_total.value().to_string(), "1000.00");
        assert_eq!(period.cost_of_sales_total.value().to_string(), "400.00");
        assert_eq!(period.resultaat.value().to_string(), "600.00");
    }

    #[tokio::test]
    async fn test_aggregate_single_key_with_no_data_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;

        let args = AggregateArgs::new(Some("nowhere".to_string()), Some(2024), Some(1));
        let out = aggregate(config, args).await.unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded, 0);
    }

    #[tokio::test]
    async fn test_aggregate_scoped_to_location() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;

        let args = AggregateArgs::new(Some("noord".to_string()), None, None);
        let out = aggregate(config.clone(), args).await.unwrap();
        assert_eq!(out.structure().unwrap().processed, 1);

        // The other location was not touched.
        let key = PeriodKey::new("centrum", 2024, 1);
        assert!(config.db().get_period(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;

        aggregate(config.clone(), AggregateArgs::default())
            .await
            .unwrap();
        let key = PeriodKey::new("centrum", 2024, 1);
        let first = config.db().get_period(&key).await.unwrap().unwrap();

        aggregate(config.clone(), AggregateArgs::default())
            .await
            .unwrap();
        let second = config.db().get_period(&key).await.unwrap().unwrap();
        assert_eq!(first, second);
    }
}
