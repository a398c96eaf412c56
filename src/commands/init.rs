use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Create the data directory, its `config.json` and a fresh SQLite store.
pub async fn init(home: &Path) -> Result<Out<String>> {
    let config = Config::create(home).await?;
    Ok(Out::new_message(format!(
        "Initialized pnl home at {}",
        config.root().display()
    )))
}
