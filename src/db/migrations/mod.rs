//! Versioned schema migrations for the SQLite stores.
//!
//! Each version `NN` ships a `migration_NN_up.sql` and a
//! `migration_NN_down.sql`, compiled in with `include_str!`. A migration's
//! SQL and its `schema_version` bump commit in one transaction.

use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

use crate::Result;

struct Migration {
    /// The version the up SQL brings the schema to.
    version: i32,
    up_sql: &'static str,
    down_sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up_sql: include_str!("migration_01_up.sql"),
    down_sql: include_str!("migration_01_down.sql"),
}];

/// Walks the schema from `current_ver` to `target_ver`, in either direction.
/// Fails before touching anything if a required migration is missing.
pub(crate) async fn run(pool: &SqlitePool, current_ver: i32, target_ver: i32) -> Result<()> {
    if current_ver == target_ver {
        debug!("Schema already at version {target_ver}");
        return Ok(());
    }
    validate_migrations(current_ver, target_ver)?;

    if current_ver < target_ver {
        for version in (current_ver + 1)..=target_ver {
            debug!("Applying migration {version:02}");
            apply(pool, find(version)?.up_sql, version).await?;
        }
    } else {
        for version in (target_ver + 1..=current_ver).rev() {
            debug!("Reverting migration {version:02}");
            apply(pool, find(version)?.down_sql, version - 1).await?;
        }
    }
    debug!("Schema now at version {target_ver}");
    Ok(())
}

fn find(version: i32) -> Result<&'static Migration> {
    MIGRATIONS
        .iter()
        .find(|m| m.version == version)
        .with_context(|| format!("Migration {version} not found"))
}

/// Runs one migration's SQL and sets `schema_version` to `new_version`, both
/// inside a single transaction.
async fn apply(pool: &SqlitePool, sql: &str, new_version: i32) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin migration transaction")?;
    tx.execute(sql)
        .await
        .context("Failed to execute migration SQL")?;
    sqlx::query("DELETE FROM schema_version")
        .execute(&mut *tx)
        .await
        .context("Failed to clear schema_version")?;
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(new_version)
        .execute(&mut *tx)
        .await
        .context("Failed to update schema_version")?;
    tx.commit().await.context("Failed to commit migration")
}

fn validate_migrations(current_version: i32, target_version: i32) -> Result<()> {
    let (start, end) = if current_version < target_version {
        (current_version + 1, target_version)
    } else {
        (target_version + 1, current_version)
    };
    for version in start..=end {
        if !MIGRATIONS.iter().any(|m| m.version == version) {
            bail!(
                "Migration {version} is missing but required to migrate from version {current_version} to {target_version}"
            );
        }
    }
    Ok(())
}
