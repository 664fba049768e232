pub mod albums;
pub mod media_items;
pub mod people;
pub mod processing_errors;
pub mod scan_runs;

use std::time::Duration;

use camino::Utf8Path;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, info, warn};

/// Numbered migration scripts, compiled into the binary. The list index is
/// not the version; each entry carries its own number so gaps stay visible.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../schema/0001_initial.sql"))];

/// Open (creating if necessary) the catalog database. Every connection gets
/// WAL journaling, a 5 second busy timeout, and enforced foreign keys. A
/// single connection backs the pool: the writer is the only writer, and
/// read paths share its view.
pub async fn open(path: &Utf8Path) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Bring the schema up to date. Each pending script runs in its own
/// transaction and bumps `schema_version` atomically with its DDL.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<i64> {
    sqlx::raw_sql("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await?;

    let current: Option<(Option<i64>,)> =
        sqlx::query_as("SELECT MAX(version) FROM schema_version")
            .fetch_optional(pool)
            .await?;
    let mut version = current.and_then(|row| row.0).unwrap_or(0);

    if MIGRATIONS.is_empty() {
        warn!("no migration scripts are available; leaving schema at version {version}");
        return Ok(version);
    }

    for (number, script) in MIGRATIONS {
        if *number <= version {
            debug!("migration {number} already applied");
            continue;
        }

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(script).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(number)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("applied schema migration {number}");
        version = *number;
    }

    Ok(version)
}

#[cfg(test)]
pub(crate) async fn open_test_pool() -> SqlitePool {
    let dir = tempfile::tempdir().unwrap();
    let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("test.db")).unwrap();
    let pool = open(&path).await.unwrap();
    run_migrations(&pool).await.unwrap();
    // the tempdir handle must outlive the pool; leak it for the test's sake
    std::mem::forget(dir);
    pool
}
