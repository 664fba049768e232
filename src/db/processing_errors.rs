use chrono::Utc;
use sqlx::SqliteConnection;

use crate::errors::{ErrorCategory, ErrorType};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessingErrorRow {
    pub relative_path: String,
    pub error_type: String,
    pub error_category: String,
    pub error_message: Option<String>,
    pub occurred_at: String,
}

pub async fn insert_error(
    conn: &mut SqliteConnection,
    scan_run_id: &str,
    relative_path: &str,
    error_type: ErrorType,
    error_category: ErrorCategory,
    error_message: &str,
) -> anyhow::Result<()> {
    sqlx::query(include_str!("../../queries/errors/insert.sql"))
        .bind(scan_run_id)
        .bind(relative_path)
        .bind(error_type.as_str())
        .bind(error_category.as_str())
        .bind(error_message)
        .bind(Utc::now().to_rfc3339())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn errors_by_scan(
    conn: &mut SqliteConnection,
    scan_run_id: &str,
) -> anyhow::Result<Vec<ProcessingErrorRow>> {
    let rows = sqlx::query_as(include_str!("../../queries/errors/by_scan.sql"))
        .bind(scan_run_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Error counts per category, for the end-of-scan summary.
pub async fn count_by_category(
    conn: &mut SqliteConnection,
    scan_run_id: &str,
) -> anyhow::Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as(include_str!("../../queries/errors/count_by_category.sql"))
        .bind(scan_run_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
