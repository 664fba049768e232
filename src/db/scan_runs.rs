use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// One row per scan invocation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScanRun {
    pub scan_run_id: String,
    pub start_timestamp: String,
    pub end_timestamp: Option<String>,
    pub status: String,
    pub media_files_processed: i64,
    pub errors_count: i64,
    pub bytes_processed: i64,
}

pub async fn create_scan_run(conn: &mut SqliteConnection) -> anyhow::Result<String> {
    let scan_run_id = Uuid::new_v4().to_string();
    sqlx::query(include_str!("../../queries/scan_runs/create.sql"))
        .bind(&scan_run_id)
        .bind(Utc::now().to_rfc3339())
        .execute(conn)
        .await?;
    Ok(scan_run_id)
}

pub async fn get_scan_run(
    conn: &mut SqliteConnection,
    scan_run_id: &str,
) -> anyhow::Result<Option<ScanRun>> {
    let run = sqlx::query_as(include_str!("../../queries/scan_runs/get.sql"))
        .bind(scan_run_id)
        .fetch_optional(conn)
        .await?;
    Ok(run)
}

pub async fn update_counters(
    conn: &mut SqliteConnection,
    scan_run_id: &str,
    media_files_processed: u64,
    errors_count: u64,
    bytes_processed: u64,
) -> anyhow::Result<()> {
    sqlx::query(include_str!("../../queries/scan_runs/update_counters.sql"))
        .bind(media_files_processed as i64)
        .bind(errors_count as i64)
        .bind(bytes_processed as i64)
        .bind(scan_run_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Stamp the end timestamp and final status. Called exactly once per run.
pub async fn complete_scan_run(
    conn: &mut SqliteConnection,
    scan_run_id: &str,
    status: &str,
) -> anyhow::Result<()> {
    sqlx::query(include_str!("../../queries/scan_runs/complete.sql"))
        .bind(status)
        .bind(Utc::now().to_rfc3339())
        .bind(scan_run_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_pool;

    #[tokio::test]
    async fn scan_run_lifecycle() {
        let pool = open_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let id = create_scan_run(&mut conn).await.unwrap();
        let run = get_scan_run(&mut conn, &id).await.unwrap().unwrap();
        assert_eq!(run.status, "running");
        assert!(run.end_timestamp.is_none());
        assert_eq!(run.media_files_processed, 0);

        update_counters(&mut conn, &id, 100, 2, 4096).await.unwrap();
        let run = get_scan_run(&mut conn, &id).await.unwrap().unwrap();
        assert_eq!(run.media_files_processed, 100);
        assert_eq!(run.errors_count, 2);
        assert_eq!(run.bytes_processed, 4096);

        complete_scan_run(&mut conn, &id, "completed").await.unwrap();
        let run = get_scan_run(&mut conn, &id).await.unwrap().unwrap();
        assert_eq!(run.status, "completed");
        assert!(run.end_timestamp.is_some());
    }

    #[tokio::test]
    async fn unknown_run_is_none() {
        let pool = open_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        assert!(get_scan_run(&mut conn, "nope").await.unwrap().is_none());
    }
}
