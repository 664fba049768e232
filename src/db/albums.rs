use sqlx::SqliteConnection;

/// An album row, one per folder under the media root. The id is derived
/// from the folder path (see `paths::album_id_for_path`) so rescans land on
/// the same row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlbumRow {
    pub album_id: String,
    pub album_folder_path: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub access_level: Option<String>,
    pub creation_timestamp: Option<String>,
    pub is_user_album: bool,
    pub status: String,
    pub scan_run_id: Option<String>,
}

pub async fn upsert_album(conn: &mut SqliteConnection, album: &AlbumRow) -> anyhow::Result<()> {
    sqlx::query(include_str!("../../queries/albums/upsert.sql"))
        .bind(&album.album_id)
        .bind(&album.album_folder_path)
        .bind(&album.title)
        .bind(&album.description)
        .bind(&album.access_level)
        .bind(&album.creation_timestamp)
        .bind(album.is_user_album)
        .bind(&album.scan_run_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn get_album_by_path(
    conn: &mut SqliteConnection,
    folder_path: &str,
) -> anyhow::Result<Option<AlbumRow>> {
    let album = sqlx::query_as(include_str!("../../queries/albums/get_by_path.sql"))
        .bind(folder_path)
        .fetch_optional(conn)
        .await?;
    Ok(album)
}

pub async fn get_album_by_id(
    conn: &mut SqliteConnection,
    album_id: &str,
) -> anyhow::Result<Option<AlbumRow>> {
    let album = sqlx::query_as(include_str!("../../queries/albums/get_by_id.sql"))
        .bind(album_id)
        .fetch_optional(conn)
        .await?;
    Ok(album)
}

/// Flip every album not sighted by `scan_run_id` to `missing`. Returns the
/// number of rows flipped.
pub async fn mark_missing_except(
    conn: &mut SqliteConnection,
    scan_run_id: &str,
) -> anyhow::Result<u64> {
    let result = sqlx::query(include_str!("../../queries/albums/mark_missing.sql"))
        .bind(scan_run_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_albums(conn: &mut SqliteConnection) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(include_str!("../../queries/albums/count.sql"))
        .fetch_one(conn)
        .await?;
    Ok(count)
}
