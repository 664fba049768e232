use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

/// Find or mint a person id, keyed by the unique name.
pub async fn get_or_create_person(
    conn: &mut SqliteConnection,
    person_name: &str,
) -> anyhow::Result<String> {
    let existing: Option<(String,)> =
        sqlx::query_as(include_str!("../../queries/people/get_by_name.sql"))
            .bind(person_name)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some((person_id,)) = existing {
        return Ok(person_id);
    }

    let person_id = Uuid::new_v4().to_string();
    sqlx::query(include_str!("../../queries/people/insert.sql"))
        .bind(&person_id)
        .bind(person_name)
        .execute(conn)
        .await?;

    debug!("created person {person_id} for {person_name:?}");
    Ok(person_id)
}

/// Replace a media item's people tags wholesale, keeping sidecar order.
pub async fn replace_people_tags(
    conn: &mut SqliteConnection,
    media_item_id: &str,
    people_names: &[String],
) -> anyhow::Result<()> {
    sqlx::query(include_str!("../../queries/people/delete_tags.sql"))
        .bind(media_item_id)
        .execute(&mut *conn)
        .await?;

    for (tag_order, name) in people_names.iter().enumerate() {
        let person_id = get_or_create_person(conn, name).await?;
        sqlx::query(include_str!("../../queries/people/insert_tag.sql"))
            .bind(media_item_id)
            .bind(&person_id)
            .bind(tag_order as i64)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub async fn people_for_media_item(
    conn: &mut SqliteConnection,
    media_item_id: &str,
) -> anyhow::Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as(include_str!("../../queries/people/for_media_item.sql"))
            .bind(media_item_id)
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::albums::{upsert_album, AlbumRow};
    use crate::db::media_items::{insert_media_item, MediaItemRecord};
    use crate::db::open_test_pool;

    async fn seed_media_item(conn: &mut SqliteConnection, path: &str) -> String {
        let album_id = crate::paths::album_id_for_path("A").to_string();
        upsert_album(
            conn,
            &AlbumRow {
                album_id: album_id.clone(),
                album_folder_path: "A".to_string(),
                title: None,
                description: None,
                access_level: None,
                creation_timestamp: None,
                is_user_album: false,
                status: "present".to_string(),
                scan_run_id: None,
            },
        )
        .await
        .unwrap();

        let record = MediaItemRecord {
            media_item_id: Uuid::new_v4().to_string(),
            relative_path: path.to_string(),
            album_id,
            file_size: 1,
            scan_run_id: "scan-1".to_string(),
            ..Default::default()
        };
        insert_media_item(conn, &record, "t", "t").await.unwrap();
        record.media_item_id
    }

    #[tokio::test]
    async fn person_ids_are_stable_per_name() {
        let pool = open_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let a = get_or_create_person(&mut conn, "Alice").await.unwrap();
        let b = get_or_create_person(&mut conn, "Alice").await.unwrap();
        let c = get_or_create_person(&mut conn, "Bob").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn tags_are_replaced_wholesale_and_ordered() {
        let pool = open_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let item = seed_media_item(&mut conn, "A/p.jpg").await;

        replace_people_tags(&mut conn, &item, &["Alice".into(), "Bob".into()])
            .await
            .unwrap();
        assert_eq!(
            people_for_media_item(&mut conn, &item).await.unwrap(),
            vec!["Alice", "Bob"]
        );

        // a reprocess carries a different list; the old tags must go
        replace_people_tags(&mut conn, &item, &["Carol".into()])
            .await
            .unwrap();
        assert_eq!(
            people_for_media_item(&mut conn, &item).await.unwrap(),
            vec!["Carol"]
        );
    }

    #[tokio::test]
    async fn deleting_the_media_item_cascades_to_tags() {
        let pool = open_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let item = seed_media_item(&mut conn, "A/p.jpg").await;

        replace_people_tags(&mut conn, &item, &["Alice".into()])
            .await
            .unwrap();
        crate::db::media_items::delete_by_path(&mut conn, "A/p.jpg")
            .await
            .unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM people_tags")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
