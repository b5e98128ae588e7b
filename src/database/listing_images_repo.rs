use sqlx::{SqliteConnection, SqliteExecutor};

use crate::models::ListingImage;

const SQL_LIST_FOR_LISTING: &str = r#"
SELECT id, image_url, position
FROM listing_images
WHERE listing_id = ?
ORDER BY position ASC, id ASC
"#;

pub async fn list_for_listing<'e, E: SqliteExecutor<'e>>(
    executor: E,
    listing_id: i64,
) -> sqlx::Result<Vec<ListingImage>> {
    sqlx::query_as::<_, ListingImage>(SQL_LIST_FOR_LISTING)
        .bind(listing_id)
        .fetch_all(executor)
        .await
}

const SQL_INSERT_IMAGE: &str = r#"
INSERT INTO listing_images (listing_id, image_url, position)
VALUES (?, ?, ?)
"#;

pub async fn insert_image(
    conn: &mut SqliteConnection,
    listing_id: i64,
    image_url: &str,
    position: i64,
) -> sqlx::Result<i64> {
    let res = sqlx::query(SQL_INSERT_IMAGE)
        .bind(listing_id)
        .bind(image_url)
        .bind(position)
        .execute(conn)
        .await?;
    Ok(res.last_insert_rowid())
}

const SQL_NEXT_POSITION: &str = r#"
SELECT COALESCE(MAX(position) + 1, 0)
FROM listing_images
WHERE listing_id = ?
"#;

pub async fn next_position(conn: &mut SqliteConnection, listing_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>(SQL_NEXT_POSITION)
        .bind(listing_id)
        .fetch_one(conn)
        .await
}

const SQL_DELETE_IMAGE: &str = r#"
DELETE FROM listing_images
WHERE id = ?
  AND listing_id = ?
"#;

pub async fn delete_image(
    conn: &mut SqliteConnection,
    listing_id: i64,
    image_id: i64,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE_IMAGE)
        .bind(image_id)
        .bind(listing_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

const SQL_DELETE_FOR_LISTING: &str = r#"
DELETE FROM listing_images
WHERE listing_id = ?
"#;

pub async fn delete_for_listing(conn: &mut SqliteConnection, listing_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE_FOR_LISTING)
        .bind(listing_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}
