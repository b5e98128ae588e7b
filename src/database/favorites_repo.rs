use sqlx::{SqliteConnection, SqlitePool};

const SQL_IS_FAVORITE: &str = r#"
SELECT COUNT(*)
FROM listing_favorites
WHERE listing_id = ?
  AND user_id = ?
"#;

pub async fn is_favorite(pool: &SqlitePool, listing_id: i64, user_id: &str) -> sqlx::Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(SQL_IS_FAVORITE)
        .bind(listing_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

const SQL_ADD_FAVORITE: &str = r#"
INSERT OR IGNORE INTO listing_favorites (listing_id, user_id)
VALUES (?, ?)
"#;

pub async fn add_favorite(pool: &SqlitePool, listing_id: i64, user_id: &str) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_ADD_FAVORITE)
        .bind(listing_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

const SQL_REMOVE_FAVORITE: &str = r#"
DELETE FROM listing_favorites
WHERE listing_id = ?
  AND user_id = ?
"#;

pub async fn remove_favorite(
    pool: &SqlitePool,
    listing_id: i64,
    user_id: &str,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_REMOVE_FAVORITE)
        .bind(listing_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

const SQL_DELETE_FOR_LISTING: &str = r#"
DELETE FROM listing_favorites
WHERE listing_id = ?
"#;

pub async fn delete_for_listing(conn: &mut SqliteConnection, listing_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE_FOR_LISTING)
        .bind(listing_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}
