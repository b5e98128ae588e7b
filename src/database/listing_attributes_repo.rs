use sqlx::SqliteConnection;

const SQL_UPDATE_ATTRIBUTE: &str = r#"
UPDATE listing_attributes
SET value = ?
WHERE listing_id = ?
  AND name = ?
"#;

const SQL_INSERT_ATTRIBUTE: &str = r#"
INSERT INTO listing_attributes (listing_id, name, value)
VALUES (?, ?, ?)
"#;

/// There is no unique key on (listing_id, name): update first, insert when
/// nothing matched.
pub async fn upsert_attribute(
    conn: &mut SqliteConnection,
    listing_id: i64,
    name: &str,
    value: &str,
) -> sqlx::Result<()> {
    let updated = sqlx::query(SQL_UPDATE_ATTRIBUTE)
        .bind(value)
        .bind(listing_id)
        .bind(name)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if updated == 0 {
        sqlx::query(SQL_INSERT_ATTRIBUTE)
            .bind(listing_id)
            .bind(name)
            .bind(value)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

const SQL_DELETE_FOR_LISTING: &str = r#"
DELETE FROM listing_attributes
WHERE listing_id = ?
"#;

pub async fn delete_for_listing(conn: &mut SqliteConnection, listing_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE_FOR_LISTING)
        .bind(listing_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}
