use sqlx::SqlitePool;

use crate::models::UserRow;

const SQL_LOAD_USER: &str = r#"
SELECT
  id,
  email,
  full_name,
  avatar_url,
  phone,
  phone_verified
FROM users
WHERE id = ?
LIMIT 1
"#;

pub async fn load_user(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(SQL_LOAD_USER)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

// Phone fields are owned by the profile flow, so a sign-in never clears them.
const SQL_UPSERT_USER: &str = r#"
INSERT INTO users (id, email, full_name, avatar_url, phone, phone_verified)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT (id) DO UPDATE SET
  email = excluded.email,
  full_name = COALESCE(excluded.full_name, users.full_name),
  avatar_url = COALESCE(excluded.avatar_url, users.avatar_url),
  phone = COALESCE(excluded.phone, users.phone),
  phone_verified = COALESCE(excluded.phone_verified, users.phone_verified)
"#;

pub async fn upsert_user(pool: &SqlitePool, user: &UserRow) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_UPSERT_USER)
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.avatar_url)
        .bind(&user.phone)
        .bind(user.phone_verified)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
