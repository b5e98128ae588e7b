use sqlx::SqlitePool;

use crate::models::{CategoryRow, SubCategoryRow};

const SQL_LIST_CATEGORIES: &str = r#"
SELECT id, name, tag, parent_id
FROM categories
ORDER BY id ASC
"#;

pub async fn list_categories(pool: &SqlitePool) -> sqlx::Result<Vec<CategoryRow>> {
    sqlx::query_as::<_, CategoryRow>(SQL_LIST_CATEGORIES)
        .fetch_all(pool)
        .await
}

const SQL_LIST_SUB_CATEGORIES: &str = r#"
SELECT id, category_id, name, tag
FROM sub_categories
WHERE category_id = ?
ORDER BY name ASC
"#;

pub async fn list_sub_categories(
    pool: &SqlitePool,
    category_id: i64,
) -> sqlx::Result<Vec<SubCategoryRow>> {
    sqlx::query_as::<_, SubCategoryRow>(SQL_LIST_SUB_CATEGORIES)
        .bind(category_id)
        .fetch_all(pool)
        .await
}

const SQL_LOAD_SUB_CATEGORY: &str = r#"
SELECT id, category_id, name, tag
FROM sub_categories
WHERE id = ?
LIMIT 1
"#;

pub async fn load_sub_category(
    pool: &SqlitePool,
    sub_category_id: i64,
) -> sqlx::Result<Option<SubCategoryRow>> {
    sqlx::query_as::<_, SubCategoryRow>(SQL_LOAD_SUB_CATEGORY)
        .bind(sub_category_id)
        .fetch_optional(pool)
        .await
}

const SQL_UPSERT_SUB_CATEGORY: &str = r#"
INSERT INTO sub_categories (id, category_id, name, tag)
VALUES (?, ?, ?, ?)
ON CONFLICT (id) DO UPDATE SET
  category_id = excluded.category_id,
  name = excluded.name,
  tag = excluded.tag
"#;

pub async fn upsert_sub_category(pool: &SqlitePool, row: &SubCategoryRow) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_UPSERT_SUB_CATEGORY)
        .bind(row.id)
        .bind(row.category_id)
        .bind(&row.name)
        .bind(&row.tag)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
