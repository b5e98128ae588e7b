use sqlx::SqlitePool;

use crate::models::{CityRow, StateRow};

const SQL_LIST_STATES: &str = r#"
SELECT id, name
FROM states
ORDER BY name ASC
"#;

pub async fn list_states(pool: &SqlitePool) -> sqlx::Result<Vec<StateRow>> {
    sqlx::query_as::<_, StateRow>(SQL_LIST_STATES)
        .fetch_all(pool)
        .await
}

const SQL_LIST_CITIES_FOR_STATE: &str = r#"
SELECT id, name, state_id
FROM cities
WHERE state_id = ?
ORDER BY name ASC
"#;

pub async fn list_cities_for_state(
    pool: &SqlitePool,
    state_id: i64,
) -> sqlx::Result<Vec<CityRow>> {
    sqlx::query_as::<_, CityRow>(SQL_LIST_CITIES_FOR_STATE)
        .bind(state_id)
        .fetch_all(pool)
        .await
}

const SQL_LOAD_CITY: &str = r#"
SELECT id, name, state_id
FROM cities
WHERE id = ?
LIMIT 1
"#;

pub async fn load_city(pool: &SqlitePool, city_id: i64) -> sqlx::Result<Option<CityRow>> {
    sqlx::query_as::<_, CityRow>(SQL_LOAD_CITY)
        .bind(city_id)
        .fetch_optional(pool)
        .await
}

const SQL_UPSERT_STATE: &str = r#"
INSERT INTO states (id, name)
VALUES (?, ?)
ON CONFLICT (id) DO UPDATE SET name = excluded.name
"#;

pub async fn upsert_state(pool: &SqlitePool, row: &StateRow) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_UPSERT_STATE)
        .bind(row.id)
        .bind(&row.name)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

const SQL_UPSERT_CITY: &str = r#"
INSERT INTO cities (id, name, state_id)
VALUES (?, ?, ?)
ON CONFLICT (id) DO UPDATE SET
  name = excluded.name,
  state_id = excluded.state_id
"#;

pub async fn upsert_city(pool: &SqlitePool, row: &CityRow) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_UPSERT_CITY)
        .bind(row.id)
        .bind(&row.name)
        .bind(row.state_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
