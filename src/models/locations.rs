use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct StateRow {
    pub id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CityRow {
    pub id: i64,
    pub name: Option<String>,
    pub state_id: Option<i64>,
}
