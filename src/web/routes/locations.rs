use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::SqlitePool;
use tracing::warn;

use crate::services::location_service::{self, LocationOption};

pub async fn states_handler(State(pool): State<SqlitePool>) -> impl IntoResponse {
    match location_service::list_states(&pool).await {
        Ok(states) => (StatusCode::OK, Json(states)),
        Err(e) => {
            warn!("📍 Loading states failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Vec::<LocationOption>::new()),
            )
        }
    }
}

pub async fn cities_handler(
    Path(state_id): Path<i64>,
    State(pool): State<SqlitePool>,
) -> impl IntoResponse {
    match location_service::list_cities(&pool, state_id).await {
        Ok(cities) => (StatusCode::OK, Json(cities)),
        Err(e) => {
            warn!("📍 Loading cities of state {} failed: {}", state_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Vec::<LocationOption>::new()),
            )
        }
    }
}
