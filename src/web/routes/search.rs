use axum::{extract::Query, Json};
use serde::Deserialize;

use crate::services::search_suggestions_service;

#[derive(Debug, Deserialize)]
pub struct SuggestionsQuery {
    q: Option<String>,
}

pub async fn suggestions_handler(Query(query): Query<SuggestionsQuery>) -> Json<Vec<&'static str>> {
    let q = query.q.as_deref().unwrap_or_default();
    Json(search_suggestions_service::suggest(q))
}
