use std::sync::Arc;

use askama::Template;
use axum::{extract::State, response::Html, Extension};
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::CATEGORIES;
use crate::services::listing_card_service::ListingCardView;
use crate::services::listings_service;
use crate::web::layout::PageContext;
use crate::web::middleware::auth::Session;

pub struct CategoryLink {
    pub name: &'static str,
    pub tag: &'static str,
    pub href: String,
}

pub fn category_links() -> Vec<CategoryLink> {
    CATEGORIES
        .iter()
        .map(|c| CategoryLink {
            name: c.name,
            tag: c.tag,
            href: format!("/anuncios?category={}", c.tag),
        })
        .collect()
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub categories: Vec<CategoryLink>,
    pub recent: Vec<ListingCardView>,
    pub recent_properties: Vec<ListingCardView>,
    pub recent_vehicles: Vec<ListingCardView>,
}

pub async fn home_handler(
    Extension(session): Extension<Session>,
    State(pool): State<SqlitePool>,
    State(config): State<Arc<AppConfig>>,
) -> Result<Html<String>> {
    let data = listings_service::load_home_page(&pool).await?;
    let template = HomeTemplate {
        page: PageContext::new("Clasificados", &session, &config),
        categories: category_links(),
        recent: data.recent,
        recent_properties: data.recent_properties,
        recent_vehicles: data.recent_vehicles,
    };
    Ok(Html(template.render()?))
}

#[derive(Template)]
#[template(path = "categories.html")]
pub struct CategoriesTemplate {
    pub page: PageContext,
    pub categories: Vec<CategoryLink>,
}

pub async fn categories_handler(
    Extension(session): Extension<Session>,
    State(config): State<Arc<AppConfig>>,
) -> Result<Html<String>> {
    let template = CategoriesTemplate {
        page: PageContext::new("Categorías", &session, &config),
        categories: category_links(),
    };
    Ok(Html(template.render()?))
}
