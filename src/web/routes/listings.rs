use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect},
    Extension,
};
use sqlx::SqlitePool;
use tracing::warn;

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::{Category, CATEGORIES};
use crate::services::listing_card_service::{self, ListingCardView};
use crate::services::listing_detail_service::{self, ListingDetailView};
use crate::services::listing_filter_service::{self, ListingFilter, ListingsQuery};
use crate::services::{listings_service, location_service};
use crate::web::layout::{PageContext, SelectOption};
use crate::web::middleware::auth::{AuthenticatedUser, Session};

#[derive(Template)]
#[template(path = "listings.html")]
pub struct ListingsTemplate {
    pub page: PageContext,
    pub heading: String,
    pub cards: Vec<ListingCardView>,
    pub category_options: Vec<SelectOption>,
    pub location_options: Vec<SelectOption>,
    pub search_term: String,
    pub has_filters: bool,
}

pub async fn listings_handler(
    Extension(session): Extension<Session>,
    Query(query): Query<ListingsQuery>,
    State(pool): State<SqlitePool>,
    State(config): State<Arc<AppConfig>>,
) -> Result<Html<String>> {
    let filter = listing_filter_service::derive_filter(&query);
    let listings = match listings_service::fetch_listings(&pool, &filter).await {
        Ok(listings) => listings,
        Err(e) => {
            warn!("📋 Listing fetch failed for {:?}: {}", filter, e);
            return Err(e);
        }
    };
    let cards = listing_card_service::build_listing_cards(&listings);

    let heading = match filter.category_id.and_then(Category::by_id) {
        Some(category) => category.name.to_string(),
        None if filter.search_term.is_some() => "Resultados de búsqueda".to_string(),
        None => "Todos los anuncios".to_string(),
    };

    let template = ListingsTemplate {
        page: PageContext::new(heading.clone(), &session, &config)
            .with_search_term(filter.search_term.as_deref()),
        heading,
        cards,
        category_options: category_options(filter.category_id),
        location_options: location_options(&pool, &filter).await?,
        search_term: filter.search_term.clone().unwrap_or_default(),
        has_filters: !filter.is_empty(),
    };
    Ok(Html(template.render()?))
}

fn category_options(selected: Option<i64>) -> Vec<SelectOption> {
    CATEGORIES
        .iter()
        .map(|c| SelectOption::new(c.tag, c.name, selected == Some(c.id)))
        .collect()
}

/// States, plus the cities of the selected state as `stateId-cityId` values.
async fn location_options(pool: &SqlitePool, filter: &ListingFilter) -> Result<Vec<SelectOption>> {
    let mut options = Vec::new();
    for state in location_service::list_states(pool).await? {
        let state_selected = filter.state_id == Some(state.id);
        options.push(SelectOption::new(
            state.id,
            state.name.clone(),
            state_selected && filter.city_id.is_none(),
        ));
        if state_selected {
            for city in location_service::list_cities(pool, state.id).await? {
                options.push(SelectOption::new(
                    format!("{}-{}", state.id, city.id),
                    format!("↳ {}", city.name),
                    filter.city_id == Some(city.id),
                ));
            }
        }
    }
    Ok(options)
}

#[derive(Template)]
#[template(path = "listing_detail.html")]
pub struct ListingDetailTemplate {
    pub page: PageContext,
    pub listing: ListingDetailView,
}

pub async fn listing_detail_handler(
    Extension(session): Extension<Session>,
    Path(listing_id): Path<i64>,
    State(pool): State<SqlitePool>,
    State(config): State<Arc<AppConfig>>,
) -> Result<Html<String>> {
    let listing =
        listing_detail_service::load_listing_detail(&pool, listing_id, session.user_id()).await?;
    let template = ListingDetailTemplate {
        page: PageContext::new(listing.title.clone(), &session, &config),
        listing,
    };
    Ok(Html(template.render()?))
}

pub async fn favorite_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(listing_id): Path<i64>,
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse> {
    listings_service::toggle_favorite(&pool, listing_id, &auth_user.id).await?;
    Ok(Redirect::to(&format!("/a/{}", listing_id)))
}
