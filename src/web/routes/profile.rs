use askama::Template;
use axum::{extract::State, response::Html, Extension};

use crate::database::user_repo;
use crate::error::{AppError, Result};
use crate::models::UserRow;
use crate::services::listing_card_service::ListingCardView;
use crate::services::listings_service;
use crate::web::layout::PageContext;
use crate::web::middleware::auth::{AuthenticatedUser, Session};
use crate::web::state::AppState;

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub page: PageContext,
    pub user: UserRow,
    pub own_listings: Vec<ListingCardView>,
    pub favorites: Vec<ListingCardView>,
}

pub async fn profile_handler(
    Extension(session): Extension<Session>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> Result<Html<String>> {
    let user = user_repo::load_user(&state.pool, &auth_user.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    let data = listings_service::load_profile_page(&state.pool, &auth_user.id).await?;

    let template = ProfileTemplate {
        page: PageContext::new("Mi perfil", &session, &state.config),
        user,
        own_listings: data.own_listings,
        favorites: data.favorites,
    };
    Ok(Html(template.render()?))
}
