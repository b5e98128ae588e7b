use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::info;

use crate::database::{favorites_repo, listings_repo};
use crate::error::{AppError, Result};
use crate::models::{Listing, PROPERTY_CATEGORY_ID, VEHICLE_CATEGORY_ID};
use crate::services::listing_card_service::{self, ListingCardView};
use crate::services::listing_filter_service::ListingFilter;

pub const RECENT_LIMIT: i64 = 10;
pub const RECENT_BY_CATEGORY_LIMIT: i64 = 6;

/// The two query operations the listing pages choose between.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Listing>>;

    async fn fetch_filtered(&self, filter: &ListingFilter) -> Result<Vec<Listing>>;
}

#[async_trait]
impl ListingSource for SqlitePool {
    async fn fetch_all(&self) -> Result<Vec<Listing>> {
        let rows = listings_repo::list_all(self).await?;
        Ok(rows.into_iter().map(Listing::from).collect())
    }

    async fn fetch_filtered(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        let match_expr = filter.match_expression();
        let rows = listings_repo::list_filtered(
            self,
            filter.category_id,
            filter.state_id,
            filter.city_id,
            match_expr.as_deref(),
        )
        .await?;
        Ok(rows.into_iter().map(Listing::from).collect())
    }
}

/// Fetch-all when no filter is set, fetch-filtered otherwise. Errors are
/// passed through untouched.
pub async fn fetch_listings<S>(source: &S, filter: &ListingFilter) -> Result<Vec<Listing>>
where
    S: ListingSource + ?Sized,
{
    if filter.is_empty() {
        source.fetch_all().await
    } else {
        source.fetch_filtered(filter).await
    }
}

pub struct HomePageData {
    pub recent: Vec<ListingCardView>,
    pub recent_properties: Vec<ListingCardView>,
    pub recent_vehicles: Vec<ListingCardView>,
}

pub async fn load_home_page(pool: &SqlitePool) -> Result<HomePageData> {
    let recent = recent_cards(pool, None, RECENT_LIMIT).await?;
    let recent_properties =
        recent_cards(pool, Some(PROPERTY_CATEGORY_ID), RECENT_BY_CATEGORY_LIMIT).await?;
    let recent_vehicles =
        recent_cards(pool, Some(VEHICLE_CATEGORY_ID), RECENT_BY_CATEGORY_LIMIT).await?;

    Ok(HomePageData {
        recent,
        recent_properties,
        recent_vehicles,
    })
}

async fn recent_cards(
    pool: &SqlitePool,
    category_id: Option<i64>,
    limit: i64,
) -> Result<Vec<ListingCardView>> {
    let rows = listings_repo::list_recent(pool, category_id, limit).await?;
    let listings: Vec<Listing> = rows.into_iter().map(Listing::from).collect();
    Ok(listing_card_service::build_listing_cards(&listings))
}

pub async fn load_listing(pool: &SqlitePool, listing_id: i64) -> Result<Listing> {
    listings_repo::load_by_id(pool, listing_id)
        .await?
        .map(Listing::from)
        .ok_or(AppError::NotFound)
}

/// Loads a listing and checks that `user_id` owns it.
pub async fn load_owned_listing(pool: &SqlitePool, listing_id: i64, user_id: &str) -> Result<Listing> {
    let listing = load_listing(pool, listing_id).await?;
    if !listing.is_owned_by(user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(listing)
}

pub struct ProfilePageData {
    pub own_listings: Vec<ListingCardView>,
    pub favorites: Vec<ListingCardView>,
}

pub async fn load_profile_page(pool: &SqlitePool, user_id: &str) -> Result<ProfilePageData> {
    let own: Vec<Listing> = listings_repo::list_by_user(pool, user_id)
        .await?
        .into_iter()
        .map(Listing::from)
        .collect();
    let favorites: Vec<Listing> = listings_repo::list_favorites_of_user(pool, user_id)
        .await?
        .into_iter()
        .map(Listing::from)
        .collect();

    Ok(ProfilePageData {
        own_listings: listing_card_service::build_listing_cards(&own),
        favorites: listing_card_service::build_listing_cards(&favorites),
    })
}

/// Flips the favourite flag and returns the new state.
pub async fn toggle_favorite(pool: &SqlitePool, listing_id: i64, user_id: &str) -> Result<bool> {
    // 404 for unknown listings rather than a dangling favourite row.
    load_listing(pool, listing_id).await?;

    if favorites_repo::is_favorite(pool, listing_id, user_id).await? {
        favorites_repo::remove_favorite(pool, listing_id, user_id).await?;
        info!("⭐ Listing {} removed from favourites of {}", listing_id, user_id);
        Ok(false)
    } else {
        favorites_repo::add_favorite(pool, listing_id, user_id).await?;
        info!("⭐ Listing {} added to favourites of {}", listing_id, user_id);
        Ok(true)
    }
}
