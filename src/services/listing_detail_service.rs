use chrono::{DateTime, NaiveDate};
use sqlx::SqlitePool;

use crate::database::favorites_repo;
use crate::error::Result;
use crate::models::{Listing, ListingImage};
use crate::services::listing_card_service;
use crate::services::listing_form_service::{contract_type_label, product_state_label};
use crate::services::listings_service;

pub struct AttributeView {
    pub label: String,
    pub value: String,
}

pub struct OwnerView {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub phone_verified: bool,
    pub avatar_url: Option<String>,
}

pub struct ListingDetailView {
    pub listing_id: i64,
    pub title: String,
    pub price_label: String,
    pub location_label: String,
    pub category_name: String,
    pub category_tag: String,
    pub sub_category_name: Option<String>,
    pub description: Option<String>,
    pub published_label: String,
    pub images: Vec<ListingImage>,
    pub attributes: Vec<AttributeView>,
    pub owner: Option<OwnerView>,
    pub is_owner: bool,
    pub is_favorite: bool,
}

pub fn attribute_label(name: &str) -> &str {
    match name {
        "property_contract_type" => "contrato",
        "vehicle_brand" => "marca",
        "vehicle_model" => "modelo",
        "vehicle_year" => "año",
        "product_title" => "título",
        "product_state" => "estado",
        "job_title" => "título",
        "remote" => "modalidad",
        other => other,
    }
}

fn attribute_value(name: &str, value: &str) -> String {
    let label = match name {
        "property_contract_type" => contract_type_label(value),
        "product_state" => product_state_label(value),
        _ => None,
    };
    label.unwrap_or(value).to_string()
}

pub async fn load_listing_detail(
    pool: &SqlitePool,
    listing_id: i64,
    viewer_id: Option<&str>,
) -> Result<ListingDetailView> {
    let listing = listings_service::load_listing(pool, listing_id).await?;
    let is_favorite = match viewer_id {
        Some(user_id) => favorites_repo::is_favorite(pool, listing_id, user_id).await?,
        None => false,
    };
    Ok(build_view(listing, viewer_id, is_favorite))
}

fn build_view(listing: Listing, viewer_id: Option<&str>, is_favorite: bool) -> ListingDetailView {
    let title = listing_card_service::listing_title(&listing);
    let price_label =
        listing_card_service::price_label(listing.price, listing.currency.as_deref());
    let location_label = listing_card_service::location_label(&listing);
    let is_owner = viewer_id.is_some_and(|id| listing.is_owned_by(id));

    let attributes = listing
        .attributes
        .iter()
        .map(|a| AttributeView {
            label: attribute_label(&a.name).to_string(),
            value: attribute_value(&a.name, &a.value),
        })
        .collect();

    let owner = listing.user.as_ref().map(|u| OwnerView {
        name: u
            .full_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| u.email.clone()),
        email: u.email.clone(),
        phone: u.phone.clone().filter(|p| !p.trim().is_empty()),
        phone_verified: u.phone_verified.unwrap_or(false),
        avatar_url: u.avatar_url.clone(),
    });

    ListingDetailView {
        listing_id: listing.id,
        title,
        price_label,
        location_label,
        category_name: listing.category.name.clone(),
        category_tag: listing.category.tag.clone().unwrap_or_default(),
        sub_category_name: listing.sub_category.as_ref().map(|s| s.name.clone()),
        description: listing
            .description
            .clone()
            .filter(|d| !d.trim().is_empty()),
        published_label: format_published(&listing.created_at),
        images: listing.images,
        attributes,
        owner,
        is_owner,
        is_favorite,
    }
}

/// `2025-03-01T10:00:00.000Z` → `01/03/2025`.
fn format_published(created_at: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(created_at) {
        return dt.format("%d/%m/%Y").to_string();
    }
    created_at
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}
