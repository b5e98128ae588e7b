//! Maps listings to the card shown in grids. Pure and deterministic.

use crate::models::{CategoryKind, Listing};
use crate::services::listing_form_service::contract_type_label;

pub const IMAGE_PLACEHOLDER_LABEL: &str = "Sin imagen";
pub const DESCRIPTION_PLACEHOLDER: &str = "Sin descripción";
pub const REMOTE_LABEL: &str = "Remoto";

#[derive(Debug, Clone, PartialEq)]
pub struct ListingCardView {
    pub listing_id: i64,
    pub href: String,
    pub title: String,
    /// `None` renders the "Sin imagen" placeholder.
    pub image_url: Option<String>,
    pub price_label: String,
    pub location_label: String,
    pub category_label: String,
    pub description: String,
    pub featured: bool,
}

pub fn build_listing_card(listing: &Listing) -> ListingCardView {
    ListingCardView {
        listing_id: listing.id,
        href: format!("/a/{}", listing.id),
        title: listing_title(listing),
        image_url: listing.images.first().map(|img| img.image_url.clone()),
        price_label: price_label(listing.price, listing.currency.as_deref()),
        location_label: location_label(listing),
        category_label: listing.category.name.clone(),
        description: listing
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DESCRIPTION_PLACEHOLDER)
            .to_string(),
        featured: listing.featured,
    }
}

pub fn build_listing_cards(listings: &[Listing]) -> Vec<ListingCardView> {
    listings.iter().map(build_listing_card).collect()
}

/// Headline for a listing, taken from the attribute its form family fills in.
pub fn listing_title(listing: &Listing) -> String {
    let title = match CategoryKind::for_category_id(listing.category.id) {
        CategoryKind::Property => {
            let sub = listing.sub_category.as_ref().map(|s| s.name.clone());
            let contract = listing
                .attribute("property_contract_type")
                .map(|c| contract_type_label(c).unwrap_or(c).to_lowercase());
            match (sub, contract) {
                (Some(sub), Some(contract)) => Some(format!("{} en {}", sub, contract)),
                (Some(sub), None) => Some(sub),
                (None, Some(contract)) => Some(contract),
                (None, None) => None,
            }
        }
        CategoryKind::Vehicle => {
            let parts: Vec<&str> = ["vehicle_brand", "vehicle_model", "vehicle_year"]
                .iter()
                .filter_map(|name| listing.attribute(name))
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        CategoryKind::Job => listing.attribute("job_title").map(str::to_string),
        CategoryKind::Product => listing.attribute("product_title").map(str::to_string),
    };

    title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| listing.category.name.clone())
}

/// Remote jobs show "Remoto"; everything else shows "State, City" (or
/// whichever half is known).
pub fn location_label(listing: &Listing) -> String {
    if CategoryKind::for_category_id(listing.category.id) == CategoryKind::Job
        && listing.attribute("remote") == Some(REMOTE_LABEL)
    {
        return REMOTE_LABEL.to_string();
    }

    let state = listing.state.as_ref().map(|s| s.name.as_str());
    let city = listing.city.as_ref().map(|c| c.name.as_str());
    match (state, city) {
        (Some(state), Some(city)) => format!("{}, {}", state, city),
        (Some(state), None) => state.to_string(),
        (None, Some(city)) => city.to_string(),
        (None, None) => String::new(),
    }
}

pub fn price_label(price: Option<f64>, currency: Option<&str>) -> String {
    match price {
        Some(price) => {
            let symbol = currency_symbol(currency.unwrap_or("USD"));
            format!("{} {}", format_price(price), symbol)
        }
        None => "Precio a convenir".to_string(),
    }
}

fn currency_symbol(currency: &str) -> &str {
    match currency.trim().to_ascii_uppercase().as_str() {
        "USD" | "" => "$",
        "EUR" => "€",
        "VES" | "BS" => "Bs.",
        _ => currency,
    }
}

/// es-ES style number: `.` groups thousands, `,` separates decimals, at most
/// three fraction digits with trailing zeros dropped.
pub fn format_price(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }

    let negative = value < 0.0;
    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    // Four-digit integers are grouped too ("1.500").
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative && (int_part != "0" || !frac.is_empty()) {
        out.push('-');
    }
    out.push_str(&grouped);
    if !frac.is_empty() {
        out.push(',');
        out.push_str(frac);
    }
    out
}
