pub mod auth_service;
pub mod listing_card_service;
pub mod listing_detail_service;
pub mod listing_filter_service;
pub mod listing_form_service;
pub mod listing_publish_service;
pub mod listings_service;
pub mod location_service;
pub mod search_suggestions_service;
