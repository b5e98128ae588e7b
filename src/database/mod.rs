pub mod categories_repo;
pub mod favorites_repo;
pub mod listing_attributes_repo;
pub mod listing_images_repo;
pub mod listings_repo;
pub mod locations_repo;
pub mod pool;
pub mod user_repo;
