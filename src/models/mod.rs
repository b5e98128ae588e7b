pub mod categories;
pub mod listings;
pub mod locations;
pub mod users;

pub use categories::{
    Category, CategoryKind, CategoryRow, SubCategoryRow, CATEGORIES, JOB_CATEGORY_ID,
    PROPERTY_CATEGORY_ID, VEHICLE_CATEGORY_ID,
};
pub use listings::{Listing, ListingAttribute, ListingImage, ListingRow, NamedRef};
pub use locations::{CityRow, StateRow};
pub use users::UserRow;
