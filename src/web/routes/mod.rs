pub mod auth;
pub mod home;
pub mod listings;
pub mod locations;
pub mod profile;
pub mod publish;
pub mod search;
