//! Object storage for listing images.
//!
//! Keys look like `listing_images/{listing_id}_{index}_{millis}.{ext}`; the
//! backend turns a key into the public URL the pages link to.

pub mod local;

use async_trait::async_trait;

use crate::error::Result;

pub use local::LocalObjectStorage;

pub const LISTING_IMAGES_PREFIX: &str = "listing_images";

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key`, returning the public URL. Fails if the key
    /// already exists.
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String>;

    /// Remove every key; missing keys are not an error.
    async fn remove(&self, keys: &[String]) -> Result<()>;

    /// Maps a public URL produced by `upload` back to its key.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

pub fn listing_image_key(listing_id: i64, index: usize, millis: i64, extension: &str) -> String {
    format!(
        "{}/{}_{}_{}.{}",
        LISTING_IMAGES_PREFIX, listing_id, index, millis, extension
    )
}
