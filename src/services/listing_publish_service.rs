//! Create, edit and delete listings.
//!
//! Database writes of one submission share a transaction. Images are uploaded
//! while that transaction is open; if anything fails afterwards the objects
//! uploaded so far are removed again before the error is returned.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::database::listings_repo::{self, ListingChanges, NewListing};
use crate::database::{
    categories_repo, favorites_repo, listing_attributes_repo, listing_images_repo, locations_repo,
};
use crate::error::{AppError, Result};
use crate::services::listing_form_service::{FieldErrors, ImageUpload, ListingDraft};
use crate::services::listings_service;
use crate::storage::{listing_image_key, ObjectStorage};

/// Checks the references a draft points at: the sub-category must belong to
/// the listing's category and the city to the chosen state.
pub async fn check_references(pool: &SqlitePool, draft: &ListingDraft) -> Result<()> {
    let mut errors = FieldErrors::new();

    if let Some(sub_id) = draft.sub_category_id {
        match categories_repo::load_sub_category(pool, sub_id).await? {
            Some(sub) if sub.category_id == draft.category_id => {}
            _ => errors.add("sub_category_id", "Selección inválida."),
        }
    }

    if let Some(city_id) = draft.city_id {
        match locations_repo::load_city(pool, city_id).await? {
            Some(city) if draft.state_id.is_none() || city.state_id == draft.state_id => {}
            _ => errors.add("city_id", "La ciudad no pertenece al estado seleccionado."),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

pub async fn create_listing(
    pool: &SqlitePool,
    storage: &dyn ObjectStorage,
    user_id: &str,
    draft: &ListingDraft,
    uploads: &[ImageUpload],
) -> Result<i64> {
    check_references(pool, draft).await?;

    let mut uploaded: Vec<String> = Vec::new();
    match create_in_transaction(pool, storage, user_id, draft, uploads, &mut uploaded).await {
        Ok(listing_id) => {
            info!(
                "📦 Listing {} created by {} with {} images",
                listing_id,
                user_id,
                uploaded.len()
            );
            Ok(listing_id)
        }
        Err(e) => {
            discard_uploads(storage, &uploaded).await;
            Err(e)
        }
    }
}

async fn create_in_transaction(
    pool: &SqlitePool,
    storage: &dyn ObjectStorage,
    user_id: &str,
    draft: &ListingDraft,
    uploads: &[ImageUpload],
    uploaded: &mut Vec<String>,
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let listing_id = listings_repo::insert_listing(
        &mut tx,
        NewListing {
            price: draft.price,
            currency: &draft.currency,
            description: draft.description.as_deref(),
            text_search: &draft.text_search,
            category_id: draft.category_id,
            sub_category_id: draft.sub_category_id,
            user_id,
            state_id: draft.state_id,
            city_id: draft.city_id,
        },
    )
    .await?;

    write_attributes(&mut tx, listing_id, draft).await?;
    upload_images(&mut tx, storage, listing_id, 0, uploads, uploaded).await?;

    tx.commit().await?;
    Ok(listing_id)
}

/// Applies an edit. `kept_image_ids` lists the existing images to keep; the
/// rest are removed once the edit is committed.
pub async fn update_listing(
    pool: &SqlitePool,
    storage: &dyn ObjectStorage,
    user_id: &str,
    listing_id: i64,
    draft: &ListingDraft,
    kept_image_ids: &[i64],
    uploads: &[ImageUpload],
) -> Result<()> {
    let listing = listings_service::load_owned_listing(pool, listing_id, user_id).await?;
    check_references(pool, draft).await?;

    let dropped: Vec<_> = listing
        .images
        .iter()
        .filter(|img| !kept_image_ids.contains(&img.id))
        .cloned()
        .collect();

    let mut uploaded: Vec<String> = Vec::new();
    let result = async {
        let mut tx = pool.begin().await?;

        listings_repo::update_listing(
            &mut tx,
            listing_id,
            ListingChanges {
                price: draft.price,
                description: draft.description.as_deref(),
                text_search: &draft.text_search,
                category_id: draft.category_id,
                sub_category_id: draft.sub_category_id,
                state_id: draft.state_id,
                city_id: draft.city_id,
            },
        )
        .await?;
        write_attributes(&mut tx, listing_id, draft).await?;

        for image in &dropped {
            listing_images_repo::delete_image(&mut tx, listing_id, image.id).await?;
        }
        let start = listing_images_repo::next_position(&mut tx, listing_id).await?;
        upload_images(&mut tx, storage, listing_id, start, uploads, &mut uploaded).await?;

        tx.commit().await?;
        Ok::<(), AppError>(())
    }
    .await;

    if let Err(e) = result {
        discard_uploads(storage, &uploaded).await;
        return Err(e);
    }

    let urls: Vec<&str> = dropped.iter().map(|i| i.image_url.as_str()).collect();
    remove_objects(storage, &urls).await;
    info!(
        "✏️ Listing {} updated by {} ({} images added, {} removed)",
        listing_id,
        user_id,
        uploaded.len(),
        dropped.len()
    );
    Ok(())
}

/// Deletes the listing with its images, attributes and favourites, then its
/// stored objects.
pub async fn delete_listing(
    pool: &SqlitePool,
    storage: &dyn ObjectStorage,
    user_id: &str,
    listing_id: i64,
) -> Result<()> {
    let listing = listings_service::load_owned_listing(pool, listing_id, user_id).await?;

    let mut tx = pool.begin().await?;
    favorites_repo::delete_for_listing(&mut tx, listing_id).await?;
    listing_images_repo::delete_for_listing(&mut tx, listing_id).await?;
    listing_attributes_repo::delete_for_listing(&mut tx, listing_id).await?;
    listings_repo::delete_listing(&mut tx, listing_id).await?;
    tx.commit().await?;

    let urls: Vec<&str> = listing.images.iter().map(|i| i.image_url.as_str()).collect();
    remove_objects(storage, &urls).await;
    info!("🗑️ Listing {} deleted by {}", listing_id, user_id);
    Ok(())
}

async fn write_attributes(
    conn: &mut SqliteConnection,
    listing_id: i64,
    draft: &ListingDraft,
) -> Result<()> {
    for (name, value) in &draft.attributes {
        listing_attributes_repo::upsert_attribute(&mut *conn, listing_id, name, value).await?;
    }
    Ok(())
}

/// Uploads sequentially; every stored key is pushed to `uploaded` as soon as
/// it exists so the caller can clean up.
async fn upload_images(
    conn: &mut SqliteConnection,
    storage: &dyn ObjectStorage,
    listing_id: i64,
    start_position: i64,
    uploads: &[ImageUpload],
    uploaded: &mut Vec<String>,
) -> Result<()> {
    let millis = Utc::now().timestamp_millis();
    for (index, upload) in uploads.iter().enumerate() {
        let position = start_position + index as i64;
        let key = listing_image_key(listing_id, position as usize, millis, upload.extension());
        let url = storage
            .upload(&key, &upload.bytes, &upload.content_type)
            .await?;
        uploaded.push(key);
        listing_images_repo::insert_image(&mut *conn, listing_id, &url, position).await?;
    }
    Ok(())
}

async fn discard_uploads(storage: &dyn ObjectStorage, keys: &[String]) {
    if keys.is_empty() {
        return;
    }
    warn!("🧹 Removing {} orphaned uploads", keys.len());
    if let Err(e) = storage.remove(keys).await {
        warn!("🧹 Cleanup of uploads {:?} failed: {}", keys, e);
    }
}

async fn remove_objects(storage: &dyn ObjectStorage, urls: &[&str]) {
    let keys: Vec<String> = urls
        .iter()
        .filter_map(|url| storage.key_for_url(url))
        .collect();
    if keys.is_empty() {
        return;
    }
    if let Err(e) = storage.remove(&keys).await {
        warn!("🖼️ Could not remove stored images {:?}: {}", keys, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::listings_repo::tests::seed;
    use crate::database::pool::test_pool;
    use crate::models::Category;
    use crate::services::listing_form_service::{validate_listing_form, ListingFormValues};
    use crate::storage::LocalObjectStorage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn draft(tag: &str, pairs: &[(&str, &str)]) -> ListingDraft {
        let mut values = ListingFormValues::default();
        for (name, value) in pairs {
            values.set(name, value.to_string());
        }
        validate_listing_form(Category::by_tag(tag).unwrap(), &values).unwrap()
    }

    fn product_draft() -> ListingDraft {
        draft(
            "electronica",
            &[
                ("price", "250"),
                ("product_title", "Tablet"),
                ("product_state", "new"),
                ("state_id", "5"),
                ("city_id", "12"),
            ],
        )
    }

    fn png(n: u8) -> ImageUpload {
        ImageUpload::new(format!("{}.png", n), Some("image/png".into()), vec![n; 4])
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    /// Local storage that fails the upload with the given index.
    struct FlakyStorage {
        inner: LocalObjectStorage,
        fail_at: usize,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ObjectStorage for FlakyStorage {
        async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls - 1
            };
            if n == self.fail_at {
                return Err(AppError::storage("bucket unavailable"));
            }
            self.inner.upload(key, bytes, content_type).await
        }

        async fn remove(&self, keys: &[String]) -> Result<()> {
            self.inner.remove(keys).await
        }

        fn key_for_url(&self, url: &str) -> Option<String> {
            self.inner.key_for_url(url)
        }
    }

    fn stored_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir.join("listing_images"))
            .map(|d| d.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn create_writes_rows_and_objects() {
        let pool = test_pool().await;
        seed(&pool).await;
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/storage");

        let id = create_listing(&pool, &storage, "user-1", &product_draft(), &[png(1), png(2)])
            .await
            .unwrap();

        let listing = listings_service::load_listing(&pool, id).await.unwrap();
        assert_eq!(listing.category.id, 9);
        assert_eq!(listing.images.len(), 2);
        assert_eq!(listing.images[0].position, 0);
        assert!(listing.images[0].image_url.starts_with("/storage/listing_images/"));
        assert_eq!(listing.attribute("product_title"), Some("Tablet"));
        assert_eq!(stored_files(dir.path()), 2);
    }

    #[tokio::test]
    async fn failed_create_leaves_nothing_behind() {
        let pool = test_pool().await;
        seed(&pool).await;
        let dir = tempfile::tempdir().unwrap();
        let storage = FlakyStorage {
            inner: LocalObjectStorage::new(dir.path(), "/storage"),
            fail_at: 1,
            calls: Mutex::new(0),
        };

        let err = create_listing(&pool, &storage, "user-1", &product_draft(), &[png(1), png(2)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        assert_eq!(count(&pool, "listings").await, 0);
        assert_eq!(count(&pool, "listing_images").await, 0);
        assert_eq!(count(&pool, "listing_attributes").await, 0);
        assert_eq!(stored_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn city_must_belong_to_the_state() {
        let pool = test_pool().await;
        seed(&pool).await;
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/storage");

        let mismatched = draft(
            "hogar",
            &[
                ("price", "10"),
                ("product_title", "Silla"),
                ("product_state", "used"),
                ("state_id", "6"),
                ("city_id", "12"),
            ],
        );
        let err = create_listing(&pool, &storage, "user-1", &mismatched, &[png(1)])
            .await
            .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.has("city_id")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn update_swaps_images_and_attributes() {
        let pool = test_pool().await;
        seed(&pool).await;
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/storage");

        let id = create_listing(&pool, &storage, "user-1", &product_draft(), &[png(1), png(2)])
            .await
            .unwrap();
        let before = listings_service::load_listing(&pool, id).await.unwrap();
        let keep = before.images[1].id;

        let edited = draft(
            "electronica",
            &[
                ("price", "199"),
                ("product_title", "Tablet Pro"),
                ("product_state", "used"),
            ],
        );
        update_listing(&pool, &storage, "user-1", id, &edited, &[keep], &[png(3)])
            .await
            .unwrap();

        let after = listings_service::load_listing(&pool, id).await.unwrap();
        assert_eq!(after.price, Some(199.0));
        assert_eq!(after.attribute("product_title"), Some("Tablet Pro"));
        assert_eq!(after.attribute("product_state"), Some("used"));
        assert_eq!(after.attributes.len(), 2);
        assert_eq!(after.images.len(), 2);
        assert_eq!(after.images[0].id, keep);
        assert_eq!(after.images[1].position, 2);
        assert!(after.state.is_none());
        assert_eq!(stored_files(dir.path()), 2);
    }

    #[tokio::test]
    async fn failed_update_keeps_the_listing_as_it_was() {
        let pool = test_pool().await;
        seed(&pool).await;
        let dir = tempfile::tempdir().unwrap();
        let local = LocalObjectStorage::new(dir.path(), "/storage");
        let id = create_listing(&pool, &local, "user-1", &product_draft(), &[png(1), png(2)])
            .await
            .unwrap();
        let before = listings_service::load_listing(&pool, id).await.unwrap();

        let flaky = FlakyStorage {
            inner: LocalObjectStorage::new(dir.path(), "/storage"),
            fail_at: 1,
            calls: Mutex::new(0),
        };
        let edited = draft(
            "electronica",
            &[
                ("price", "199"),
                ("product_title", "Tablet Pro"),
                ("product_state", "used"),
            ],
        );
        let err = update_listing(&pool, &flaky, "user-1", id, &edited, &[], &[png(3), png(4)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let after = listings_service::load_listing(&pool, id).await.unwrap();
        assert_eq!(after.price, Some(250.0));
        assert_eq!(after.attribute("product_title"), Some("Tablet"));
        assert_eq!(after.attribute("product_state"), Some("new"));
        let ids = |l: &crate::models::Listing| l.images.iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids(&after), ids(&before));
        assert_eq!(after.state.as_ref().map(|s| s.id), Some(5));
        assert_eq!(stored_files(dir.path()), 2);
        for image in &after.images {
            let key = local.key_for_url(&image.image_url).unwrap();
            assert!(dir.path().join(key).exists());
        }
    }

    #[tokio::test]
    async fn only_the_owner_can_edit_or_delete() {
        let pool = test_pool().await;
        seed(&pool).await;
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/storage");
        let id = create_listing(&pool, &storage, "user-1", &product_draft(), &[png(1)])
            .await
            .unwrap();

        let err = update_listing(&pool, &storage, "mallory", id, &product_draft(), &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let err = delete_listing(&pool, &storage, "mallory", id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(count(&pool, "listings").await, 1);
    }

    #[tokio::test]
    async fn delete_removes_rows_and_objects() {
        let pool = test_pool().await;
        seed(&pool).await;
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/storage");
        let id = create_listing(&pool, &storage, "user-1", &product_draft(), &[png(1), png(2)])
            .await
            .unwrap();
        favorites_repo::add_favorite(&pool, id, "user-1").await.unwrap();

        delete_listing(&pool, &storage, "user-1", id).await.unwrap();

        for table in ["listings", "listing_images", "listing_attributes", "listing_favorites"] {
            assert_eq!(count(&pool, table).await, 0, "{table} not empty");
        }
        assert_eq!(stored_files(dir.path()), 0);
    }
}
