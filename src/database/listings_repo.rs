use sqlx::{SqliteConnection, SqlitePool};

use crate::models::ListingRow;

// Shared projection: listing + category, sub-category, owner, state, city,
// with images and attributes folded into JSON arrays.
macro_rules! listing_projection {
    () => {
        r#"
SELECT
  l.id,
  l.price,
  l.currency,
  l.description,
  l.created_at,
  l.expire_at,
  l.featured,
  l.views,
  l.slug,
  l.category_id,
  c.name AS category_name,
  c.tag AS category_tag,
  l.sub_category_id,
  sc.name AS sub_category_name,
  sc.tag AS sub_category_tag,
  l.user_id,
  u.email AS user_email,
  u.full_name AS user_full_name,
  u.avatar_url AS user_avatar_url,
  u.phone AS user_phone,
  u.phone_verified AS user_phone_verified,
  l.state_id,
  st.name AS state_name,
  l.city_id,
  ci.name AS city_name,
  (
    SELECT json_group_array(
      json_object('id', li.id, 'image_url', li.image_url, 'position', li.position)
    )
    FROM (
      SELECT id, image_url, position
      FROM listing_images
      WHERE listing_id = l.id
      ORDER BY position ASC, id ASC
    ) li
  ) AS images_json,
  (
    SELECT json_group_array(
      json_object('id', la.id, 'name', la.name, 'value', la.value)
    )
    FROM (
      SELECT id, name, value
      FROM listing_attributes
      WHERE listing_id = l.id
      ORDER BY id ASC
    ) la
  ) AS attributes_json
FROM listings l
LEFT JOIN categories c ON c.id = l.category_id
LEFT JOIN sub_categories sc ON sc.id = l.sub_category_id
LEFT JOIN users u ON u.id = l.user_id
LEFT JOIN states st ON st.id = l.state_id
LEFT JOIN cities ci ON ci.id = l.city_id
"#
    };
}

const SQL_LIST_ALL: &str = concat!(
    listing_projection!(),
    r#"
ORDER BY l.created_at DESC, l.id DESC
"#
);

/// Every listing, no limit.
pub async fn list_all(pool: &SqlitePool) -> sqlx::Result<Vec<ListingRow>> {
    sqlx::query_as::<_, ListingRow>(SQL_LIST_ALL)
        .fetch_all(pool)
        .await
}

const SQL_LIST_FILTERED: &str = concat!(
    listing_projection!(),
    r#"
WHERE (? IS NULL OR l.category_id = ?)
  AND (? IS NULL OR l.state_id = ?)
  AND (? IS NULL OR l.city_id = ?)
  AND (
    ? IS NULL
    OR l.id IN (
      SELECT rowid
      FROM listings_search
      WHERE listings_search MATCH ?
    )
  )
ORDER BY l.created_at DESC, l.id DESC
"#
);

/// Equality predicates plus an optional full-text predicate, all ANDed.
/// `match_expr` must already be a valid FTS5 query.
pub async fn list_filtered(
    pool: &SqlitePool,
    category_id: Option<i64>,
    state_id: Option<i64>,
    city_id: Option<i64>,
    match_expr: Option<&str>,
) -> sqlx::Result<Vec<ListingRow>> {
    sqlx::query_as::<_, ListingRow>(SQL_LIST_FILTERED)
        .bind(category_id)
        .bind(category_id)
        .bind(state_id)
        .bind(state_id)
        .bind(city_id)
        .bind(city_id)
        .bind(match_expr)
        .bind(match_expr)
        .fetch_all(pool)
        .await
}

const SQL_LIST_RECENT: &str = concat!(
    listing_projection!(),
    r#"
WHERE (? IS NULL OR l.category_id = ?)
ORDER BY l.created_at DESC, l.id DESC
LIMIT ?
"#
);

pub async fn list_recent(
    pool: &SqlitePool,
    category_id: Option<i64>,
    limit: i64,
) -> sqlx::Result<Vec<ListingRow>> {
    sqlx::query_as::<_, ListingRow>(SQL_LIST_RECENT)
        .bind(category_id)
        .bind(category_id)
        .bind(limit)
        .fetch_all(pool)
        .await
}

const SQL_LIST_BY_USER: &str = concat!(
    listing_projection!(),
    r#"
WHERE l.user_id = ?
ORDER BY l.created_at DESC, l.id DESC
"#
);

pub async fn list_by_user(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Vec<ListingRow>> {
    sqlx::query_as::<_, ListingRow>(SQL_LIST_BY_USER)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

const SQL_LIST_FAVORITES_OF_USER: &str = concat!(
    listing_projection!(),
    r#"
JOIN listing_favorites f ON f.listing_id = l.id
WHERE f.user_id = ?
ORDER BY f.created_at DESC, f.id DESC
"#
);

pub async fn list_favorites_of_user(
    pool: &SqlitePool,
    user_id: &str,
) -> sqlx::Result<Vec<ListingRow>> {
    sqlx::query_as::<_, ListingRow>(SQL_LIST_FAVORITES_OF_USER)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

const SQL_LOAD_BY_ID: &str = concat!(
    listing_projection!(),
    r#"
WHERE l.id = ?
LIMIT 1
"#
);

pub async fn load_by_id(pool: &SqlitePool, listing_id: i64) -> sqlx::Result<Option<ListingRow>> {
    sqlx::query_as::<_, ListingRow>(SQL_LOAD_BY_ID)
        .bind(listing_id)
        .fetch_optional(pool)
        .await
}

const SQL_INSERT_LISTING: &str = r#"
INSERT INTO listings (
  price,
  currency,
  description,
  text_search,
  category_id,
  sub_category_id,
  user_id,
  state_id,
  city_id
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub struct NewListing<'a> {
    pub price: f64,
    pub currency: &'a str,
    pub description: Option<&'a str>,
    pub text_search: &'a str,
    pub category_id: i64,
    pub sub_category_id: Option<i64>,
    pub user_id: &'a str,
    pub state_id: Option<i64>,
    pub city_id: Option<i64>,
}

pub async fn insert_listing(
    conn: &mut SqliteConnection,
    listing: NewListing<'_>,
) -> sqlx::Result<i64> {
    let res = sqlx::query(SQL_INSERT_LISTING)
        .bind(listing.price)
        .bind(listing.currency)
        .bind(listing.description)
        .bind(listing.text_search)
        .bind(listing.category_id)
        .bind(listing.sub_category_id)
        .bind(listing.user_id)
        .bind(listing.state_id)
        .bind(listing.city_id)
        .execute(conn)
        .await?;
    Ok(res.last_insert_rowid())
}

const SQL_UPDATE_LISTING: &str = r#"
UPDATE listings
SET price = ?,
    description = ?,
    text_search = ?,
    category_id = ?,
    sub_category_id = ?,
    state_id = ?,
    city_id = ?,
    update_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
WHERE id = ?
"#;

pub struct ListingChanges<'a> {
    pub price: f64,
    pub description: Option<&'a str>,
    pub text_search: &'a str,
    pub category_id: i64,
    pub sub_category_id: Option<i64>,
    pub state_id: Option<i64>,
    pub city_id: Option<i64>,
}

pub async fn update_listing(
    conn: &mut SqliteConnection,
    listing_id: i64,
    changes: ListingChanges<'_>,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_UPDATE_LISTING)
        .bind(changes.price)
        .bind(changes.description)
        .bind(changes.text_search)
        .bind(changes.category_id)
        .bind(changes.sub_category_id)
        .bind(changes.state_id)
        .bind(changes.city_id)
        .bind(listing_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

const SQL_DELETE_LISTING: &str = r#"
DELETE FROM listings
WHERE id = ?
"#;

pub async fn delete_listing(conn: &mut SqliteConnection, listing_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE_LISTING)
        .bind(listing_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

/// Turns free text into an FTS5 query where every word must appear.
/// Returns `None` when nothing searchable is left.
pub fn match_expression(term: &str) -> Option<String> {
    let words: Vec<String> = term
        .split_whitespace()
        .map(|w| w.replace('"', ""))
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{}\"", w))
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}
