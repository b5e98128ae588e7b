use serde::Deserialize;

use super::users::UserRow;

/// One row of the listing projection: the listing joined with its category,
/// sub-category, owner, state and city, plus images/attributes as JSON arrays.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    pub id: i64,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
    pub expire_at: Option<String>,
    pub featured: Option<bool>,
    pub views: Option<i64>,
    pub slug: Option<String>,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub category_tag: Option<String>,
    pub sub_category_id: Option<i64>,
    pub sub_category_name: Option<String>,
    pub sub_category_tag: Option<String>,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub user_full_name: Option<String>,
    pub user_avatar_url: Option<String>,
    pub user_phone: Option<String>,
    pub user_phone_verified: Option<bool>,
    pub state_id: Option<i64>,
    pub state_name: Option<String>,
    pub city_id: Option<i64>,
    pub city_name: Option<String>,
    pub images_json: Option<String>,
    pub attributes_json: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, sqlx::FromRow)]
pub struct ListingImage {
    pub id: i64,
    pub image_url: String,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, sqlx::FromRow)]
pub struct ListingAttribute {
    pub id: i64,
    pub name: String,
    pub value: String,
}

/// A referenced row reduced to what the pages display.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub id: i64,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
    pub expire_at: Option<String>,
    pub featured: bool,
    pub views: i64,
    pub slug: Option<String>,
    pub category: NamedRef,
    pub sub_category: Option<NamedRef>,
    pub user: Option<UserRow>,
    pub state: Option<NamedRef>,
    pub city: Option<NamedRef>,
    /// Sorted by `position`, then id.
    pub images: Vec<ListingImage>,
    pub attributes: Vec<ListingAttribute>,
}

impl Listing {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.id == user_id)
    }
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        let mut images: Vec<ListingImage> = parse_json_array(row.images_json.as_deref());
        images.sort_by(|a, b| a.position.cmp(&b.position).then(a.id.cmp(&b.id)));

        let mut attributes: Vec<ListingAttribute> =
            parse_json_array(row.attributes_json.as_deref());
        attributes.sort_by_key(|a| a.id);

        let user = match (row.user_id, row.user_email) {
            (Some(id), Some(email)) => Some(UserRow {
                id,
                email,
                full_name: row.user_full_name,
                avatar_url: row.user_avatar_url,
                phone: row.user_phone,
                phone_verified: row.user_phone_verified,
            }),
            _ => None,
        };

        Listing {
            id: row.id,
            price: row.price,
            currency: row.currency,
            description: row.description,
            created_at: row.created_at,
            expire_at: row.expire_at,
            featured: row.featured.unwrap_or(false),
            views: row.views.unwrap_or(0),
            slug: row.slug,
            category: NamedRef {
                id: row.category_id,
                name: row.category_name.unwrap_or_default(),
                tag: row.category_tag,
            },
            sub_category: row.sub_category_id.map(|id| NamedRef {
                id,
                name: row.sub_category_name.unwrap_or_default(),
                tag: row.sub_category_tag,
            }),
            user,
            state: row.state_id.map(|id| NamedRef {
                id,
                name: row.state_name.unwrap_or_default(),
                tag: None,
            }),
            city: row.city_id.map(|id| NamedRef {
                id,
                name: row.city_name.unwrap_or_default(),
                tag: None,
            }),
            images,
            attributes,
        }
    }
}

fn parse_json_array<T: for<'de> Deserialize<'de>>(raw: Option<&str>) -> Vec<T> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    serde_json::from_str::<Vec<T>>(raw).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn listing_row(id: i64, category_id: i64) -> ListingRow {
        ListingRow {
            id,
            price: Some(1500.0),
            currency: Some("USD".to_string()),
            description: Some("Casa con jardín".to_string()),
            created_at: "2025-03-01T10:00:00.000Z".to_string(),
            expire_at: None,
            featured: None,
            views: None,
            slug: None,
            category_id,
            category_name: Some("Inmuebles".to_string()),
            category_tag: Some("inmuebles".to_string()),
            sub_category_id: None,
            sub_category_name: None,
            sub_category_tag: None,
            user_id: Some("user-1".to_string()),
            user_email: Some("ana@example.com".to_string()),
            user_full_name: Some("Ana".to_string()),
            user_avatar_url: None,
            user_phone: None,
            user_phone_verified: None,
            state_id: Some(5),
            state_name: Some("Zulia".to_string()),
            city_id: Some(12),
            city_name: Some("Maracaibo".to_string()),
            images_json: Some("[]".to_string()),
            attributes_json: Some("[]".to_string()),
        }
    }

    #[test]
    fn images_are_ordered_by_position() {
        let mut row = listing_row(1, 1);
        row.images_json = Some(
            r#"[{"id":7,"image_url":"b.jpg","position":1},{"id":3,"image_url":"a.jpg","position":0}]"#
                .to_string(),
        );
        let listing = Listing::from(row);
        let urls: Vec<&str> = listing.images.iter().map(|i| i.image_url.as_str()).collect();
        assert_eq!(urls, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn malformed_aggregates_become_empty() {
        let mut row = listing_row(1, 1);
        row.images_json = Some("not json".to_string());
        row.attributes_json = None;
        let listing = Listing::from(row);
        assert!(listing.images.is_empty());
        assert!(listing.attributes.is_empty());
    }

    #[test]
    fn owner_requires_id_and_email() {
        let mut row = listing_row(1, 1);
        row.user_email = None;
        let listing = Listing::from(row);
        assert!(listing.user.is_none());
        assert!(!listing.is_owned_by("user-1"));
    }
}
