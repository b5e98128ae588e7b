use serde::Deserialize;

use crate::database::listings_repo;
use crate::models::Category;

/// Raw query string of the listing pages (`/anuncios`, `/buscar`).
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ListingsQuery {
    pub category: Option<String>,
    pub location: Option<String>,
    pub q: Option<String>,
}

/// Normalized query descriptor. All `None` means "fetch all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    pub category_id: Option<i64>,
    pub state_id: Option<i64>,
    pub city_id: Option<i64>,
    pub search_term: Option<String>,
}

impl ListingFilter {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.state_id.is_none()
            && self.city_id.is_none()
            && self.search_term.is_none()
    }

    /// FTS5 expression for the search term, if any word survives.
    pub fn match_expression(&self) -> Option<String> {
        self.search_term
            .as_deref()
            .and_then(listings_repo::match_expression)
    }

    /// `stateId-cityId` form used by the location picker, or `None`.
    pub fn location_param(&self) -> Option<String> {
        match (self.state_id, self.city_id) {
            (None, None) => None,
            (Some(s), None) => Some(s.to_string()),
            (None, Some(c)) => Some(format!("-{}", c)),
            (Some(s), Some(c)) => Some(format!("{}-{}", s, c)),
        }
    }
}

pub fn derive_filter(query: &ListingsQuery) -> ListingFilter {
    let category_id = non_empty(query.category.as_deref())
        .and_then(Category::by_tag)
        .map(|c| c.id);

    let (state_id, city_id) = non_empty(query.location.as_deref())
        .map(parse_location)
        .unwrap_or((None, None));

    let search_term = non_empty(query.q.as_deref()).map(str::to_string);

    ListingFilter {
        category_id,
        state_id,
        city_id,
        search_term,
    }
}

/// Reads `"stateId-cityId"`: the first hyphen-separated segment is the state,
/// the second the city, anything after is ignored. A missing or non-numeric
/// segment yields `None` for that side.
pub fn parse_location(raw: &str) -> (Option<i64>, Option<i64>) {
    let mut parts = raw.split('-');
    let parse = |part: Option<&str>| part.and_then(|p| p.trim().parse::<i64>().ok());
    let state = parse(parts.next());
    let city = parse(parts.next());
    (state, city)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(category: Option<&str>, location: Option<&str>, q: Option<&str>) -> ListingsQuery {
        ListingsQuery {
            category: category.map(str::to_string),
            location: location.map(str::to_string),
            q: q.map(str::to_string),
        }
    }

    #[test]
    fn category_tag_resolves_to_its_id() {
        let filter = derive_filter(&query(Some("inmuebles"), None, None));
        assert_eq!(filter.category_id, Some(1));
        assert_eq!(filter.state_id, None);
        assert_eq!(filter.city_id, None);
        assert_eq!(filter.search_term, None);
        assert!(!filter.is_empty());
    }

    #[test]
    fn no_parameters_means_fetch_all() {
        let filter = derive_filter(&ListingsQuery::default());
        assert_eq!(filter, ListingFilter::default());
        assert!(filter.is_empty());
    }

    #[test]
    fn blank_parameters_count_as_absent() {
        let filter = derive_filter(&query(Some(" "), Some(""), Some("   ")));
        assert!(filter.is_empty());
    }

    #[test]
    fn unknown_category_is_ignored() {
        let filter = derive_filter(&query(Some("barcos"), None, None));
        assert_eq!(filter.category_id, None);
        assert!(filter.is_empty());
    }

    #[test]
    fn location_pairs_split_on_the_hyphen() {
        let filter = derive_filter(&query(None, Some("5-12"), None));
        assert_eq!((filter.state_id, filter.city_id), (Some(5), Some(12)));

        let filter = derive_filter(&query(None, Some("5"), None));
        assert_eq!((filter.state_id, filter.city_id), (Some(5), None));
    }

    #[test]
    fn malformed_location_sides_are_dropped() {
        assert_eq!(parse_location("-12"), (None, Some(12)));
        assert_eq!(parse_location("5-"), (Some(5), None));
        assert_eq!(parse_location("x-y"), (None, None));
    }

    #[test]
    fn segments_after_the_city_are_ignored() {
        assert_eq!(parse_location("5-12-3"), (Some(5), Some(12)));
        let filter = derive_filter(&query(None, Some("5-12-3"), None));
        assert_eq!((filter.state_id, filter.city_id), (Some(5), Some(12)));
    }

    #[test]
    fn search_term_is_trimmed() {
        let filter = derive_filter(&query(None, None, Some("  casa playa ")));
        assert_eq!(filter.search_term.as_deref(), Some("casa playa"));
        assert_eq!(
            filter.match_expression().as_deref(),
            Some("\"casa\" \"playa\"")
        );
    }

    #[test]
    fn location_param_round_trips_the_picker_value() {
        let filter = derive_filter(&query(None, Some("5-12"), None));
        assert_eq!(filter.location_param().as_deref(), Some("5-12"));
        assert_eq!(ListingFilter::default().location_param(), None);
    }
}
