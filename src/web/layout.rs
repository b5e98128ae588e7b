//! Data every page template needs for the shared layout.

use crate::config::AppConfig;
use crate::web::middleware::auth::Session;

pub const BUILD_ID: &str = env!("CLASIFICADOS_BUILD_ID");

#[derive(Debug, Clone)]
pub struct AdSlotView {
    pub client_id: String,
    pub header: String,
    pub sidebar_left: String,
    pub sidebar_right: String,
    pub in_content_1: String,
    pub in_content_2: String,
    pub in_content_3: String,
    pub footer: String,
}

/// One `<option>` of a select box.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: impl ToString, label: impl Into<String>, selected: bool) -> Self {
        Self {
            value: value.to_string(),
            label: label.into(),
            selected,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageContext {
    pub title: String,
    pub signed_in: bool,
    pub search_term: String,
    pub build_id: &'static str,
    pub base_url: String,
    /// `None` when ads are disabled.
    pub ads: Option<AdSlotView>,
}

impl PageContext {
    pub fn new(title: impl Into<String>, session: &Session, config: &AppConfig) -> Self {
        let ads = config.ads.is_enabled().then(|| {
            let slots = &config.ads.slots;
            AdSlotView {
                client_id: config.ads.client_id.clone().unwrap_or_default(),
                header: slots.header.clone(),
                sidebar_left: slots.sidebar_left.clone(),
                sidebar_right: slots.sidebar_right.clone(),
                in_content_1: slots.in_content_1.clone(),
                in_content_2: slots.in_content_2.clone(),
                in_content_3: slots.in_content_3.clone(),
                footer: slots.footer.clone(),
            }
        });

        PageContext {
            title: title.into(),
            signed_in: session.user.is_some(),
            search_term: String::new(),
            build_id: BUILD_ID,
            base_url: config.base_url(),
            ads,
        }
    }

    pub fn with_search_term(mut self, term: Option<&str>) -> Self {
        self.search_term = term.unwrap_or_default().to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::web::middleware::auth::AuthenticatedUser;

    #[test]
    fn ads_follow_the_config() {
        let mut config = test_config();
        let page = PageContext::new("Inicio", &Session::default(), &config);
        assert!(page.ads.is_none());
        assert!(!page.signed_in);

        config.ads.client_id = Some("ca-pub-123".into());
        let session = Session {
            user: Some(AuthenticatedUser { id: "u".into() }),
        };
        let page = PageContext::new("Inicio", &session, &config);
        let ads = page.ads.unwrap();
        assert_eq!(ads.client_id, "ca-pub-123");
        assert_eq!(ads.header, "1234567890");
        assert!(page.signed_in);
    }
}
