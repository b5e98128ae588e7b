//! Startup configuration.
//!
//! Read once from the environment (after `.env` is loaded), validated, and
//! shared as an immutable `Arc<AppConfig>`.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{AppError, Result};

const ADSENSE_PLACEHOLDER_CLIENT: &str = "ca-pub-XXXXXXXXXXXXXXXXX";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Preview,
    Production,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdSlots {
    pub header: String,
    pub sidebar_left: String,
    pub sidebar_right: String,
    pub in_content_1: String,
    pub in_content_2: String,
    pub in_content_3: String,
    pub footer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdConfig {
    pub client_id: Option<String>,
    pub slots: AdSlots,
}

impl AdConfig {
    pub fn is_enabled(&self) -> bool {
        self.client_id
            .as_deref()
            .is_some_and(|id| !id.is_empty() && id != ADSENSE_PLACEHOLDER_CLIENT)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub public_host: Option<String>,
    pub auth_service_url: String,
    pub auth_service_public_key: String,
    pub storage_dir: PathBuf,
    pub storage_public_url: String,
    pub ads: AdConfig,
    pub env: AppEnv,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| AppError::config(format!("{} is required", key)))
        };

        let database_url = require("DATABASE_URL")?;

        let auth_service_url = require("AUTH_SERVICE_URL")?;
        if !(auth_service_url.starts_with("http://") || auth_service_url.starts_with("https://"))
        {
            return Err(AppError::config(format!(
                "AUTH_SERVICE_URL must be an http(s) URL, got '{}'",
                auth_service_url
            )));
        }
        let auth_service_public_key = require("AUTH_SERVICE_PUBLIC_KEY")?;

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::config(format!("PORT must be a port number, got '{}'", raw)))?,
            None => 3000,
        };

        let env = match get("APP_ENV").as_deref() {
            None | Some("development") => AppEnv::Development,
            Some("preview") => AppEnv::Preview,
            Some("production") => AppEnv::Production,
            Some(other) => {
                return Err(AppError::config(format!(
                    "APP_ENV must be development, preview or production, got '{}'",
                    other
                )))
            }
        };

        let slot = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let ads = AdConfig {
            client_id: get("ADSENSE_CLIENT_ID"),
            slots: AdSlots {
                header: slot("ADSENSE_HEADER_SLOT", "1234567890"),
                sidebar_left: slot("ADSENSE_SIDEBAR_LEFT_SLOT", "1234567891"),
                sidebar_right: slot("ADSENSE_SIDEBAR_RIGHT_SLOT", "1234567892"),
                in_content_1: slot("ADSENSE_IN_CONTENT_1_SLOT", "1234567893"),
                in_content_2: slot("ADSENSE_IN_CONTENT_2_SLOT", "1234567894"),
                in_content_3: slot("ADSENSE_IN_CONTENT_3_SLOT", "1234567895"),
                footer: slot("ADSENSE_FOOTER_SLOT", "1234567896"),
            },
        };

        Ok(AppConfig {
            database_url,
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            public_host: get("PUBLIC_HOST"),
            auth_service_url: auth_service_url.trim_end_matches('/').to_string(),
            auth_service_public_key,
            storage_dir: PathBuf::from(get("STORAGE_DIR").unwrap_or_else(|| "storage".to_string())),
            storage_public_url: get("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|| "/storage".to_string())
                .trim_end_matches('/')
                .to_string(),
            ads,
            env,
        })
    }

    pub fn bind_addr(&self, port: u16) -> Result<SocketAddr> {
        format!("{}:{}", self.host, port)
            .parse()
            .map_err(|_| AppError::config(format!("cannot parse {}:{}", self.host, port)))
    }

    pub fn base_url(&self) -> String {
        match &self.public_host {
            Some(host) => format!("https://{}", host),
            None => format!("http://localhost:{}", self.port),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == AppEnv::Production
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    pub(crate) fn test_config() -> AppConfig {
        AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("AUTH_SERVICE_URL", "http://auth.localhost/"),
            ("AUTH_SERVICE_PUBLIC_KEY", "anon-key"),
        ]))
        .unwrap()
    }

    #[test]
    fn defaults_apply_when_optional_values_are_missing() {
        let config = test_config();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.auth_service_url, "http://auth.localhost");
        assert_eq!(config.storage_public_url, "/storage");
        assert_eq!(config.ads.slots.header, "1234567890");
        assert_eq!(config.env, AppEnv::Development);
        assert_eq!(config.base_url(), "http://localhost:3000");
    }

    #[test]
    fn missing_required_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")]))
            .unwrap_err();
        assert!(err.to_string().contains("AUTH_SERVICE_URL"));
    }

    #[test]
    fn auth_url_must_be_http() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("AUTH_SERVICE_URL", "auth.localhost"),
            ("AUTH_SERVICE_PUBLIC_KEY", "k"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn ads_need_a_real_client_id() {
        let mut config = test_config();
        assert!(!config.ads.is_enabled());
        config.ads.client_id = Some(ADSENSE_PLACEHOLDER_CLIENT.to_string());
        assert!(!config.ads.is_enabled());
        config.ads.client_id = Some("ca-pub-123".to_string());
        assert!(config.ads.is_enabled());
    }

    #[test]
    fn invalid_port_and_env_are_errors() {
        let base = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("AUTH_SERVICE_URL", "https://auth.example.com"),
            ("AUTH_SERVICE_PUBLIC_KEY", "k"),
        ];
        let mut with_port = base.to_vec();
        with_port.push(("PORT", "http"));
        assert!(AppConfig::from_lookup(lookup(&with_port)).is_err());

        let mut with_env = base.to_vec();
        with_env.push(("APP_ENV", "staging"));
        assert!(AppConfig::from_lookup(lookup(&with_env)).is_err());
    }
}
