//! Password sign-in against the external auth service.
//!
//! The service issues a JWT access token plus a refresh token; both travel
//! back to the browser as cookies. Access tokens are checked with the service
//! on every request and renewed with the refresh token once they expire. The
//! signed-in user is mirrored into the local `users` table so listings can
//! join on it.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::database::user_repo;
use crate::error::{AppError, Result};
use crate::models::UserRow;
use crate::services::listing_form_service::FieldErrors;

pub const INVALID_CREDENTIALS: &str = "Correo o contraseña incorrectos.";

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub phone_confirmed_at: Option<String>,
    #[serde(default)]
    pub user_metadata: AuthUserMetadata,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthUserMetadata {
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
}

/// The only claim read locally. Identity always comes from the auth service.
#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

impl AuthSession {
    pub fn to_user_row(&self) -> Result<UserRow> {
        self.user.to_user_row()
    }
}

impl AuthUser {
    pub fn to_user_row(&self) -> Result<UserRow> {
        let email = self
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::upstream("auth user has no email"))?;
        let meta = &self.user_metadata;
        Ok(UserRow {
            id: self.id.clone(),
            email,
            full_name: meta.full_name.clone().or_else(|| meta.name.clone()),
            avatar_url: meta.avatar_url.clone(),
            phone: self.phone.clone().filter(|p| !p.is_empty()),
            phone_verified: self.phone_confirmed_at.as_ref().map(|_| true),
        })
    }
}

/// The hosted auth service as the web layer sees it.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// The user a token belongs to, or `None` when the service rejects it.
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>>;

    /// A fresh session for a refresh token, or `None` when it is no longer
    /// accepted.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<AuthSession>>;
}

/// Talks to `{AUTH_SERVICE_URL}/auth/v1`.
pub struct HostedAuth {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HostedAuth {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.auth_service_url.clone(),
            api_key: config.auth_service_public_key.clone(),
        }
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<std::result::Result<AuthSession, String>> {
        let url = format!("{}/auth/v1/token?grant_type={}", self.base_url, grant_type);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(Ok(resp.json().await?));
        }

        let body = resp.text().await.unwrap_or_default();
        if status.is_client_error() {
            let detail = serde_json::from_str::<AuthErrorBody>(&body)
                .ok()
                .and_then(|b| b.error_description.or(b.msg))
                .unwrap_or_else(|| status.to_string());
            return Ok(Err(detail));
        }

        Err(AppError::upstream(format!(
            "auth service answered {}: {}",
            status, body
        )))
    }
}

#[async_trait]
impl AuthProvider for HostedAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        match self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?
        {
            Ok(session) => Ok(session),
            Err(detail) => {
                warn!("🔐 Sign-in rejected for {}: {}", email, detail);
                let mut errors = FieldErrors::new();
                errors.add("form", INVALID_CREDENTIALS);
                Err(AppError::Validation(errors))
            }
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>> {
        let resp = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(Some(resp.json().await?));
        }
        if status.is_client_error() {
            return Ok(None);
        }
        Err(AppError::upstream(format!(
            "auth service answered {} for user lookup",
            status
        )))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<AuthSession>> {
        match self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?
        {
            Ok(session) => Ok(Some(session)),
            Err(detail) => {
                info!("🔐 Refresh token rejected: {}", detail);
                Ok(None)
            }
        }
    }
}

/// Signs in and mirrors the user locally.
pub async fn sign_in(
    pool: &SqlitePool,
    auth: &dyn AuthProvider,
    email: &str,
    password: &str,
) -> Result<AuthSession> {
    let session = auth.sign_in_with_password(email.trim(), password).await?;
    let user = session.to_user_row()?;
    user_repo::upsert_user(pool, &user).await?;
    info!("🔐 {} signed in", user.email);
    Ok(session)
}

/// True when the token's unverified `exp` claim has passed. Tokens that
/// cannot be read are left for the auth service to judge.
pub fn token_expired(token: &str, now_epoch_secs: i64) -> bool {
    let Some(payload) = token.split('.').nth(1) else {
        return false;
    };
    general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()
        .and_then(|bytes| serde_json::from_slice::<ExpiryClaim>(&bytes).ok())
        .and_then(|claim| claim.exp)
        .is_some_and(|exp| exp <= now_epoch_secs)
}
