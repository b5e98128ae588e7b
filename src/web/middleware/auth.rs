use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use cookie::{Cookie, SameSite};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::database::user_repo;
use crate::services::auth_service::{self, AuthProvider, AuthSession};
use crate::web::state::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub id: String,
}

/// Who is asking, if anyone. Present on every request.
#[derive(Clone, Debug, Default)]
pub struct Session {
    pub user: Option<AuthenticatedUser>,
}

impl Session {
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|hv| hv.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .map(str::trim)
        .find_map(|c| {
            c.strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|v| !v.is_empty())
}

/// The session of one request, plus the renewed tokens when the refresh
/// cookie had to be used.
#[derive(Debug, Default)]
pub struct ResolvedSession {
    pub session: Session,
    pub refreshed: Option<AuthSession>,
}

/// Asks the auth service who the access token belongs to. An expired or
/// rejected access token falls back to the refresh token; a renewed user is
/// mirrored into `users`. Service failures count as signed out.
pub async fn resolve_session(
    pool: &SqlitePool,
    auth: &dyn AuthProvider,
    headers: &HeaderMap,
) -> ResolvedSession {
    let now = Utc::now().timestamp();

    if let Some(token) = cookie_value(headers, ACCESS_TOKEN_COOKIE) {
        if !auth_service::token_expired(token, now) {
            match auth.get_user(token).await {
                Ok(Some(user)) => {
                    return ResolvedSession {
                        session: signed_in(user.id),
                        refreshed: None,
                    }
                }
                Ok(None) => warn!("🔐 Access token rejected by the auth service"),
                Err(e) => {
                    warn!("🔐 Token check failed: {}", e);
                    return ResolvedSession::default();
                }
            }
        }
    }

    let Some(refresh_token) = cookie_value(headers, REFRESH_TOKEN_COOKIE) else {
        return ResolvedSession::default();
    };
    match auth.refresh_session(refresh_token).await {
        Ok(Some(renewed)) => {
            match renewed.to_user_row() {
                Ok(row) => {
                    if let Err(e) = user_repo::upsert_user(pool, &row).await {
                        warn!("🔐 Could not mirror user {}: {}", row.id, e);
                    }
                }
                Err(e) => warn!("🔐 Renewed session without usable user: {}", e),
            }
            info!("🔐 Session renewed for {}", renewed.user.id);
            ResolvedSession {
                session: signed_in(renewed.user.id.clone()),
                refreshed: Some(renewed),
            }
        }
        Ok(None) => ResolvedSession::default(),
        Err(e) => {
            warn!("🔐 Session refresh failed: {}", e);
            ResolvedSession::default()
        }
    }
}

fn signed_in(id: String) -> Session {
    Session {
        user: Some(AuthenticatedUser { id }),
    }
}

/// Attaches a [`Session`] to every request. Never rejects. Renewed tokens are
/// written back unless the handler already set cookies itself.
pub async fn load_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = resolve_session(&state.pool, state.auth.as_ref(), request.headers()).await;
    request.extensions_mut().insert(resolved.session);

    let mut response = next.run(request).await;
    if let Some(renewed) = resolved.refreshed {
        if !response.headers().contains_key(header::SET_COOKIE) {
            append_session_cookies(response.headers_mut(), &renewed, &state.config);
        }
    }
    response
}

pub fn session_cookie(name: &'static str, value: String, config: &AppConfig) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(config.is_production());
    cookie
}

/// Sets both token cookies for `auth`.
pub fn append_session_cookies(headers: &mut HeaderMap, auth: &AuthSession, config: &AppConfig) {
    for cookie in [
        session_cookie(ACCESS_TOKEN_COOKIE, auth.access_token.clone(), config),
        session_cookie(REFRESH_TOKEN_COOKIE, auth.refresh_token.clone(), config),
    ] {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("🔐 Cannot encode {} cookie: {}", cookie.name(), e),
        }
    }
}

/// Lets the request through only with a valid token for a user we know;
/// everyone else is sent to the sign-in page.
pub async fn require_auth(
    State(pool): State<SqlitePool>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = request
        .extensions()
        .get::<Session>()
        .cloned()
        .unwrap_or_default();

    if let Some(user) = session.user {
        match user_repo::load_user(&pool, &user.id).await {
            Ok(Some(_)) => {
                request.extensions_mut().insert(user);
                return next.run(request).await;
            }
            Ok(None) => warn!("🔐 Token for unknown user {}", user.id),
            Err(e) => warn!("🔐 User lookup failed for {}: {}", user.id, e),
        }
    }

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Redirect::to(&sign_in_url(target)).into_response()
}

fn sign_in_url(return_to: &str) -> String {
    if return_to == "/" || sanitize_return_to(return_to).is_none() {
        return "/sign-in".to_string();
    }
    let encoded: String = return_to
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect();
    format!("/sign-in?return_to={}", encoded)
}

/// Only same-site absolute paths are allowed as redirect targets.
pub fn sanitize_return_to(target: &str) -> Option<&str> {
    let target = target.trim();
    if target.starts_with('/') && !target.starts_with("//") && !target.contains('\\') {
        Some(target)
    } else {
        None
    }
}
