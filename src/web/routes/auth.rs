use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use cookie::Cookie;
use serde::Deserialize;
use tracing::error;

use crate::error::{AppError, Result, GENERIC_ERROR_MESSAGE};
use crate::services::auth_service;
use crate::web::layout::PageContext;
use crate::web::middleware::auth::{
    append_session_cookies, sanitize_return_to, session_cookie, Session, ACCESS_TOKEN_COOKIE,
    REFRESH_TOKEN_COOKIE,
};
use crate::web::state::AppState;

#[derive(Template)]
#[template(path = "sign_in.html")]
pub struct SignInTemplate {
    pub page: PageContext,
    pub email: String,
    pub return_to: String,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SignInQuery {
    pub return_to: Option<String>,
}

#[derive(Deserialize)]
pub struct SignInForm {
    email: String,
    password: String,
    return_to: Option<String>,
}

fn return_target(raw: Option<&str>) -> String {
    raw.and_then(sanitize_return_to)
        .unwrap_or("/")
        .to_string()
}

pub async fn sign_in_page(
    Extension(session): Extension<Session>,
    Query(query): Query<SignInQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    let return_to = return_target(query.return_to.as_deref());
    if session.user.is_some() {
        return Ok(Redirect::to(&return_to).into_response());
    }
    let template = SignInTemplate {
        page: PageContext::new("Ingresar", &session, &state.config),
        email: String::new(),
        return_to,
        error: None,
    };
    Ok(Html(template.render()?).into_response())
}

pub async fn sign_in_handler(
    Extension(session): Extension<Session>,
    State(state): State<AppState>,
    Form(form): Form<SignInForm>,
) -> Result<Response> {
    let return_to = return_target(form.return_to.as_deref());

    let message = match auth_service::sign_in(
        &state.pool,
        state.auth.as_ref(),
        &form.email,
        &form.password,
    )
    .await
    {
        Ok(auth) => {
            let mut response = Redirect::to(&return_to).into_response();
            append_session_cookies(response.headers_mut(), &auth, &state.config);
            return Ok(response);
        }
        Err(AppError::Validation(errors)) => errors
            .get("form")
            .unwrap_or(auth_service::INVALID_CREDENTIALS)
            .to_string(),
        Err(e) => {
            error!("🔐 Sign-in failed for {}: {}", form.email, e);
            GENERIC_ERROR_MESSAGE.to_string()
        }
    };

    let template = SignInTemplate {
        page: PageContext::new("Ingresar", &session, &state.config),
        email: form.email,
        return_to,
        error: Some(message),
    };
    Ok((StatusCode::UNAUTHORIZED, Html(template.render()?)).into_response())
}

pub async fn sign_out_handler(State(state): State<AppState>) -> Result<Response> {
    let mut response = Redirect::to("/").into_response();
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        let mut cookie = session_cookie(name, String::new(), &state.config);
        cookie.make_removal();
        response
            .headers_mut()
            .append(header::SET_COOKIE, header_value(&cookie)?);
    }
    Ok(response)
}

fn header_value(cookie: &Cookie<'_>) -> Result<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| AppError::BadRequest(format!("invalid cookie: {}", e)))
}
