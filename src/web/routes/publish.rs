use askama::Template;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension,
};
use sqlx::SqlitePool;
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::database::categories_repo;
use crate::error::{AppError, Result, GENERIC_ERROR_MESSAGE};
use crate::models::{Category, CategoryKind, Listing, CATEGORIES};
use crate::services::listing_form_service::{
    self, FieldErrors, ImageUpload, ListingFormValues, CONTRACT_TYPES, MAX_IMAGES, PRODUCT_STATES,
};
use crate::services::{listing_publish_service, listings_service, location_service};
use crate::web::layout::{PageContext, SelectOption};
use crate::web::middleware::auth::{AuthenticatedUser, Session};
use crate::web::state::AppState;

pub struct PublishLink {
    pub name: &'static str,
    pub href: String,
}

#[derive(Template)]
#[template(path = "publish.html")]
pub struct PublishIndexTemplate {
    pub page: PageContext,
    pub links: Vec<PublishLink>,
}

pub async fn publish_index_handler(
    Extension(session): Extension<Session>,
    State(state): State<AppState>,
) -> Result<Html<String>> {
    let links = CATEGORIES
        .iter()
        .map(|c| PublishLink {
            name: c.name,
            href: format!("/publicar/{}", c.tag),
        })
        .collect();
    let template = PublishIndexTemplate {
        page: PageContext::new("Publicar anuncio", &session, &state.config),
        links,
    };
    Ok(Html(template.render()?))
}

pub struct ImageChoice {
    pub id: i64,
    pub url: String,
    pub kept: bool,
}

#[derive(Template)]
#[template(path = "listing_form.html")]
pub struct ListingFormTemplate {
    pub page: PageContext,
    pub heading: String,
    pub action: String,
    pub kind: &'static str,
    pub values: ListingFormValues,
    pub errors: FieldErrors,
    pub notice: Option<String>,
    pub sub_category_options: Vec<SelectOption>,
    pub state_options: Vec<SelectOption>,
    pub city_options: Vec<SelectOption>,
    pub product_category_options: Vec<SelectOption>,
    pub contract_type_options: Vec<SelectOption>,
    pub product_state_options: Vec<SelectOption>,
    pub existing_images: Vec<ImageChoice>,
    pub max_images: usize,
}

enum FormMode<'a> {
    Create(&'static Category),
    Edit(&'a Listing),
}

struct FormState {
    values: ListingFormValues,
    errors: FieldErrors,
    notice: Option<String>,
}

async fn render_form(
    pool: &SqlitePool,
    config: &AppConfig,
    session: &Session,
    mode: FormMode<'_>,
    form: FormState,
) -> Result<Html<String>> {
    let (category, heading, action, existing) = match &mode {
        FormMode::Create(category) => (
            *category,
            format!("Publicar en {}", category.name),
            format!("/publicar/{}", category.tag),
            Vec::new(),
        ),
        FormMode::Edit(listing) => (
            Category::by_id(listing.category.id).ok_or(AppError::NotFound)?,
            "Editar anuncio".to_string(),
            format!("/a/{}/editar", listing.id),
            listing.images.clone(),
        ),
    };
    let values = form.values;
    let selected = |name: &str, value: &str| values.get(name) == value;

    let sub_category_options = match category.kind() {
        CategoryKind::Property | CategoryKind::Vehicle => {
            categories_repo::list_sub_categories(pool, category.id)
                .await?
                .into_iter()
                .map(|s| {
                    let value = s.id.to_string();
                    let is_selected = selected("sub_category_id", &value);
                    SelectOption::new(value, s.name.unwrap_or_default(), is_selected)
                })
                .collect()
        }
        _ => Vec::new(),
    };

    let state_options = location_service::list_states(pool)
        .await?
        .into_iter()
        .map(|s| {
            let value = s.id.to_string();
            let is_selected = selected("state_id", &value);
            SelectOption::new(value, s.name, is_selected)
        })
        .collect();

    let city_options = match values.get("state_id").parse::<i64>() {
        Ok(state_id) => location_service::list_cities(pool, state_id)
            .await?
            .into_iter()
            .map(|c| {
                let value = c.id.to_string();
                let is_selected = selected("city_id", &value);
                SelectOption::new(value, c.name, is_selected)
            })
            .collect(),
        Err(_) => Vec::new(),
    };

    let current_category = match values.get("category_id") {
        "" => category.id.to_string(),
        other => other.to_string(),
    };
    let product_category_options = Category::products()
        .map(|c| SelectOption::new(c.id, c.name, c.id.to_string() == current_category))
        .collect();

    let contract_type_options = CONTRACT_TYPES
        .iter()
        .map(|(v, label)| {
            SelectOption::new(
                v,
                *label,
                values.get("property_contract_type").eq_ignore_ascii_case(v),
            )
        })
        .collect();
    let product_state_options = PRODUCT_STATES
        .iter()
        .map(|(v, label)| SelectOption::new(v, *label, selected("product_state", *v)))
        .collect();

    let existing_images = existing
        .into_iter()
        .map(|img| ImageChoice {
            kept: values.kept_image_ids.contains(&img.id),
            id: img.id,
            url: img.image_url,
        })
        .collect();

    let template = ListingFormTemplate {
        page: PageContext::new(heading.clone(), session, config),
        heading,
        action,
        kind: category.kind().as_str(),
        values: values.clone(),
        errors: form.errors,
        notice: form.notice,
        sub_category_options,
        state_options,
        city_options,
        product_category_options,
        contract_type_options,
        product_state_options,
        existing_images,
        max_images: MAX_IMAGES,
    };
    Ok(Html(template.render()?))
}

/// Splits a multipart submission into text fields and image files. Empty
/// file inputs are skipped.
pub async fn read_listing_form(
    mut multipart: Multipart,
) -> Result<(ListingFormValues, Vec<ImageUpload>)> {
    let mut values = ListingFormValues::default();
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Formulario inválido: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "images" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Imagen inválida: {}", e)))?;
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            uploads.push(ImageUpload::new(file_name, content_type, bytes.to_vec()));
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Campo inválido: {}", e)))?;
            values.set(&name, text);
        }
    }

    Ok((values, uploads))
}

pub async fn new_listing_page(
    Extension(session): Extension<Session>,
    Path(category_tag): Path<String>,
    State(state): State<AppState>,
) -> Result<Html<String>> {
    let category = Category::by_tag(&category_tag).ok_or(AppError::NotFound)?;
    let values = ListingFormValues {
        category_id: Some(category.id.to_string()),
        ..Default::default()
    };
    render_form(
        &state.pool,
        &state.config,
        &session,
        FormMode::Create(category),
        FormState {
            values,
            errors: FieldErrors::new(),
            notice: None,
        },
    )
    .await
}

pub async fn create_listing_handler(
    Extension(session): Extension<Session>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(category_tag): Path<String>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response> {
    let category = Category::by_tag(&category_tag).ok_or(AppError::NotFound)?;
    let (values, uploads) = read_listing_form(multipart).await?;

    let mut errors = FieldErrors::new();
    let draft = listing_form_service::validate_listing_form(category, &values)
        .map_err(|e| errors.merge(e))
        .ok();
    if let Err(e) = listing_form_service::validate_images(0, &uploads) {
        errors.merge(e);
    }

    let outcome = match draft {
        Some(draft) if errors.is_empty() => {
            listing_publish_service::create_listing(
                &state.pool,
                state.storage.as_ref(),
                &auth_user.id,
                &draft,
                &uploads,
            )
            .await
        }
        _ => Err(AppError::Validation(errors)),
    };

    match outcome {
        Ok(listing_id) => Ok(Redirect::to(&format!("/a/{}", listing_id)).into_response()),
        Err(e) => {
            let form = failed_form(values, e)?;
            let page = render_form(
                &state.pool,
                &state.config,
                &session,
                FormMode::Create(category),
                form,
            )
            .await?;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

pub async fn edit_listing_page(
    Extension(session): Extension<Session>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(listing_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Html<String>> {
    let listing = listings_service::load_owned_listing(&state.pool, listing_id, &auth_user.id).await?;
    let values = ListingFormValues::from_listing(&listing);
    render_form(
        &state.pool,
        &state.config,
        &session,
        FormMode::Edit(&listing),
        FormState {
            values,
            errors: FieldErrors::new(),
            notice: None,
        },
    )
    .await
}

pub async fn update_listing_handler(
    Extension(session): Extension<Session>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(listing_id): Path<i64>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response> {
    let listing = listings_service::load_owned_listing(&state.pool, listing_id, &auth_user.id).await?;
    let category = Category::by_id(listing.category.id).ok_or(AppError::NotFound)?;
    let (mut values, uploads) = read_listing_form(multipart).await?;

    values
        .kept_image_ids
        .retain(|id| listing.images.iter().any(|img| img.id == *id));

    let mut errors = FieldErrors::new();
    let draft = listing_form_service::validate_listing_form(category, &values)
        .map_err(|e| errors.merge(e))
        .ok();
    if let Err(e) = listing_form_service::validate_images(values.kept_image_ids.len(), &uploads) {
        errors.merge(e);
    }

    let outcome = match draft {
        Some(draft) if errors.is_empty() => {
            listing_publish_service::update_listing(
                &state.pool,
                state.storage.as_ref(),
                &auth_user.id,
                listing_id,
                &draft,
                &values.kept_image_ids,
                &uploads,
            )
            .await
        }
        _ => Err(AppError::Validation(errors)),
    };

    match outcome {
        Ok(()) => Ok(Redirect::to(&format!("/a/{}", listing_id)).into_response()),
        Err(e) => {
            let form = failed_form(values, e)?;
            let page = render_form(
                &state.pool,
                &state.config,
                &session,
                FormMode::Edit(&listing),
                form,
            )
            .await?;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

/// Field errors go back inline; backend failures are logged and shown as
/// the generic notice. Ownership and lookup failures are not form problems.
fn failed_form(values: ListingFormValues, error: AppError) -> Result<FormState> {
    match error {
        AppError::Validation(errors) => Ok(FormState {
            values,
            errors,
            notice: None,
        }),
        AppError::Forbidden | AppError::NotFound | AppError::Unauthenticated => Err(error),
        other => {
            error!("❌ Saving listing failed: {}", other);
            Ok(FormState {
                values,
                errors: FieldErrors::new(),
                notice: Some(GENERIC_ERROR_MESSAGE.to_string()),
            })
        }
    }
}

pub async fn delete_listing_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(listing_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Redirect> {
    if let Err(e) = listing_publish_service::delete_listing(
        &state.pool,
        state.storage.as_ref(),
        &auth_user.id,
        listing_id,
    )
    .await
    {
        warn!("🗑️ Delete of listing {} failed: {}", listing_id, e);
        return Err(e);
    }
    Ok(Redirect::to("/perfil"))
}
