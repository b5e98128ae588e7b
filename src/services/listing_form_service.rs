//! Server-side validation of the create/edit listing forms.
//!
//! Each category family has its own `validator`-derived form. Raw multipart
//! text fields land in [`ListingFormValues`]; validation turns them into a
//! [`ListingDraft`] or a set of per-field messages shown inline.

use std::collections::BTreeMap;

use validator::{Validate, ValidationErrors};

use crate::models::{Category, CategoryKind, Listing};

pub const MAX_IMAGES: usize = 3;
pub const MAX_IMAGE_BYTES: usize = 3 * 1024 * 1024;
pub const ACCEPTED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];
pub const DEFAULT_CURRENCY: &str = "USD";

pub const REMOTE: &str = "Remoto";
pub const ON_SITE: &str = "Presencial";

/// (value, label)
pub const CONTRACT_TYPES: [(&str, &str); 2] = [("VENTA", "Venta"), ("ALQUILER", "Alquiler")];
pub const PRODUCT_STATES: [(&str, &str); 3] = [
    ("new", "Nuevo"),
    ("used", "Usado"),
    ("refurbished", "Reacondicionado"),
];

pub fn contract_type_label(value: &str) -> Option<&'static str> {
    CONTRACT_TYPES
        .iter()
        .find(|(v, _)| v.eq_ignore_ascii_case(value))
        .map(|(_, label)| *label)
}

pub fn product_state_label(value: &str) -> Option<&'static str> {
    PRODUCT_STATES
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, label)| *label)
}

/// First message per field, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the first message recorded for a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Message for `field`, or an empty string; handy in templates.
    pub fn message(&self, field: &str) -> &str {
        self.get(field).unwrap_or("")
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.add(&field, message);
        }
    }

    fn extend_from(&mut self, errors: &ValidationErrors) {
        for (field, list) in errors.field_errors() {
            let message = list
                .iter()
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "Campo inválido".to_string());
            self.add(&field.to_string(), message);
        }
    }
}

/// Raw text fields of a listing form, as submitted. Re-rendered on error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFormValues {
    pub price: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub sub_category_id: Option<String>,
    pub state_id: Option<String>,
    pub city_id: Option<String>,
    pub property_contract_type: Option<String>,
    pub vehicle_brand: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_year: Option<String>,
    pub job_title: Option<String>,
    pub remote: bool,
    pub product_title: Option<String>,
    pub product_state: Option<String>,
    /// Ids of existing images the owner keeps when editing.
    pub kept_image_ids: Vec<i64>,
}

impl ListingFormValues {
    /// Records a multipart text field; unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "price" => &mut self.price,
            "description" => &mut self.description,
            "category_id" => &mut self.category_id,
            "sub_category_id" => &mut self.sub_category_id,
            "state_id" => &mut self.state_id,
            "city_id" => &mut self.city_id,
            "property_contract_type" => &mut self.property_contract_type,
            "vehicle_brand" => &mut self.vehicle_brand,
            "vehicle_model" => &mut self.vehicle_model,
            "vehicle_year" => &mut self.vehicle_year,
            "job_title" => &mut self.job_title,
            "product_title" => &mut self.product_title,
            "product_state" => &mut self.product_state,
            "remote" => {
                self.remote = matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "on" | "true" | "1" | "remoto"
                );
                return;
            }
            "keep_image" => {
                if let Ok(id) = value.trim().parse() {
                    self.kept_image_ids.push(id);
                }
                return;
            }
            _ => return,
        };
        *slot = Some(value);
    }

    /// Current value of a field for the template, empty when unset.
    pub fn get(&self, name: &str) -> &str {
        let value = match name {
            "price" => &self.price,
            "description" => &self.description,
            "category_id" => &self.category_id,
            "sub_category_id" => &self.sub_category_id,
            "state_id" => &self.state_id,
            "city_id" => &self.city_id,
            "property_contract_type" => &self.property_contract_type,
            "vehicle_brand" => &self.vehicle_brand,
            "vehicle_model" => &self.vehicle_model,
            "vehicle_year" => &self.vehicle_year,
            "job_title" => &self.job_title,
            "product_title" => &self.product_title,
            "product_state" => &self.product_state,
            _ => return "",
        };
        value.as_deref().unwrap_or("")
    }

    pub fn is_selected(&self, name: &str, option: &str) -> bool {
        self.get(name) == option
    }

    /// Prefills the edit form from a stored listing.
    pub fn from_listing(listing: &Listing) -> Self {
        let attr = |name: &str| listing.attribute(name).map(str::to_string);
        ListingFormValues {
            price: listing.price.map(format_plain_number),
            description: listing.description.clone(),
            category_id: Some(listing.category.id.to_string()),
            sub_category_id: listing.sub_category.as_ref().map(|s| s.id.to_string()),
            state_id: listing.state.as_ref().map(|s| s.id.to_string()),
            city_id: listing.city.as_ref().map(|c| c.id.to_string()),
            property_contract_type: attr("property_contract_type"),
            vehicle_brand: attr("vehicle_brand"),
            vehicle_model: attr("vehicle_model"),
            vehicle_year: attr("vehicle_year"),
            job_title: attr("job_title"),
            remote: listing.attribute("remote") == Some(REMOTE),
            product_title: attr("product_title"),
            product_state: attr("product_state"),
            kept_image_ids: listing.images.iter().map(|i| i.id).collect(),
        }
    }
}

fn format_plain_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Validate)]
struct CommonForm {
    #[validate(
        required(message = "El precio es obligatorio."),
        range(exclusive_min = 0.0, message = "El precio debe ser un número positivo.")
    )]
    price: Option<f64>,
    #[validate(length(max = 5000, message = "La descripción es demasiado larga."))]
    description: Option<String>,
}

#[derive(Debug, Validate)]
struct PropertyForm {
    #[validate(required(message = "Selecciona el tipo de inmueble."))]
    sub_category_id: Option<i64>,
    #[validate(required(message = "Campo requerido"))]
    state_id: Option<i64>,
    #[validate(required(message = "Por favor selecciona el tipo de contrato."))]
    property_contract_type: Option<String>,
}

#[derive(Debug, Validate)]
struct VehicleForm {
    #[validate(required(message = "Selecciona el tipo de vehículo."))]
    sub_category_id: Option<i64>,
    #[validate(
        required(message = "La marca es obligatoria."),
        length(max = 80, message = "La marca es demasiado larga.")
    )]
    vehicle_brand: Option<String>,
    #[validate(
        required(message = "El modelo es obligatorio."),
        length(max = 80, message = "El modelo es demasiado largo.")
    )]
    vehicle_model: Option<String>,
    #[validate(
        required(message = "El año es obligatorio."),
        length(equal = 4, message = "El año debe tener 4 dígitos.")
    )]
    vehicle_year: Option<String>,
}

#[derive(Debug, Validate)]
struct JobForm {
    #[validate(
        required(message = "El título del empleo es obligatorio."),
        length(max = 120, message = "El título es demasiado largo.")
    )]
    job_title: Option<String>,
}

#[derive(Debug, Validate)]
struct ProductForm {
    #[validate(required(message = "Selecciona una categoría."))]
    category_id: Option<i64>,
    #[validate(
        required(message = "El título es obligatorio."),
        length(max = 120, message = "El título es demasiado largo.")
    )]
    product_title: Option<String>,
    #[validate(required(message = "Selecciona el estado del producto."))]
    product_state: Option<String>,
}

/// A validated listing, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDraft {
    pub category_id: i64,
    pub sub_category_id: Option<i64>,
    pub price: f64,
    pub currency: String,
    pub description: Option<String>,
    pub state_id: Option<i64>,
    pub city_id: Option<i64>,
    /// (name, value) pairs upserted after the listing row.
    pub attributes: Vec<(&'static str, String)>,
    pub text_search: String,
}

/// Validates the form of the family `category` belongs to. For products the
/// submitted `category_id` wins over `category`, and must be a product
/// category.
pub fn validate_listing_form(
    category: &Category,
    values: &ListingFormValues,
) -> Result<ListingDraft, FieldErrors> {
    let mut errors = FieldErrors::new();

    let common = CommonForm {
        price: parse_price(values.price.as_deref(), &mut errors),
        description: text(values.description.as_deref()),
    };
    if let Err(e) = common.validate() {
        errors.extend_from(&e);
    }

    let mut state_id = parse_id("state_id", values.state_id.as_deref(), &mut errors);
    let mut city_id = parse_id("city_id", values.city_id.as_deref(), &mut errors);
    let mut category_id = category.id;
    let mut sub_category_id = None;
    let mut attributes: Vec<(&'static str, String)> = Vec::new();
    let mut title_parts: Vec<String> = Vec::new();

    match category.kind() {
        CategoryKind::Property => {
            let form = PropertyForm {
                sub_category_id: parse_id(
                    "sub_category_id",
                    values.sub_category_id.as_deref(),
                    &mut errors,
                ),
                state_id,
                property_contract_type: text(values.property_contract_type.as_deref()),
            };
            if let Err(e) = form.validate() {
                errors.extend_from(&e);
            }
            if let Some(contract) = form.property_contract_type {
                match contract_type_label(&contract) {
                    Some(_) => {
                        title_parts.push(contract.to_ascii_uppercase());
                        attributes.push(("property_contract_type", contract.to_ascii_uppercase()));
                    }
                    None => errors.add(
                        "property_contract_type",
                        "Por favor selecciona el tipo de contrato.",
                    ),
                }
            }
            sub_category_id = form.sub_category_id;
        }
        CategoryKind::Vehicle => {
            let form = VehicleForm {
                sub_category_id: parse_id(
                    "sub_category_id",
                    values.sub_category_id.as_deref(),
                    &mut errors,
                ),
                vehicle_brand: text(values.vehicle_brand.as_deref()),
                vehicle_model: text(values.vehicle_model.as_deref()),
                vehicle_year: text(values.vehicle_year.as_deref()),
            };
            if let Err(e) = form.validate() {
                errors.extend_from(&e);
            }
            if let Some(year) = &form.vehicle_year {
                if !year.chars().all(|c| c.is_ascii_digit()) {
                    errors.add("vehicle_year", "El año debe tener 4 dígitos.");
                }
            }
            for (name, value) in [
                ("vehicle_brand", form.vehicle_brand),
                ("vehicle_model", form.vehicle_model),
                ("vehicle_year", form.vehicle_year),
            ] {
                if let Some(value) = value {
                    title_parts.push(value.clone());
                    attributes.push((name, value));
                }
            }
            sub_category_id = form.sub_category_id;
        }
        CategoryKind::Job => {
            let form = JobForm {
                job_title: text(values.job_title.as_deref()),
            };
            if let Err(e) = form.validate() {
                errors.extend_from(&e);
            }
            if let Some(title) = form.job_title {
                title_parts.push(title.clone());
                attributes.push(("job_title", title));
            }
            let remote = if values.remote { REMOTE } else { ON_SITE };
            attributes.push(("remote", remote.to_string()));
            if values.remote {
                state_id = None;
                city_id = None;
            }
        }
        CategoryKind::Product => {
            let submitted = match text(values.category_id.as_deref()) {
                Some(_) => parse_id("category_id", values.category_id.as_deref(), &mut errors),
                None => Some(category.id),
            };
            let form = ProductForm {
                category_id: submitted,
                product_title: text(values.product_title.as_deref()),
                product_state: text(values.product_state.as_deref()),
            };
            if let Err(e) = form.validate() {
                errors.extend_from(&e);
            }
            if let Some(id) = form.category_id {
                match Category::by_id(id) {
                    Some(c) if c.kind() == CategoryKind::Product => category_id = c.id,
                    _ => errors.add("category_id", "Selecciona una categoría de producto."),
                }
            }
            if let Some(title) = form.product_title {
                title_parts.push(title.clone());
                attributes.push(("product_title", title));
            }
            if let Some(state) = form.product_state {
                match product_state_label(&state) {
                    Some(label) => {
                        title_parts.push(label.to_string());
                        attributes.push(("product_state", state));
                    }
                    None => errors.add("product_state", "Selecciona el estado del producto."),
                }
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let price = common.price.unwrap_or_default();
    let description = common.description;
    let text_search = build_text_search(&title_parts, description.as_deref());

    Ok(ListingDraft {
        category_id,
        sub_category_id,
        price,
        currency: DEFAULT_CURRENCY.to_string(),
        description,
        state_id,
        city_id,
        attributes,
        text_search,
    })
}

/// `"{title attributes} {description}"`, whitespace-collapsed.
pub fn build_text_search(title_parts: &[String], description: Option<&str>) -> String {
    title_parts
        .iter()
        .map(String::as_str)
        .chain(description)
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// An uploaded image file, buffered from the multipart body.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Takes the declared content type, falling back to a guess from the file
    /// name when the browser sent none.
    pub fn new(file_name: String, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        let content_type = content_type
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_raw()
                    .unwrap_or("application/octet-stream")
                    .to_string()
            });
        Self {
            file_name,
            content_type: content_type.to_ascii_lowercase(),
            bytes,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

/// Image rules: at least one image kept or added, at most [`MAX_IMAGES`] in
/// total, each within size and type limits.
pub fn validate_images(kept: usize, uploads: &[ImageUpload]) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if kept + uploads.len() == 0 {
        errors.add("images", "Debes subir al menos una imagen para tu anuncio.");
    }
    if kept + uploads.len() > MAX_IMAGES {
        errors.add(
            "images",
            format!("Puedes subir hasta {} imágenes.", MAX_IMAGES),
        );
    }
    for upload in uploads {
        if !ACCEPTED_IMAGE_TYPES.contains(&upload.content_type.as_str()) {
            errors.add(
                "images",
                format!(
                    "{}: solo se aceptan imágenes .jpg, .jpeg, .png y .webp.",
                    upload.file_name
                ),
            );
        } else if upload.bytes.len() > MAX_IMAGE_BYTES {
            errors.add(
                "images",
                format!("{}: la imagen no puede superar 3MB.", upload.file_name),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_id(field: &str, value: Option<&str>, errors: &mut FieldErrors) -> Option<i64> {
    let raw = text(value)?;
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Some(id),
        _ => {
            errors.add(field, "Selección inválida.");
            None
        }
    }
}

/// Accepts `1500`, `1500.50` and `1.500,50`.
fn parse_price(value: Option<&str>, errors: &mut FieldErrors) -> Option<f64> {
    let raw = text(value)?;
    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else {
        raw
    };
    match normalized.parse::<f64>() {
        Ok(price) if price.is_finite() => Some(price),
        _ => {
            errors.add("price", "El precio debe ser un número positivo.");
            None
        }
    }
}
