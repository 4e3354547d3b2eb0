//! Продукты: загрузка медиа (premium) и CRUD с лимитом один на профиль.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config;
use crate::storage::db::{self, Product, ProductInput};
use crate::telegram::webapp::{authenticate, require_json, resolve_profile, ApiError, WebAppState};

#[derive(Debug, Serialize)]
pub struct UploadMediaResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageProductRequest {
    pub init_data: String,
    pub action: String,
    pub product_id: Option<i64>,
    pub product: Option<ProductFields>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFields {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub currency: Option<String>,
    pub media_url: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ManageProductResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

/// POST /api/products/media (multipart/form-data)
///
/// Принимает поля `initData` и `file`. Файл уходит в blob-хранилище под
/// ключом `<profile_id>/<timestamp>.<ext>`, клиенту возвращается
/// публичный URL. Только для тарифа premium.
pub async fn upload_product_media(
    State(state): State<Arc<WebAppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadMediaResponse>, ApiError> {
    let mut init_data: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("initData") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Malformed initData field: {}", e)))?;
                init_data = Some(text);
            }
            Some("file") => {
                file_name = field.file_name().map(String::from);
                content_type = field.content_type().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Malformed file field: {}", e)))?;
                file_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let init_data =
        init_data.ok_or_else(|| ApiError::BadRequest("initData field is required".to_string()))?;
    let file_bytes =
        file_bytes.ok_or_else(|| ApiError::BadRequest("file field is required".to_string()))?;

    let user = authenticate(&init_data, &state.bot_token, "upload_product_media")?;

    let conn = db::get_connection(&state.db_pool)?;
    let profile = resolve_profile(&conn, user.id)?;

    if profile.subscription_tier != "premium" {
        return Err(ApiError::Forbidden(
            "Загрузка медиа доступна только на тарифе Premium".to_string(),
        ));
    }

    // essence_str отбрасывает параметры вроде "; charset=binary"
    let parsed: Option<mime::Mime> = content_type.as_deref().and_then(|ct| ct.parse().ok());
    let essence = parsed.as_ref().map(|m| m.essence_str()).unwrap_or("");
    if !config::upload::is_allowed_mime(essence) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported file type: {}. Allowed: jpeg, png, gif, webp",
            content_type.as_deref().unwrap_or("unknown")
        )));
    }

    if file_bytes.len() > config::upload::MAX_FILE_SIZE_BYTES {
        return Err(ApiError::BadRequest(
            "Файл слишком большой. Максимум 5 МБ".to_string(),
        ));
    }

    let original_name = file_name.as_deref().unwrap_or("");
    let url = state.media.store(profile.id, original_name, &file_bytes)?;

    log::info!(
        "📦 Product media stored for profile {}: {} bytes -> {}",
        profile.id,
        file_bytes.len(),
        url
    );

    Ok(Json(UploadMediaResponse { url }))
}

/// POST /api/products
///
/// Единый шлюз create/update/delete. Лимит — один продукт на профиль,
/// проверяется только на create.
pub async fn manage_product(
    State(state): State<Arc<WebAppState>>,
    payload: Result<Json<ManageProductRequest>, JsonRejection>,
) -> Result<Json<ManageProductResponse>, ApiError> {
    let req = require_json(payload)?;
    let user = authenticate(&req.init_data, &state.bot_token, "manage_product")?;

    let conn = db::get_connection(&state.db_pool)?;
    let profile = resolve_profile(&conn, user.id)?;

    match req.action.as_str() {
        "create" => {
            let fields = required_fields(req.product.as_ref())?;

            if db::count_products(&conn, profile.id)? >= config::products::MAX_PER_PROFILE {
                return Err(ApiError::BadRequest(
                    "Можно добавить только один продукт".to_string(),
                ));
            }

            let product = db::insert_product(&conn, profile.id, &to_input(fields))?;
            log::info!("🛍 Product #{} created by profile {}", product.id, profile.id);

            Ok(Json(ManageProductResponse {
                success: true,
                product: Some(product),
            }))
        }
        "update" => {
            let product_id = required_product_id(req.product_id)?;
            let fields = required_fields(req.product.as_ref())?;

            if !db::update_product(&conn, profile.id, product_id, &to_input(fields))? {
                return Err(ApiError::NotFound("Product not found".to_string()));
            }

            let product = db::get_product_by_id(&conn, profile.id, product_id)?;
            Ok(Json(ManageProductResponse {
                success: true,
                product,
            }))
        }
        "delete" => {
            let product_id = required_product_id(req.product_id)?;

            if !db::delete_product(&conn, profile.id, product_id)? {
                return Err(ApiError::NotFound("Product not found".to_string()));
            }

            log::info!("🗑 Product #{} deleted by profile {}", product_id, profile.id);
            Ok(Json(ManageProductResponse {
                success: true,
                product: None,
            }))
        }
        other => Err(ApiError::BadRequest(format!("Unknown action: {}", other))),
    }
}

fn required_product_id(product_id: Option<i64>) -> Result<i64, ApiError> {
    product_id.ok_or_else(|| ApiError::BadRequest("productId is required".to_string()))
}

fn required_fields(product: Option<&ProductFields>) -> Result<&ProductFields, ApiError> {
    let fields =
        product.ok_or_else(|| ApiError::BadRequest("product is required".to_string()))?;

    if fields.title.trim().is_empty() || fields.description.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Title and description are required".to_string(),
        ));
    }
    if !fields.price.is_finite() || fields.price < 0.0 {
        return Err(ApiError::BadRequest("Price must be non-negative".to_string()));
    }

    Ok(fields)
}

fn to_input(fields: &ProductFields) -> ProductInput<'_> {
    ProductInput {
        title: fields.title.trim(),
        description: fields.description.trim(),
        price: fields.price,
        currency: fields.currency.as_deref().unwrap_or("RUB"),
        media_url: fields.media_url.as_deref(),
        link: fields.link.as_deref(),
    }
}
