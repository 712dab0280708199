// src/handlers.rs
use crate::{AppState, errors::ListingError, models::*};
use actix_multipart::Multipart;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, web};
use bytes::BytesMut;
use futures_util::{StreamExt, TryStreamExt};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

type HandlerResult = Result<HttpResponse, ListingError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceRequest {
    pub image_url: String,
    #[serde(flatten)]
    pub options: EnhancementOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceInfo {
    pub name: Marketplace,
    pub required_fields: &'static [&'static str],
}

/// Accepts either `{"imageUrl": ...}` or a multipart form with an `image` file.
pub async fn analyze_image(
    req: HttpRequest,
    payload: web::Payload,
    data: web::Data<AppState>,
) -> HandlerResult {
    let content_type = req.content_type().to_ascii_lowercase();

    let input = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::new(req.headers(), payload);
        read_upload(multipart, &data).await?
    } else if content_type.is_empty() || content_type == "application/json" {
        let body = read_body(payload, data.max_upload_bytes).await?;
        let request: AnalyzeRequest = serde_json::from_slice(&body)
            .map_err(|e| ListingError::Validation(format!("Invalid request body: {}", e)))?;
        let image_url = validate_image_url(&request.image_url)?;
        if image_url.starts_with("data:") {
            data.image_processor.prepare_data_uri(&image_url)?
        } else {
            AnalysisInput::Url(image_url)
        }
    } else {
        return Err(ListingError::Validation(format!(
            "Unsupported content type: {}",
            content_type
        )));
    };

    let listing = data.orchestrator.analyze(&input).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(listing)))
}

async fn read_upload(mut payload: Multipart, data: &AppState) -> Result<AnalysisInput, ListingError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ListingError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.content_disposition().get_name() != Some("image") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut image_data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ListingError::Validation(format!("Invalid multipart body: {}", e)))?
        {
            if image_data.len() + chunk.len() > data.max_upload_bytes {
                return Err(ListingError::Validation(format!(
                    "Image exceeds {} bytes",
                    data.max_upload_bytes
                )));
            }
            image_data.extend_from_slice(&chunk);
        }

        return data.image_processor.prepare_upload(&image_data, &content_type);
    }

    Err(ListingError::Validation(
        "Multipart body has no `image` field".to_string(),
    ))
}

async fn read_body(mut payload: web::Payload, limit: usize) -> Result<BytesMut, ListingError> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk =
            chunk.map_err(|e| ListingError::Validation(format!("Invalid request body: {}", e)))?;
        if body.len() + chunk.len() > limit {
            return Err(ListingError::Validation("Request body too large".to_string()));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn validate_image_url(url: &str) -> Result<String, ListingError> {
    let url = url.trim();
    let supported = ["http://", "https://", "data:image/"]
        .iter()
        .any(|scheme| url.starts_with(scheme));
    if !supported {
        return Err(ListingError::Validation(
            "imageUrl must be an http(s) URL or an image data URI".to_string(),
        ));
    }
    Ok(url.to_string())
}

pub async fn enhance_image(
    body: web::Json<EnhanceRequest>,
    data: web::Data<AppState>,
) -> HandlerResult {
    let request = body.into_inner();
    let image_url = validate_image_url(&request.image_url)?;
    request.options.validate()?;

    let enhanced = data
        .orchestrator
        .enhancer()
        .enhance(&image_url, &request.options)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(enhanced)))
}

pub async fn list_products(data: web::Data<AppState>) -> HandlerResult {
    let listings = data.store.list().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(listings)))
}

pub async fn create_product(
    body: web::Json<ListingDraft>,
    data: web::Data<AppState>,
) -> HandlerResult {
    let draft = body.into_inner();
    draft.validate()?;

    let listing = data.store.create(draft).await?;
    info!("Saved listing {}", listing.id);

    Ok(HttpResponse::Created().json(ApiResponse::ok(listing)))
}

pub async fn get_product(path: web::Path<Uuid>, data: web::Data<AppState>) -> HandlerResult {
    let listing = data.store.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(listing)))
}

pub async fn update_product(
    path: web::Path<Uuid>,
    body: web::Json<ListingDraft>,
    data: web::Data<AppState>,
) -> HandlerResult {
    let draft = body.into_inner();
    draft.validate()?;

    let listing = data.store.update(&path.into_inner(), draft).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(listing)))
}

pub async fn list_product_exports(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> HandlerResult {
    let listing = data.store.get(&path.into_inner()).await?;
    let exports = data.store.exports_for(&listing.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(exports)))
}

pub async fn export_product(
    body: web::Json<ExportRequest>,
    data: web::Data<AppState>,
) -> HandlerResult {
    let results = data.dispatcher.export(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(results)))
}

pub async fn list_marketplaces() -> HttpResponse {
    let catalog: Vec<MarketplaceInfo> = Marketplace::ALL
        .into_iter()
        .map(|m| MarketplaceInfo {
            name: m,
            required_fields: m.required_fields(),
        })
        .collect();
    HttpResponse::Ok().json(ApiResponse::ok(catalog))
}
