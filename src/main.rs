// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, error, middleware, web};
use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::Config;
use crate::errors::ListingError;
use crate::handlers::{
    analyze_image, create_product, enhance_image, export_product, get_product, list_marketplaces,
    list_product_exports, list_products, update_product,
};
use crate::services::{
    AnalysisOrchestrator, ExportDispatcher, GoogleVisionClient, ImageProcessor, ListingStore,
    MemoryListingStore, PerplexityClient, PixlrClient, RedisService, http_client,
};

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<AnalysisOrchestrator>,
    store: Arc<dyn ListingStore>,
    dispatcher: Arc<ExportDispatcher>,
    image_processor: Arc<ImageProcessor>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<AnalysisOrchestrator>,
        store: Arc<dyn ListingStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            orchestrator,
            dispatcher: Arc::new(ExportDispatcher::new(store.clone())),
            store,
            image_processor: Arc::new(ImageProcessor::new()),
            max_upload_bytes,
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting listwise service...");

    let config = Config::from_env()?;
    for key in config.missing_credentials() {
        warn!("{} is not set; requests needing it will fail", key);
    }

    let client = http_client(config.upstream_timeout).context("Failed to build HTTP client")?;
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        Arc::new(GoogleVisionClient::new(
            config.vision_api_key.clone(),
            &config.vision_endpoint,
            client.clone(),
        )),
        Arc::new(PerplexityClient::new(
            config.text_api_key.clone(),
            &config.text_endpoint,
            client.clone(),
        )),
        Arc::new(PixlrClient::new(
            config.enhance_api_key.clone(),
            &config.enhance_endpoint,
            client,
        )),
        config.text_model.clone(),
    ));

    let store: Arc<dyn ListingStore> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisService::new(url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            warn!("REDIS_URL is not set; listings are kept in memory");
            Arc::new(MemoryListingStore::new())
        }
    };

    let app_state = AppState::new(orchestrator, store, config.max_upload_bytes);

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let message = match &err {
            error::JsonPayloadError::Deserialize(e) => format!("Invalid request body: {}", e),
            other => other.to_string(),
        };
        ListingError::Validation(message).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        ListingError::Validation(format!("Invalid path: {}", err)).into()
    }))
    .service(
        web::scope("/api/v1")
            .route("/analyze", web::post().to(analyze_image))
            .route("/enhance", web::post().to(enhance_image))
            .route("/products", web::get().to(list_products))
            .route("/products", web::post().to(create_product))
            .route("/products/{id}", web::get().to(get_product))
            .route("/products/{id}", web::put().to(update_product))
            .route("/products/{id}/exports", web::get().to(list_product_exports))
            .route("/export", web::post().to(export_product))
            .route("/marketplaces", web::get().to(list_marketplaces)),
    )
    .route("/health", web::get().to(health_check));
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "listwise",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
