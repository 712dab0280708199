// src/services/mod.rs
pub mod enhancement_client;
pub mod export_dispatcher;
pub mod image_processor;
pub mod listing_store;
pub mod orchestrator;
pub mod redis_service;
pub mod text_client;
pub mod vision_client;

pub use enhancement_client::{PhotoEnhancer, PixlrClient};
pub use export_dispatcher::ExportDispatcher;
pub use image_processor::ImageProcessor;
pub use listing_store::{ListingStore, MemoryListingStore};
pub use orchestrator::AnalysisOrchestrator;
pub use redis_service::RedisService;
pub use text_client::{PerplexityClient, TextGenerator};
pub use vision_client::{GoogleVisionClient, VisionApi};

use std::time::Duration;

/// Shared HTTP client for upstream calls; every request is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}
