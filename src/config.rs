// src/config.rs
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com";
pub const DEFAULT_TEXT_ENDPOINT: &str = "https://api.perplexity.ai";
pub const DEFAULT_ENHANCE_ENDPOINT: &str = "https://api.pixlr.com/v1";
pub const DEFAULT_TEXT_MODEL: &str = "pplx-7b-online";

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub vision_api_key: Option<String>,
    pub vision_endpoint: String,
    pub text_api_key: Option<String>,
    pub text_endpoint: String,
    pub text_model: String,
    pub enhance_api_key: Option<String>,
    pub enhance_endpoint: String,
    pub upstream_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        // Empty values count as unset.
        let get = |key: &str| vars.get(key).filter(|v| !v.trim().is_empty()).cloned();

        let upstream_timeout = match get("UPSTREAM_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("UPSTREAM_TIMEOUT_SECS is not a number: {}", v))?,
            ),
            None => Duration::from_secs(30),
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES is not a number: {}", v))?,
            None => 10 * 1024 * 1024,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            redis_url: get("REDIS_URL"),
            vision_api_key: get("GOOGLE_CLOUD_VISION_API_KEY"),
            vision_endpoint: get("VISION_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_VISION_ENDPOINT.to_string()),
            text_api_key: get("PERPLEXITY_API_KEY"),
            text_endpoint: get("TEXT_ENDPOINT").unwrap_or_else(|| DEFAULT_TEXT_ENDPOINT.to_string()),
            text_model: get("TEXT_MODEL").unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            enhance_api_key: get("PIXLR_API_KEY"),
            enhance_endpoint: get("ENHANCE_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ENHANCE_ENDPOINT.to_string()),
            upstream_timeout,
            max_upload_bytes,
        })
    }

    /// Names of credentials that are not set.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.vision_api_key.is_none() {
            missing.push("GOOGLE_CLOUD_VISION_API_KEY");
        }
        if self.text_api_key.is_none() {
            missing.push("PERPLEXITY_API_KEY");
        }
        if self.enhance_api_key.is_none() {
            missing.push("PIXLR_API_KEY");
        }
        missing
    }
}
