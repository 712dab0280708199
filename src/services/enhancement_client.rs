// src/services/enhancement_client.rs
use crate::errors::ListingError;
use crate::models::{EnhancedImage, EnhancementOptions};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

const SERVICE: &str = "Enhancement API";

#[async_trait]
pub trait PhotoEnhancer: Send + Sync {
    /// Options are forwarded as given; range checks are the caller's job.
    async fn enhance(
        &self,
        image: &str,
        options: &EnhancementOptions,
    ) -> Result<EnhancedImage, ListingError>;
}

#[derive(Serialize)]
struct EnhanceRequest<'a> {
    image: &'a str,
    #[serde(flatten)]
    options: &'a EnhancementOptions,
}

/// Pixlr `/enhance` client.
pub struct PixlrClient {
    api_key: Option<String>,
    endpoint: String,
    client: Client,
}

impl PixlrClient {
    pub fn new(api_key: Option<String>, endpoint: &str, client: Client) -> Self {
        Self {
            api_key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl PhotoEnhancer for PixlrClient {
    async fn enhance(
        &self,
        image: &str,
        options: &EnhancementOptions,
    ) -> Result<EnhancedImage, ListingError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ListingError::UpstreamUnavailable("PIXLR_API_KEY"))?;

        let response = self
            .client
            .post(format!("{}/enhance", self.endpoint))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&EnhanceRequest { image, options })
            .send()
            .await
            .map_err(|e| ListingError::transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ListingError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message: error_text,
            });
        }

        response.json::<EnhancedImage>().await.map_err(|e| ListingError::Upstream {
            service: SERVICE,
            status: status.as_u16(),
            message: format!("Failed to parse enhancement response: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_passes_boundary_values_unchanged() {
        let options = EnhancementOptions {
            brightness: Some(-100),
            contrast: Some(0),
            saturation: Some(100),
            remove_background: Some(false),
            ..Default::default()
        };
        let body = serde_json::to_value(EnhanceRequest {
            image: "https://example.com/a.jpg",
            options: &options,
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "image": "https://example.com/a.jpg",
                "brightness": -100,
                "contrast": 0,
                "saturation": 100,
                "removeBackground": false
            })
        );
    }

    #[test]
    fn test_request_does_not_clamp_out_of_range() {
        let options = EnhancementOptions {
            brightness: Some(250),
            ..Default::default()
        };
        let body = serde_json::to_value(EnhanceRequest {
            image: "x",
            options: &options,
        })
        .unwrap();
        assert_eq!(body["brightness"], 250);
    }

    #[test]
    fn test_enhanced_image_without_size() {
        let image: EnhancedImage = serde_json::from_value(serde_json::json!({
            "url": "https://cdn.example.com/out.jpg",
            "width": 800,
            "height": 600
        }))
        .unwrap();
        assert_eq!(image.size, 0);
        assert_eq!(image.width, 800);
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let client = PixlrClient::new(None, "http://127.0.0.1:9", Client::new());
        let result = client.enhance("x", &EnhancementOptions::auto()).await;
        assert!(matches!(
            result,
            Err(ListingError::UpstreamUnavailable("PIXLR_API_KEY"))
        ));
    }
}
