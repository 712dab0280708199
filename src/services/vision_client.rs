// src/services/vision_client.rs
use crate::errors::ListingError;
use crate::models::*;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{Value, json};

const SERVICE: &str = "Vision API";

#[async_trait]
pub trait VisionApi: Send + Sync {
    async fn annotate(&self, input: &AnalysisInput) -> Result<VisionResult, ListingError>;
}

/// Google Cloud Vision `images:annotate` client.
pub struct GoogleVisionClient {
    api_key: Option<String>,
    endpoint: String,
    client: Client,
}

impl GoogleVisionClient {
    pub fn new(api_key: Option<String>, endpoint: &str, client: Client) -> Self {
        Self {
            api_key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn request_body(input: &AnalysisInput) -> Value {
        use base64::{Engine as _, engine::general_purpose};

        let image = match input {
            AnalysisInput::Url(url) => json!({ "source": { "imageUri": url } }),
            AnalysisInput::Upload { data, .. } => {
                json!({ "content": general_purpose::STANDARD.encode(data) })
            }
        };

        json!({
            "requests": [{
                "image": image,
                "features": [
                    { "type": "LABEL_DETECTION" },
                    { "type": "OBJECT_LOCALIZATION" },
                    { "type": "IMAGE_PROPERTIES" },
                    { "type": "TEXT_DETECTION" }
                ]
            }]
        })
    }
}

#[async_trait]
impl VisionApi for GoogleVisionClient {
    async fn annotate(&self, input: &AnalysisInput) -> Result<VisionResult, ListingError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ListingError::UpstreamUnavailable("GOOGLE_CLOUD_VISION_API_KEY"))?;

        let response = self
            .client
            .post(format!("{}/v1/images:annotate", self.endpoint))
            .query(&[("key", api_key)])
            .json(&Self::request_body(input))
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

        let result: Value = response
            .json()
            .await
            .map_err(|e| ListingError::transport(SERVICE, e))?;

        let vision = parse_vision_response(&result)?;
        debug!(
            "Vision returned {} labels, {} objects, {} text fragments",
            vision.labels.len(),
            vision.objects.len(),
            vision.text.len()
        );
        Ok(vision)
    }
}

/// Parses the first entry of an `images:annotate` response.
pub fn parse_vision_response(data: &Value) -> Result<VisionResult, ListingError> {
    let entry = &data["responses"][0];

    if let Some(err) = entry.get("error") {
        return Err(ListingError::Upstream {
            service: SERVICE,
            status: u16::try_from(err["code"].as_u64().unwrap_or(0)).unwrap_or(0),
            message: err["message"].as_str().unwrap_or("unknown error").to_string(),
        });
    }

    let labels = array(&entry["labelAnnotations"])
        .filter_map(|l| {
            Some(Label {
                description: l["description"].as_str()?.to_string(),
                score: l["score"].as_f64().unwrap_or(0.0) as f32,
            })
        })
        .collect();

    let objects = array(&entry["localizedObjectAnnotations"])
        .filter_map(|o| {
            Some(DetectedObject {
                name: o["name"].as_str()?.to_string(),
                score: o["score"].as_f64().unwrap_or(0.0) as f32,
                bounding_poly: array(&o["boundingPoly"]["normalizedVertices"])
                    .map(|v| Vertex {
                        // Vision omits zero coordinates.
                        x: v["x"].as_f64().unwrap_or(0.0) as f32,
                        y: v["y"].as_f64().unwrap_or(0.0) as f32,
                    })
                    .collect(),
            })
        })
        .collect();

    let dominant_colors = array(&entry["imagePropertiesAnnotation"]["dominantColors"]["colors"])
        .map(|c| ColorInfo {
            rgb: (
                channel(&c["color"]["red"]),
                channel(&c["color"]["green"]),
                channel(&c["color"]["blue"]),
            ),
            score: c["score"].as_f64().unwrap_or(0.0) as f32,
            pixel_fraction: c["pixelFraction"].as_f64().unwrap_or(0.0) as f32,
        })
        .collect();

    let text = array(&entry["textAnnotations"])
        .filter_map(|t| {
            Some(TextFragment {
                description: t["description"].as_str()?.to_string(),
                locale: t["locale"].as_str().map(|s| s.to_string()),
            })
        })
        .collect();

    Ok(VisionResult {
        labels,
        objects,
        properties: ImageProperties { dominant_colors },
        text,
    })
}

fn array(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_array().into_iter().flatten()
}

fn channel(value: &Value) -> u8 {
    value.as_f64().unwrap_or(0.0).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let data = json!({
            "responses": [{
                "labelAnnotations": [
                    { "description": "Mug", "score": 0.97 },
                    { "description": "Ceramic", "score": 0.88 }
                ],
                "localizedObjectAnnotations": [{
                    "name": "Coffee cup",
                    "score": 0.91,
                    "boundingPoly": { "normalizedVertices": [
                        { "x": 0.1, "y": 0.2 }, { "x": 0.9 }, { "x": 0.9, "y": 0.8 }
                    ]}
                }],
                "imagePropertiesAnnotation": { "dominantColors": { "colors": [
                    { "color": { "red": 250, "green": 12.0 }, "score": 0.5, "pixelFraction": 0.3 }
                ]}},
                "textAnnotations": [
                    { "description": "BEST DAD\nEVER", "locale": "en" },
                    { "description": "BEST" }
                ]
            }]
        });

        let vision = parse_vision_response(&data).unwrap();
        assert_eq!(vision.label_names(5), vec!["Mug", "Ceramic"]);
        assert_eq!(vision.objects[0].name, "Coffee cup");
        assert_eq!(vision.objects[0].bounding_poly[1], Vertex { x: 0.9, y: 0.0 });
        assert_eq!(vision.properties.dominant_colors[0].rgb, (250, 12, 0));
        assert_eq!(vision.detected_text(), "BEST DAD\nEVER");
        assert_eq!(vision.text[0].locale.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_empty_response() {
        let vision = parse_vision_response(&json!({ "responses": [{}] })).unwrap();
        assert_eq!(vision, VisionResult::default());
        assert_eq!(vision.detected_text(), "");
    }

    #[test]
    fn test_parse_error_entry() {
        let data = json!({
            "responses": [{ "error": { "code": 7, "message": "permission denied" } }]
        });
        match parse_vision_response(&data) {
            Err(ListingError::Upstream { status, message, .. }) => {
                assert_eq!(status, 7);
                assert_eq!(message, "permission denied");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_entry_with_oversized_code() {
        let data = json!({
            "responses": [{ "error": { "code": 65_537, "message": "odd" } }]
        });
        assert!(matches!(
            parse_vision_response(&data),
            Err(ListingError::Upstream { status: 0, .. })
        ));
    }

    #[test]
    fn test_request_body_for_url_and_upload() {
        let body = GoogleVisionClient::request_body(&AnalysisInput::Url(
            "https://example.com/a.jpg".to_string(),
        ));
        assert_eq!(
            body["requests"][0]["image"]["source"]["imageUri"],
            "https://example.com/a.jpg"
        );
        assert_eq!(body["requests"][0]["features"].as_array().unwrap().len(), 4);

        let body = GoogleVisionClient::request_body(&AnalysisInput::Upload {
            content_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        });
        assert_eq!(body["requests"][0]["image"]["content"], "AQID");
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let client = GoogleVisionClient::new(None, "http://127.0.0.1:9", Client::new());
        let result = client
            .annotate(&AnalysisInput::Url("https://example.com/a.jpg".to_string()))
            .await;
        assert!(matches!(
            result,
            Err(ListingError::UpstreamUnavailable("GOOGLE_CLOUD_VISION_API_KEY"))
        ));
    }
}
