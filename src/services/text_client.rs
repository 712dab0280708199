// src/services/text_client.rs
use crate::errors::ListingError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

const SERVICE: &str = "Text generation API";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ListingError>;
}

/// Perplexity chat-completions client (OpenAI-compatible).
pub struct PerplexityClient {
    api_key: Option<String>,
    endpoint: String,
    client: Client,
}

impl PerplexityClient {
    pub fn new(api_key: Option<String>, endpoint: &str, client: Client) -> Self {
        Self {
            api_key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl TextGenerator for PerplexityClient {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ListingError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ListingError::UpstreamUnavailable("PERPLEXITY_API_KEY"))?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&json!({
                "model": model,
                "messages": [{
                    "role": "user",
                    "content": prompt
                }]
            }))
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

        extract_content(&result)
    }
}

fn extract_content(result: &Value) -> Result<String, ListingError> {
    result["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ListingError::Upstream {
            service: SERVICE,
            status: 200,
            message: "No content in completion response".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content() {
        let result = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Ceramic Mug" } }]
        });
        assert_eq!(extract_content(&result).unwrap(), "Ceramic Mug");
    }

    #[test]
    fn test_extract_content_missing() {
        let result = json!({ "choices": [] });
        assert!(matches!(
            extract_content(&result),
            Err(ListingError::Upstream { status: 200, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let client = PerplexityClient::new(None, "http://127.0.0.1:9/", Client::new());
        assert_eq!(client.endpoint, "http://127.0.0.1:9");
        let result = client.generate("title please", "pplx-7b-online").await;
        assert!(matches!(
            result,
            Err(ListingError::UpstreamUnavailable("PERPLEXITY_API_KEY"))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upstream_error() {
        let client = PerplexityClient::new(
            Some("key".to_string()),
            "http://127.0.0.1:9",
            Client::new(),
        );
        let result = client.generate("title please", "pplx-7b-online").await;
        assert!(matches!(result, Err(ListingError::Upstream { status: 0, .. })));
    }

    #[tokio::test]
    async fn test_silent_upstream_times_out_as_upstream_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever answering.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = PerplexityClient::new(
            Some("key".to_string()),
            &format!("http://{}", addr),
            crate::services::http_client(std::time::Duration::from_millis(100)).unwrap(),
        );
        match client.generate("title please", "pplx-7b-online").await {
            Err(ListingError::Upstream {
                status, message, ..
            }) => {
                assert_eq!(status, 0);
                assert_eq!(message, "request timed out");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
