//! Remote embedding client for Cohere-style endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use libris_core::{EmbedError, EmbeddingService};

/// Known model dimensions. Unlisted models fall back to 1024.
const MODEL_DIMENSIONS: &[(&str, usize)] = &[
    ("embed-english-v3.0", 1024),
    ("embed-english-light-v3.0", 384),
    ("embed-multilingual-v3.0", 1024),
    ("embed-multilingual-light-v3.0", 384),
];

const DEFAULT_DIMENSION: usize = 1024;

/// Configuration for [`CohereEmbedder`].
#[derive(Debug, Clone)]
pub struct CohereConfig {
    /// API credential
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Endpoint base, `https://api.cohere.com` unless overridden
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl CohereConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.cohere.com".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Async embeddings client for a Cohere-style `/v1/embed` endpoint.
#[derive(Debug)]
pub struct CohereEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl CohereEmbedder {
    /// Build a client. Fails without a credential or model name.
    pub fn new(config: CohereConfig) -> Result<Self, EmbedError> {
        if config.api_key.trim().is_empty() {
            return Err(EmbedError::MissingCredentials);
        }
        if config.model.trim().is_empty() {
            return Err(EmbedError::InvalidResponse(
                "missing embedding model name".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| EmbedError::Auth("API key is not a valid header value".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbedError::Provider {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let dimension = MODEL_DIMENSIONS
            .iter()
            .find(|(name, _)| *name == config.model)
            .map_or(DEFAULT_DIMENSION, |(_, dim)| *dim);

        Ok(Self {
            client,
            endpoint: format!("{}/v1/embed", config.base_url.trim_end_matches('/')),
            model: config.model,
            dimension,
        })
    }

    async fn embed(&self, texts: &[String], input_type: &str) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            texts,
            model: &self.model,
            input_type,
            truncate: "END",
        };

        debug!(count = texts.len(), model = %self.model, input_type, "embedding batch");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            EmbedError::InvalidResponse(format!("unparseable embed response: {e}"))
        })?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbedError::InvalidResponse(format!(
                "requested {} embeddings, received {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        for (i, vector) in parsed.embeddings.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(EmbedError::InvalidResponse(format!(
                    "embedding {i} has dimension {}, expected {}",
                    vector.len(),
                    self.dimension
                )));
            }
        }

        Ok(parsed.embeddings)
    }
}

fn classify_transport_error(err: reqwest::Error) -> EmbedError {
    EmbedError::Provider {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

fn classify_status(status: StatusCode, body: String) -> EmbedError {
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EmbedError::Auth(body),
        StatusCode::TOO_MANY_REQUESTS => EmbedError::Provider {
            status: Some(code),
            message: body,
        },
        s if s.is_server_error() => EmbedError::Provider {
            status: Some(code),
            message: body,
        },
        _ => EmbedError::InvalidResponse(format!("request rejected (status {code}): {body}")),
    }
}

#[async_trait]
impl EmbeddingService for CohereEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.embed(texts, "search_document").await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed(&[text.to_string()], "search_query").await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::InvalidResponse("empty embedding result".to_string()))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    model: &'a str,
    input_type: &'a str,
    truncate: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str) -> CohereConfig {
        CohereConfig::new("test-key", model)
    }

    #[test]
    fn known_models_resolve_their_dimension() {
        let e = CohereEmbedder::new(config("embed-english-v3.0")).unwrap();
        assert_eq!(e.dimension(), 1024);

        let e = CohereEmbedder::new(config("embed-english-light-v3.0")).unwrap();
        assert_eq!(e.dimension(), 384);

        let e = CohereEmbedder::new(config("some-future-model")).unwrap();
        assert_eq!(e.dimension(), 1024);
    }

    #[test]
    fn missing_credentials_are_rejected_up_front() {
        let err = CohereEmbedder::new(CohereConfig::new("  ", "embed-english-v3.0")).unwrap_err();
        assert!(matches!(err, EmbedError::MissingCredentials));
    }

    #[test]
    fn endpoint_is_normalized() {
        let mut cfg = config("embed-english-v3.0");
        cfg.base_url = "https://api.cohere.com/".to_string();
        let e = CohereEmbedder::new(cfg).unwrap();
        assert_eq!(e.endpoint, "https://api.cohere.com/v1/embed");
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, String::new()),
            EmbedError::Auth(_)
        ));
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_retriable());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_retriable());
        assert!(!classify_status(StatusCode::BAD_REQUEST, String::new()).is_retriable());
    }

    #[test]
    fn request_serializes_the_wire_shape() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let request = EmbedRequest {
            texts: &texts,
            model: "embed-english-v3.0",
            input_type: "search_document",
            truncate: "END",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["texts"], serde_json::json!(["a", "b"]));
        assert_eq!(json["input_type"], "search_document");
    }
}
