use crate::error::EmbedError;
use crate::traits::EmbeddingClient;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Width of the stored vectors. The collection schema is created with this
/// size, so the embedding backend must produce vectors of exactly this width.
pub const EMBEDDING_DIMENSIONS: usize = 1024;

/// Embedding client for any OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl HttpEmbeddingClient {
    /// `base_url` is the API root including any `/v1` segment.
    pub fn new(base_url: &str, api_key: Option<String>, model: &str, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            dimensions,
        }
    }
}

/// Collects `data[*].embedding` slots by their `index` field. The backend is
/// allowed to return entries out of order.
fn vectors_from_response(
    payload: &Value,
    expected_count: usize,
    expected_dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| EmbedError::Backend("embedding response had no data array".to_string()))?;

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected_count];
    for entry in data {
        let index = entry.get("index").and_then(Value::as_u64).map(|value| value as usize);
        let vector = entry.get("embedding").and_then(Value::as_array).map(|values| {
            values
                .iter()
                .filter_map(Value::as_f64)
                .map(|value| value as f32)
                .collect::<Vec<f32>>()
        });

        if let (Some(index), Some(vector)) = (index, vector) {
            if index < expected_count {
                slots[index] = Some(vector);
            }
        }
    }

    let mut vectors = Vec::with_capacity(expected_count);
    for (index, slot) in slots.into_iter().enumerate() {
        let vector = slot.ok_or(EmbedError::MissingVector { index })?;
        if vector.len() != expected_dimensions {
            return Err(EmbedError::Dimension {
                expected: expected_dimensions,
                actual: vector.len(),
            });
        }
        vectors.push(vector);
    }

    Ok(vectors)
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(EmbedError::Backend(format!(
                "embedding request returned {status}: {details}"
            )));
        }

        let payload: Value = response.json().await?;
        vectors_from_response(&payload, texts.len(), self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Deterministic offline embedder hashing lowercase character trigrams into
/// a fixed number of buckets, L2-normalized. Needs no external service;
/// used by tests and local runs without a model server.
#[derive(Debug, Clone, Copy)]
pub struct HashedNgramEmbedder {
    pub dimensions: usize,
}

impl Default for HashedNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: EMBEDDING_DIMENSIONS,
        }
    }
}

impl HashedNgramEmbedder {
    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingClient for HashedNgramEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
