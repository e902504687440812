use crate::error::StoreError;
use crate::models::ChunkPayload;
use crate::store::{
    CollectionInfo, FieldCondition, PointFilter, ScrolledPoint, SearchHit, StoredPoint,
};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use url::Url;

/// Vector store backed by Qdrant's REST API.
pub struct QdrantStore {
    endpoint: String,
    client: Client,
    api_key: Option<String>,
}

impl QdrantStore {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, StoreError> {
        Url::parse(endpoint)?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: Client::new(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.endpoint, path));
        if let Some(api_key) = &self.api_key {
            request = request.header("api-key", api_key);
        }
        request
    }
}

async fn check(response: Response) -> Result<Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let details = response.text().await.unwrap_or_default();
    Err(StoreError::BackendResponse {
        backend: "qdrant".to_string(),
        details: format!("{status}: {details}"),
    })
}

fn filter_to_json(filter: &PointFilter) -> Value {
    let must = filter
        .must
        .iter()
        .map(|condition| match condition {
            FieldCondition::Matches { field, value } => json!({
                "key": field,
                "match": { "value": value },
            }),
            FieldCondition::MatchesAny { field, values } => json!({
                "key": field,
                "match": { "any": values },
            }),
        })
        .collect::<Vec<_>>();

    json!({ "must": must })
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

fn search_hits_from_response(parsed: &Value) -> Vec<SearchHit> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .map(|hit| SearchHit {
            score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
            file_id: hit
                .pointer("/payload/file_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            chunk_index: hit.pointer("/payload/chunk_index").and_then(Value::as_u64),
            text: hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .map(str::to_string),
            original_filename: hit
                .pointer("/payload/original_filename")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect()
}

fn scrolled_points_from_response(parsed: &Value) -> Vec<ScrolledPoint> {
    let points = parsed
        .pointer("/result/points")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    points
        .iter()
        .map(|point| ScrolledPoint {
            id: point.pointer("/id").map(id_to_string).unwrap_or_default(),
            payload: point
                .pointer("/payload")
                .and_then(|payload| serde_json::from_value::<ChunkPayload>(payload.clone()).ok()),
        })
        .collect()
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        let response = self
            .request(Method::GET, &format!("/collections/{name}"))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let parsed: Value = check(response).await?.json().await?;
        let vector_size = parsed
            .pointer("/result/config/params/vectors/size")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: format!("collection info for {name} has no vector size"),
            })?;

        Ok(Some(CollectionInfo {
            vector_size: vector_size as usize,
        }))
    }

    async fn create_collection(&self, name: &str, vector_size: usize) -> Result<(), StoreError> {
        let response = self
            .request(Method::PUT, &format!("/collections/{name}"))
            .json(&json!({
                "vectors": { "size": vector_size, "distance": "Cosine" },
            }))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, &format!("/collections/{name}"))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    async fn create_payload_index(&self, name: &str, field: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::PUT, &format!("/collections/{name}/index?wait=true"))
            .json(&json!({
                "field_name": field,
                "field_schema": "keyword",
            }))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    async fn upsert_points(&self, name: &str, points: Vec<StoredPoint>) -> Result<(), StoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let points = points
            .into_iter()
            .map(|point| {
                Ok(json!({
                    "id": point.id,
                    "vector": point.vector,
                    "payload": serde_json::to_value(&point.payload)?,
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let response = self
            .request(Method::PUT, &format!("/collections/{name}/points?wait=true"))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    async fn search_points(
        &self,
        name: &str,
        vector: &[f32],
        filter: &PointFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let response = self
            .request(Method::POST, &format!("/collections/{name}/points/search"))
            .json(&json!({
                "vector": vector,
                "filter": filter_to_json(filter),
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await?;

        let parsed: Value = check(response).await?.json().await?;
        Ok(search_hits_from_response(&parsed))
    }

    async fn scroll_points(
        &self,
        name: &str,
        filter: &PointFilter,
        limit: usize,
        with_payload: bool,
    ) -> Result<Vec<ScrolledPoint>, StoreError> {
        let response = self
            .request(Method::POST, &format!("/collections/{name}/points/scroll"))
            .json(&json!({
                "filter": filter_to_json(filter),
                "limit": limit,
                "with_payload": with_payload,
                "with_vector": false,
            }))
            .send()
            .await?;

        let parsed: Value = check(response).await?.json().await?;
        Ok(scrolled_points_from_response(&parsed))
    }

    async fn delete_points(&self, name: &str, filter: &PointFilter) -> Result<(), StoreError> {
        let response = self
            .request(
                Method::POST,
                &format!("/collections/{name}/points/delete?wait=true"),
            )
            .json(&json!({ "filter": filter_to_json(filter) }))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}
