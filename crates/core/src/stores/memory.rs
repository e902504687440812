//! In-memory vector store with cosine ranking, for tests and local runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{
    CollectionInfo, FieldCondition, PointFilter, ScrolledPoint, SearchHit, StoredPoint,
};
use crate::traits::VectorStore;

#[derive(Debug, Default)]
struct MemoryCollection {
    vector_size: usize,
    indexed_fields: BTreeSet<String>,
    points: BTreeMap<String, StoredPoint>,
}

/// Keeps whole collections behind one `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields with a keyword index, for assertions on schema setup.
    pub async fn indexed_fields(&self, name: &str) -> Vec<String> {
        let collections = self.collections.read().await;
        collections
            .get(name)
            .map(|collection| collection.indexed_fields.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn missing_collection(name: &str) -> StoreError {
    StoreError::BackendResponse {
        backend: "memory".to_string(),
        details: format!("collection {name} does not exist"),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn point_matches(filter: &PointFilter, point: &StoredPoint) -> bool {
    let payload = match serde_json::to_value(&point.payload) {
        Ok(value) => value,
        Err(_) => return false,
    };

    filter.must.iter().all(|condition| match condition {
        FieldCondition::Matches { field, value } => {
            payload.get(field).and_then(Value::as_str) == Some(value.as_str())
        }
        FieldCondition::MatchesAny { field, values } => payload
            .get(field)
            .and_then(Value::as_str)
            .map(|actual| values.iter().any(|value| value == actual))
            .unwrap_or(false),
    })
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|collection| CollectionInfo {
            vector_size: collection.vector_size,
        }))
    }

    async fn create_collection(&self, name: &str, vector_size: usize) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(StoreError::BackendResponse {
                backend: "memory".to_string(),
                details: format!("collection {name} already exists"),
            });
        }

        collections.insert(
            name.to_string(),
            MemoryCollection {
                vector_size,
                ..MemoryCollection::default()
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn create_payload_index(&self, name: &str, field: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| missing_collection(name))?;
        collection.indexed_fields.insert(field.to_string());
        Ok(())
    }

    async fn upsert_points(&self, name: &str, points: Vec<StoredPoint>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| missing_collection(name))?;

        for point in points {
            if point.vector.len() != collection.vector_size {
                return Err(StoreError::BackendResponse {
                    backend: "memory".to_string(),
                    details: format!(
                        "vector has {} dimensions, collection {name} stores {}",
                        point.vector.len(),
                        collection.vector_size
                    ),
                });
            }
            collection.points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn search_points(
        &self,
        name: &str,
        vector: &[f32],
        filter: &PointFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| missing_collection(name))?;

        let mut hits: Vec<SearchHit> = collection
            .points
            .values()
            .filter(|point| point_matches(filter, point))
            .map(|point| SearchHit {
                score: cosine_similarity(&point.vector, vector),
                file_id: Some(point.payload.file_id.clone()),
                chunk_index: Some(point.payload.chunk_index),
                text: Some(point.payload.text.clone()),
                original_filename: Some(point.payload.original_filename.clone()),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scroll_points(
        &self,
        name: &str,
        filter: &PointFilter,
        limit: usize,
        with_payload: bool,
    ) -> Result<Vec<ScrolledPoint>, StoreError> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| missing_collection(name))?;

        Ok(collection
            .points
            .values()
            .filter(|point| point_matches(filter, point))
            .take(limit)
            .map(|point| ScrolledPoint {
                id: point.id.clone(),
                payload: with_payload.then(|| point.payload.clone()),
            })
            .collect())
    }

    async fn delete_points(&self, name: &str, filter: &PointFilter) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| missing_collection(name))?;

        collection.points.retain(|_, point| !point_matches(filter, point));
        Ok(())
    }
}
