use crate::models::ChunkPayload;

/// One condition on a keyword-indexed payload field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCondition {
    /// Field equals the value exactly.
    Matches { field: String, value: String },
    /// Field equals any of the listed values.
    MatchesAny { field: String, values: Vec<String> },
}

/// Conjunction of field conditions. Every condition must hold.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointFilter {
    pub must: Vec<FieldCondition>,
}

impl PointFilter {
    /// All chunks of one document owned by one user.
    pub fn document(user_id: &str, file_id: &str) -> Self {
        Self {
            must: vec![
                FieldCondition::Matches {
                    field: "user_id".to_string(),
                    value: user_id.to_string(),
                },
                FieldCondition::Matches {
                    field: "file_id".to_string(),
                    value: file_id.to_string(),
                },
            ],
        }
    }

    /// Chunks of any of the listed documents owned by one user.
    pub fn documents(user_id: &str, file_ids: &[String]) -> Self {
        Self {
            must: vec![
                FieldCondition::Matches {
                    field: "user_id".to_string(),
                    value: user_id.to_string(),
                },
                FieldCondition::MatchesAny {
                    field: "file_id".to_string(),
                    values: file_ids.to_vec(),
                },
            ],
        }
    }

    /// Chunks of any of the listed documents, regardless of owner.
    pub fn file_ids(file_ids: &[String]) -> Self {
        Self {
            must: vec![FieldCondition::MatchesAny {
                field: "file_id".to_string(),
                values: file_ids.to_vec(),
            }],
        }
    }
}

/// A point ready to be written: id, embedding and full payload.
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// One similarity-search match. Payload fields are optional because the
/// store does not guarantee what older points carry.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub score: f32,
    pub file_id: Option<String>,
    pub chunk_index: Option<u64>,
    pub text: Option<String>,
    pub original_filename: Option<String>,
}

/// One point returned by a scroll. The payload is absent when the scroll
/// was issued without payloads.
#[derive(Debug, Clone)]
pub struct ScrolledPoint {
    pub id: String,
    pub payload: Option<ChunkPayload>,
}

/// The slice of collection metadata the pipeline cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionInfo {
    pub vector_size: usize,
}
