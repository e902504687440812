use std::sync::Arc;

use tracing::{error, warn};

use crate::llm::{ChatMessage, ChatOptions};
use crate::traits::ChatModel;

/// Upper bound on the fan-out, original query included.
pub const MAX_EXPANDED_QUERIES: usize = 5;

const EXPANSION_PROMPT: &str = r#"You are an expert at query expansion. Based on the user's question, generate a JSON array of 3-5 diverse, specific search queries. Return ONLY the JSON array.
Example: User question: "Safety requirements for thruster control system?"
Response: ["thruster control system safety", "emergency stop procedures", "control system warnings", "operator safety guidelines"]"#;

/// Rewrites one user question into several search queries through a chat
/// model. Expansion is best-effort: without a model, or when the model
/// misbehaves, the original query is used alone.
pub struct QueryExpander {
    chat: Option<Arc<dyn ChatModel>>,
}

impl QueryExpander {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat: Some(chat) }
    }

    pub fn disabled() -> Self {
        Self { chat: None }
    }

    /// Between one and five distinct queries, always containing `query`.
    pub async fn expand(&self, query: &str) -> Vec<String> {
        let Some(chat) = &self.chat else {
            return vec![query.to_string()];
        };

        let messages = [
            ChatMessage::system(EXPANSION_PROMPT),
            ChatMessage::user(query),
        ];
        let options = ChatOptions {
            temperature: Some(0.3),
            max_tokens: Some(100),
        };

        let parsed = match chat.invoke(&messages, options).await {
            Ok(response) => {
                let parsed = parse_expansions(&response);
                if parsed.is_none() {
                    warn!(response = %response, "expansion response was not a JSON string array");
                }
                parsed
            }
            Err(invoke_error) => {
                error!(error = %invoke_error, "query expansion failed, falling back to the original query");
                None
            }
        };

        match parsed {
            Some(queries) => cap_queries(queries, query),
            None => vec![query.to_string()],
        }
    }
}

/// Pulls a JSON string array out of the model response, tolerating a
/// markdown code fence around it.
fn parse_expansions(response: &str) -> Option<Vec<String>> {
    serde_json::from_str(strip_code_fence(response)).ok()
}

fn strip_code_fence(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    if let Some(start) = text.find("```") {
        let rest = &text[start + "```".len()..];
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    text.trim()
}

/// Dedupes, drops blanks, guarantees the original query survives the cap.
fn cap_queries(raw: Vec<String>, original: &str) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    for query in raw {
        let query = query.trim().to_string();
        if !query.is_empty() && !queries.contains(&query) {
            queries.push(query);
        }
    }

    match queries.iter().position(|query| query == original) {
        Some(position) if position < MAX_EXPANDED_QUERIES => {
            queries.truncate(MAX_EXPANDED_QUERIES);
        }
        _ => {
            queries.truncate(MAX_EXPANDED_QUERIES - 1);
            queries.push(original.to_string());
        }
    }
    queries
}
