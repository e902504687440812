use crate::error::ChatError;
use crate::traits::ChatModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

/// One turn of a chat transcript in OpenAI wire shape.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call sampling knobs. Unset fields are left to the backend default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Chat client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpChatModel {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpChatModel {
    /// `base_url` is the API root including any `/v1` segment.
    pub fn new(base_url: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }

    fn request_body(&self, messages: &[ChatMessage], options: ChatOptions) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });

        if let Some(object) = body.as_object_mut() {
            if let Some(temperature) = options.temperature {
                object.insert("temperature".to_string(), json!(temperature));
            }
            if let Some(max_tokens) = options.max_tokens {
                object.insert("max_tokens".to_string(), json!(max_tokens));
            }
        }

        body
    }
}

fn content_from_response(payload: &Value) -> Result<String, ChatError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ChatError::MalformedResponse)
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<String, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut request = self.client.post(&url).json(&self.request_body(messages, options));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(ChatError::Backend(format!(
                "chat completion returned {status}: {details}"
            )));
        }

        let payload: Value = response.json().await?;
        content_from_response(&payload)
    }
}
