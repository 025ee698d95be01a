//! HTTP model client
//!
//! Speaks the minimal chat-completions shape: a two-message list plus merged
//! parameters out, `choices[0].message.content` back.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tracing::debug;

use super::{LlmError, ModelClient, ModelReply, ModelRequest, TokenUsage};
use crate::registry::RegistryEntry;

/// Maximum length of an error body carried into `LlmError::ApiError`
const MAX_ERROR_BODY_LEN: usize = 300;

/// Resolves `$KEY_NAME` placeholders
type KeyLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Model client backed by reqwest
pub struct HttpModelClient {
    http: Client,
    lookup: KeyLookup,
}

impl HttpModelClient {
    /// Client that resolves credentials from the process environment
    pub fn new() -> Result<Self, LlmError> {
        debug!("HttpModelClient::new: called");
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Client with a custom credential lookup
    pub fn with_lookup<F>(lookup: F) -> Result<Self, LlmError>
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        let http = Client::builder()
            .build()
            .map_err(|e| LlmError::Connection(e.to_string()))?;
        Ok(Self {
            http,
            lookup: Box::new(lookup),
        })
    }

    /// Build the JSON body: entry defaults, then call overrides, then model and messages
    pub fn build_request_body(entry: &RegistryEntry, request: &ModelRequest) -> Value {
        debug!(model = %entry.model, "build_request_body: called");
        let mut body = serde_json::Map::new();
        for (k, v) in &entry.parameters {
            body.insert(k.clone(), v.clone());
        }
        for (k, v) in &request.parameters {
            body.insert(k.clone(), v.clone());
        }
        body.insert("model".to_string(), json!(entry.model));
        body.insert("messages".to_string(), json!(request.messages()));
        Value::Object(body)
    }

    /// Pull the reply text and usage out of a response body
    pub fn parse_reply(body: &str) -> Result<ModelReply, LlmError> {
        debug!(body_len = body.len(), "parse_reply: called");
        let value: Value = serde_json::from_str(body)?;

        let content = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::Parse("missing choices[0].message.content".to_string()))?;

        let usage = value
            .get("usage")
            .map(|u| TokenUsage {
                prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
                completion_tokens: u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(ModelReply {
            content: content.to_string(),
            usage,
        })
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn call(&self, entry: &RegistryEntry, request: &ModelRequest) -> Result<ModelReply, LlmError> {
        debug!(model = %entry.model, url = %entry.api.url, "HttpModelClient::call: called");
        let method = Method::from_bytes(entry.api.method.as_bytes())
            .map_err(|e| LlmError::Connection(format!("invalid method {}: {}", entry.api.method, e)))?;

        let auth = entry
            .api
            .expand_auth_header(|key| (self.lookup)(key))
            .map_err(LlmError::MissingCredential)?;

        let mut builder = self
            .http
            .request(method, &entry.api.url)
            .header("content-type", "application/json")
            .json(&Self::build_request_body(entry, request));
        if let Some((name, value)) = auth {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        if !(200..300).contains(&status) {
            debug!(%status, "HttpModelClient::call: API error");
            let message: String = text.chars().take(MAX_ERROR_BODY_LEN).collect();
            return Err(LlmError::ApiError { status, message });
        }

        Self::parse_reply(&text)
    }
}
