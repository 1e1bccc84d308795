//! OpenAI-compatible transport implementation
//!
//! Uses the non-streaming `/chat/completions` endpoint, so any compatible
//! server (OpenAI, a local llama.cpp or vLLM) can drive investigations.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{http_client, post_json, Prompt, RetryPolicy, Role, Transport, TransportError};
use crate::config::TransportConfig;
use crate::{Error, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Chat completions transport
pub struct OpenAiTransport {
    endpoint: String,
    client: reqwest::Client,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

/// Chat message format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl OpenAiTransport {
    /// Create a new OpenAI-compatible transport
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        // Local servers often need no key
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        if api_key.is_none() && config.api_base.is_none() {
            return Err(Error::Config("OpenAI API key not configured".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key))
                    .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
            );
        }

        info!("Using OpenAI-compatible model {} at {}", config.model, api_base);

        Ok(Self {
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            client: http_client(config, headers)?,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
            retry: RetryPolicy::from_config(config),
        })
    }

    fn build_request(&self, prompt: &Prompt) -> ChatCompletionRequest {
        let mut messages = Vec::new();
        let system = prompt.system_text();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(system),
            });
        }
        for (role, text) in prompt.conversation() {
            messages.push(ChatMessage {
                role: match role {
                    Role::Assistant => "assistant",
                    _ => "user",
                }
                .to_string(),
                content: Some(text),
            });
        }

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }

    fn extract_text(body: serde_json::Value) -> std::result::Result<String, TransportError> {
        let response: ChatCompletionResponse =
            serde_json::from_value(body).map_err(|e| TransportError::Malformed(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Malformed("no choices".to_string()))?;

        match choice.message.content {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(TransportError::Malformed(format!(
                "empty reply (finish reason: {})",
                choice.finish_reason.as_deref().unwrap_or("unknown")
            ))),
        }
    }
}

#[async_trait]
impl Transport for OpenAiTransport {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, TransportError> {
        let request = self.build_request(prompt);
        debug!(
            "Sending {} messages to {}",
            request.messages.len(),
            self.endpoint
        );
        let body = post_json(&self.client, &self.endpoint, &request, &self.retry).await?;
        Self::extract_text(body)
    }
}
