//! Gemini transport implementation
//!
//! Calls `{api_base}/{model}:generateContent` with the system instructions as
//! `systemInstruction` and the conversation as `user`/`model` contents.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{http_client, post_json, Prompt, RetryPolicy, Role, Transport, TransportError};
use crate::config::TransportConfig;
use crate::{Error, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini `generateContent` transport
pub struct GeminiTransport {
    /// Full endpoint URL
    endpoint: String,
    /// HTTP client (API key in default headers)
    client: reqwest::Client,
    temperature: f32,
    max_output_tokens: u32,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiTransport {
    /// Create a new Gemini transport
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .ok_or_else(|| Error::Config("Gemini API key not configured".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        info!("Using Gemini model {}", config.model);

        Ok(Self {
            endpoint: format!(
                "{}/{}:generateContent",
                api_base.trim_end_matches('/'),
                config.model
            ),
            client: http_client(config, headers)?,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            retry: RetryPolicy::from_config(config),
        })
    }

    fn build_request(&self, prompt: &Prompt) -> GenerateRequest {
        let system = prompt.system_text();
        let contents = prompt
            .conversation()
            .into_iter()
            .map(|(role, text)| Content {
                role: Some(
                    match role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part { text: Some(text) }],
            })
            .collect();

        GenerateRequest {
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part { text: Some(system) }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    fn extract_text(body: serde_json::Value) -> std::result::Result<String, TransportError> {
        let response: GenerateResponse =
            serde_json::from_value(body).map_err(|e| TransportError::Malformed(e.to_string()))?;

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(TransportError::Malformed(format!("no reply ({})", reason)));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.is_empty() {
            return Err(TransportError::Malformed(format!(
                "empty reply (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, TransportError> {
        let request = self.build_request(prompt);
        debug!("Sending {} prompt bytes to Gemini", prompt.len());
        let body = post_json(&self.client, &self.endpoint, &request, &self.retry).await?;
        Self::extract_text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_transport() -> GeminiTransport {
        let config = TransportConfig {
            api_key: Some("test-key".to_string()),
            api_base: Some("https://example.invalid/models/".to_string()),
            ..Default::default()
        };
        GeminiTransport::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint() {
        let transport = create_test_transport();
        assert_eq!(
            transport.endpoint,
            "https://example.invalid/models/gemini-1.5-flash-latest:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let transport = create_test_transport();
        let mut prompt = Prompt::new();
        prompt.push(Role::System, "You drive gdb.");
        prompt.push(Role::User, "Goal: find the crash");
        prompt.push(Role::Assistant, "```gdb-command\nbt\n```");
        prompt.push(Role::User, "#0 crash () at a.c:4");

        let json = serde_json::to_value(transport.build_request(&prompt)).unwrap();
        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "You drive gdb."
        );
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["role"], "user");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4000);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "```gdb-command\n"}, {"text": "bt\n```"}]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            GeminiTransport::extract_text(body).unwrap(),
            "```gdb-command\nbt\n```"
        );
    }

    #[test]
    fn test_blocked_prompt_is_malformed() {
        let body = serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = GeminiTransport::extract_text(body).unwrap_err();
        assert!(matches!(err, TransportError::Malformed(msg) if msg.contains("SAFETY")));
    }

    #[test]
    fn test_empty_candidate_is_malformed() {
        let body = serde_json::json!({"candidates": [{"finishReason": "MAX_TOKENS"}]});
        assert!(matches!(
            GeminiTransport::extract_text(body),
            Err(TransportError::Malformed(_))
        ));
    }
}
