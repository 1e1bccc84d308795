//! AI transport abstraction
//!
//! Supports:
//! - Gemini (`generateContent`)
//! - OpenAI-compatible chat completions
//!
//! The agent loop only sees [`Transport`]; provider details stay here.

mod gemini;
mod openai;

pub use gemini::GeminiTransport;
pub use openai::OpenAiTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::{Config, Error, Result};

/// Who a prompt segment comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged piece of a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSegment {
    pub role: Role,
    pub text: String,
}

/// An ordered list of role-tagged segments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub segments: Vec<PromptSegment>,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.segments.push(PromptSegment {
            role,
            text: text.into(),
        });
    }

    /// All system segments joined together
    pub fn system_text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| s.role == Role::System)
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Non-system segments with consecutive same-role segments merged
    pub fn conversation(&self) -> Vec<(Role, String)> {
        let mut turns: Vec<(Role, String)> = Vec::new();
        for segment in self.segments.iter().filter(|s| s.role != Role::System) {
            match turns.last_mut() {
                Some((role, text)) if *role == segment.role => {
                    text.push_str("\n\n");
                    text.push_str(&segment.text);
                }
                _ => turns.push((segment.role, segment.text.clone())),
            }
        }
        turns
    }

    /// Total text length, for logging
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.text.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Failure to get a reply from the AI service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request timed out")]
    Timeout,
}

impl TransportError {
    /// Network failures, rate limiting and server errors may succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Malformed(_) | TransportError::Timeout => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Malformed(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Bounded retries with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff,
            ..Default::default()
        }
    }

    /// Delay before retrying after the given (1-based) failed attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> std::result::Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "Transport attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// POST a JSON body and decode the JSON reply, retrying per policy
async fn post_json<B: Serialize + Sync>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    retry: &RetryPolicy,
) -> std::result::Result<serde_json::Value, TransportError> {
    retry
        .run(move || async move {
            let response = client.post(url).json(body).send().await?;
            let status = response.status();
            let text = response.text().await?;
            debug!("HTTP {} ({} bytes)", status, text.len());

            if !status.is_success() {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body: text.chars().take(500).collect(),
                });
            }
            serde_json::from_str(&text).map_err(|e| TransportError::Malformed(e.to_string()))
        })
        .await
}

/// Core transport trait
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name of this transport
    fn name(&self) -> &str;

    /// Send the prompt and return the reply text
    async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, TransportError>;
}

/// Transport kind enum for config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Gemini,
    OpenAi,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Gemini => write!(f, "gemini"),
            TransportKind::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(TransportKind::Gemini),
            "openai" | "open-ai" | "openai-compatible" => Ok(TransportKind::OpenAi),
            _ => Err(Error::Config(format!("Unknown transport kind: {}", s))),
        }
    }
}

/// Create a transport based on configuration
pub fn create_transport(config: &Config) -> Result<Box<dyn Transport>> {
    let kind: TransportKind = config.transport.kind.parse()?;

    match kind {
        TransportKind::Gemini => Ok(Box::new(GeminiTransport::new(&config.transport)?)),
        TransportKind::OpenAi => Ok(Box::new(OpenAiTransport::new(&config.transport)?)),
    }
}

fn http_client(config: &TransportConfig, headers: reqwest::header::HeaderMap) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
}
