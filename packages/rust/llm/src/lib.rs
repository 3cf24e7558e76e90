//! OpenAI-compatible embeddings and chat-completion client.
//!
//! One client covers both collaborator calls the pipeline needs: a single
//! batched `/embeddings` request and a single `/chat/completions` request.
//! Neither call retries internally; retries, if wanted, belong to the
//! caller.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use grounder_shared::{GrounderError, OpenAiConfig, Result};

/// Timeout for a single API call.
const API_TIMEOUT_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// OpenAiClient
// ---------------------------------------------------------------------------

/// Client for an OpenAI-compatible API.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    embedding_model: String,
    chat_model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    /// Build a client with an explicit API key (tests point `base_url` at a
    /// mock server).
    pub fn new(api_key: &str, config: &OpenAiConfig) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(GrounderError::config("API key is empty"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| GrounderError::config("API key contains invalid characters"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .map_err(|e| GrounderError::config(format!("failed to build API client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Build a client reading the API key from the configured env var.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            GrounderError::config(format!(
                "API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;
        Self::new(&api_key, config)
    }

    /// Embed a batch of texts in one atomic call.
    ///
    /// Returns one vector per input, index-aligned. Any non-success response
    /// or a count mismatch aborts with an embedding error; partial results
    /// are never returned.
    #[instrument(skip_all, fields(inputs = inputs.len(), model = %self.embedding_model))]
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: inputs,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| GrounderError::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GrounderError::Embedding(format!("HTTP {status}: {body}")));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| GrounderError::Embedding(format!("invalid response: {e}")))?;

        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != inputs.len() {
            return Err(GrounderError::Embedding(format!(
                "got {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        debug!(vectors = parsed.data.len(), "embedding batch complete");
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }

    /// One chat completion from a system prompt and the raw user message.
    #[instrument(skip_all, fields(model = %self.chat_model))]
    pub async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| GrounderError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GrounderError::Generation(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GrounderError::Generation(format!("invalid response: {e}")))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if answer.is_empty() {
            return Err(GrounderError::Generation("empty completion".into()));
        }

        Ok(answer)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
