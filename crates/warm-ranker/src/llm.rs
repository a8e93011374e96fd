//! Chat-completion clients implementing [`LanguageModel`].
//!
//! Two wire formats, selected by `llm.provider`:
//! - `openai`: `POST {base_url}/chat/completions` with a bearer token. Any
//!   OpenAI-compatible gateway works by changing `base_url`.
//! - `ollama`: `POST {base_url}/api/chat` with `stream: false`.
//!
//! Both retry transient failures via [`send_with_retry`].

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use warm_ranker_core::agent::LanguageModel;

use crate::config::LlmConfig;
use crate::embedding::send_with_retry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[cfg(test)]
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
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiChatModel {
    client: reqwest::Client,
    name: String,
    model: String,
    endpoint: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("llm.model required for OpenAI provider"))?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
            name: format!("openai:{}", model),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let req = OpenAiChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let json = send_with_retry("OpenAI chat API", self.max_retries, || {
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&req)
        })
        .await?;

        parse_openai_chat(json)
    }
}

fn parse_openai_chat(json: serde_json::Value) -> Result<String> {
    let body: OpenAiChatResponse = serde_json::from_value(json)
        .map_err(|e| anyhow!("Invalid OpenAI chat response: {}", e))?;
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow!("OpenAI chat response had no content"))
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(&[ChatMessage::user(prompt)]).await
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

pub struct OllamaChatModel {
    client: reqwest::Client,
    name: String,
    model: String,
    endpoint: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OllamaChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("llm.model required for Ollama provider"))?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
            name: format!("ollama:{}", model),
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let req = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let json = send_with_retry("Ollama chat API", self.max_retries, || {
            self.client.post(&self.endpoint).json(&req)
        })
        .await?;

        let body: OllamaChatResponse = serde_json::from_value(json)
            .map_err(|e| anyhow!("Invalid Ollama chat response: {}", e))?;
        Ok(body.message.content)
    }
}

#[async_trait]
impl LanguageModel for OllamaChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(&[ChatMessage::user(prompt)]).await
    }
}

/// Build the configured model, or `None` when `llm.provider = "disabled"`.
pub fn create_language_model(config: &LlmConfig) -> Result<Option<Arc<dyn LanguageModel>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "openai" => Ok(Some(Arc::new(OpenAiChatModel::new(config)?))),
        "ollama" => Ok(Some(Arc::new(OllamaChatModel::new(config)?))),
        other => bail!("Unknown llm provider: {}", other),
    }
}
