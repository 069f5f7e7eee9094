//! LLM provider integrations for SQL generation.
//!
//! This module provides a unified interface for interacting with multiple LLM
//! providers. It handles authentication, request formatting, and response
//! parsing. One question produces one outbound call; transient failures are
//! retried only when [`RetryConfig::max_retries`] is raised above zero.
//!
//! # Supported Providers
//!
//! | Provider | Endpoint | Authentication |
//! |----------|----------|----------------|
//! | Gemini | `generativelanguage.googleapis.com` | x-goog-api-key header |
//! | OpenAI | `api.openai.com` | Bearer token |
//! | Anthropic | `api.anthropic.com` | x-api-key header |
//! | Ollama | Local (configurable) | None |
//!
//! # Example
//!
//! ```
//! use ipl_sql::{
//!     config::RetryConfig,
//!     llm::{LlmClient, LlmProvider}
//! };
//!
//! let provider = LlmProvider::Ollama {
//!     base_url: "http://localhost:11434".into(),
//!     model:    "llama3.2".into()
//! };
//!
//! let client = LlmClient::with_retry_config(provider, RetryConfig::default());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::RetryConfig,
    error::{AppError, AppResult, error_detail, http_error, llm_api_error},
    prompt::PromptTemplate,
    translator::TextGenerator
};

/// LLM provider configuration with authentication credentials.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Google Gemini API
    Gemini {
        /// API key
        api_key: String,
        /// Model identifier (e.g., "gemini-1.5-pro-latest")
        model:   String
    },
    /// OpenAI API (GPT-4, GPT-3.5, etc.)
    OpenAI {
        /// API key (sk-...)
        api_key: String,
        /// Model identifier (e.g., "gpt-4", "gpt-3.5-turbo")
        model:   String
    },
    /// Anthropic API (Claude models)
    Anthropic {
        /// API key
        api_key: String,
        /// Model identifier (e.g., "claude-sonnet-4-20250514")
        model:   String
    },
    /// Local Ollama instance
    Ollama {
        /// Base URL (e.g., "http://localhost:11434")
        base_url: String,
        /// Model name (e.g., "llama3.2", "sqlcoder")
        model:    String
    }
}

impl LlmProvider {
    /// Same provider and model with a different credential.
    ///
    /// Ollama takes no credential and is returned unchanged.
    pub fn with_api_key(&self, key: &str) -> Self {
        match self {
            Self::Gemini {
                model, ..
            } => Self::Gemini {
                api_key: key.to_string(),
                model:   model.clone()
            },
            Self::OpenAI {
                model, ..
            } => Self::OpenAI {
                api_key: key.to_string(),
                model:   model.clone()
            },
            Self::Anthropic {
                model, ..
            } => Self::Anthropic {
                api_key: key.to_string(),
                model:   model.clone()
            },
            Self::Ollama {
                ..
            } => self.clone()
        }
    }

    /// Provider name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemini {
                ..
            } => "gemini",
            Self::OpenAI {
                ..
            } => "openai",
            Self::Anthropic {
                ..
            } => "anthropic",
            Self::Ollama {
                ..
            } => "ollama"
        }
    }
}

/// HTTP client for LLM API communication.
///
/// Handles provider-specific request formatting and response parsing.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider:     LlmProvider,
    client:       reqwest::Client,
    retry_config: RetryConfig
}

#[derive(Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent,
    contents:           Vec<GeminiContent>
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role:  Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent
}

#[derive(Serialize)]
struct OpenAIRequest {
    model:    String,
    messages: Vec<OpenAIRequestMessage>
}

#[derive(Serialize)]
struct OpenAIRequestMessage {
    role:    String,
    content: String
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: String
}

#[derive(Serialize)]
struct AnthropicRequest {
    model:      String,
    max_tokens: u32,
    system:     String,
    messages:   Vec<AnthropicMessage>
}

#[derive(Serialize)]
struct AnthropicMessage {
    role:    String,
    content: String
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String
}

#[derive(Serialize)]
struct OllamaRequest {
    model:  String,
    prompt: String,
    stream: bool
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String
}

impl LlmClient {
    /// Create new LLM client with default retry configuration
    pub fn new(provider: LlmProvider) -> Self {
        Self::with_retry_config(provider, RetryConfig::default())
    }

    /// Create new LLM client with custom retry configuration
    pub fn with_retry_config(provider: LlmProvider, retry_config: RetryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            provider,
            client,
            retry_config
        }
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Client sharing this one's connection pool but using `key`
    pub fn with_api_key(&self, key: &str) -> Self {
        Self {
            provider:     self.provider.with_api_key(key),
            client:       self.client.clone(),
            retry_config: self.retry_config.clone()
        }
    }

    /// Ask the model for SQL answering `question` under `template`
    pub async fn complete(&self, template: &PromptTemplate, question: &str) -> AppResult<String> {
        let mut last_error = None;
        let mut delay = self.retry_config.initial_delay_ms;
        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                warn!(
                    attempt = attempt + 1,
                    of = self.retry_config.max_retries + 1,
                    delay_ms = delay,
                    "retrying LLM request"
                );
                sleep(Duration::from_millis(delay)).await;
                delay = ((delay as f64 * self.retry_config.backoff_factor) as u64)
                    .min(self.retry_config.max_delay_ms);
            }
            match self.call_provider(template, question).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if is_retryable_error(&e) {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| llm_api_error("All retry attempts failed")))
    }

    async fn call_provider(&self, template: &PromptTemplate, question: &str) -> AppResult<String> {
        debug!(provider = self.provider.name(), "calling LLM");
        match &self.provider {
            LlmProvider::Gemini {
                api_key,
                model
            } => self.call_gemini(api_key, model, template, question).await,
            LlmProvider::OpenAI {
                api_key,
                model
            } => self.call_openai(api_key, model, template, question).await,
            LlmProvider::Anthropic {
                api_key,
                model
            } => self.call_anthropic(api_key, model, template, question).await,
            LlmProvider::Ollama {
                base_url,
                model
            } => self.call_ollama(base_url, model, template, question).await
        }
    }

    async fn call_gemini(
        &self,
        api_key: &str,
        model: &str,
        template: &PromptTemplate,
        question: &str
    ) -> AppResult<String> {
        let request = gemini_request(template, question);
        let model = model.trim_start_matches("models/");
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "Gemini API error {}: {}",
                status, text
            )));
        }
        let result: GeminiResponse = response.json().await.map_err(http_error)?;
        gemini_text(result)
    }

    async fn call_openai(
        &self,
        api_key: &str,
        model: &str,
        template: &PromptTemplate,
        question: &str
    ) -> AppResult<String> {
        let request = OpenAIRequest {
            model:    model.to_string(),
            messages: vec![
                OpenAIRequestMessage {
                    role:    String::from("system"),
                    content: template.instructions().to_string()
                },
                OpenAIRequestMessage {
                    role:    String::from("user"),
                    content: question.to_string()
                },
            ]
        };
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "OpenAI API error {}: {}",
                status, text
            )));
        }
        let result: OpenAIResponse = response.json().await.map_err(http_error)?;
        result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| llm_api_error("Empty response from OpenAI"))
    }

    async fn call_anthropic(
        &self,
        api_key: &str,
        model: &str,
        template: &PromptTemplate,
        question: &str
    ) -> AppResult<String> {
        let request = AnthropicRequest {
            model:      model.to_string(),
            max_tokens: 1024,
            system:     template.instructions().to_string(),
            messages:   vec![AnthropicMessage {
                role:    String::from("user"),
                content: question.to_string()
            }]
        };
        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "Anthropic API error {}: {}",
                status, text
            )));
        }
        let result: AnthropicResponse = response.json().await.map_err(http_error)?;
        result
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| llm_api_error("Empty response from Anthropic"))
    }

    async fn call_ollama(
        &self,
        base_url: &str,
        model: &str,
        template: &PromptTemplate,
        question: &str
    ) -> AppResult<String> {
        let request = OllamaRequest {
            model:  model.to_string(),
            prompt: template.render(question),
            stream: false
        };
        let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "Ollama API error {}: {}",
                status, text
            )));
        }
        let result: OllamaResponse = response.json().await.map_err(http_error)?;
        Ok(result.response)
    }
}

impl TextGenerator for LlmClient {
    async fn generate(&self, template: &PromptTemplate, question: &str) -> AppResult<String> {
        self.complete(template, question).await
    }
}

fn is_retryable_error(error: &AppError) -> bool {
    let msg = error_detail(error).to_lowercase();
    msg.contains("timeout")
        || msg.contains("connection")
        || msg.contains("429")
        || msg.contains("rate limit")
        || msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
}

fn gemini_request(template: &PromptTemplate, question: &str) -> GeminiRequest {
    GeminiRequest {
        system_instruction: GeminiContent {
            role:  None,
            parts: vec![GeminiPart {
                text: template.instructions().to_string()
            }]
        },
        contents:           vec![GeminiContent {
            role:  Some(String::from("user")),
            parts: vec![GeminiPart {
                text: question.to_string()
            }]
        }]
    }
}

fn gemini_text(response: GeminiResponse) -> AppResult<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| llm_api_error("Empty response from Gemini"))?;
    let text: String = candidate
        .content
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect();
    if text.trim().is_empty() {
        return Err(llm_api_error("Gemini returned no text"));
    }
    Ok(text)
}
