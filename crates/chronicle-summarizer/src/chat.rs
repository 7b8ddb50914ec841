use crate::prompt::{clean_summary, compression_prompt, render_turns};
use async_trait::async_trait;
use chronicle_config::SummarizerConfig;
use chronicle_memory::{Summarizer, SummarizerError, Turn};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Writes summaries through `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct ChatCompletionSummarizer {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionSummarizer {
    /// Build a summarizer with an explicit API key.
    pub fn new(
        config: &SummarizerConfig,
        api_key: Option<String>,
    ) -> Result<Self, SummarizerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| SummarizerError::Provider(format!("http client: {err}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Build a summarizer reading its key from `config.api_key_env`.
    pub fn from_config(config: &SummarizerConfig) -> Result<Self, SummarizerError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!(
                "summarizer api key not set (env={}, model={})",
                config.api_key_env, config.model
            );
        }
        Self::new(config, api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Summarizer for ChatCompletionSummarizer {
    async fn summarize(
        &self,
        turns: &[Turn],
        target_sentences: usize,
    ) -> Result<String, SummarizerError> {
        let system = compression_prompt(target_sentences);
        let transcript = render_turns(turns);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &transcript,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: ["\n"],
        };
        debug!(
            "requesting summary (model={}, turns={}, sentences={})",
            self.model,
            turns.len(),
            target_sentences
        );

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| SummarizerError::Provider(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                SummarizerError::RateLimited(text)
            } else {
                SummarizerError::Provider(format!("status {status}: {text}"))
            });
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|err| SummarizerError::Provider(format!("invalid response: {err}")))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SummarizerError::Provider("no content in response".to_string()))?;

        let summary = clean_summary(&content);
        if summary.is_empty() {
            return Err(SummarizerError::Provider("empty summary".to_string()));
        }
        Ok(summary)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stop: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}
