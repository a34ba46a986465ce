//! Reply generation over an OpenAI-compatible `chat/completions` endpoint
//! (Hugging Face router, OpenRouter, or OpenAI itself).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gk_core::{
    config::Config,
    domain::Speaker,
    errors::{Error, GenerationError},
    ports::{GenerationRequest, ReplyGenerator},
    Result,
};

#[derive(Clone, Debug)]
pub struct ChatCompletionsClient {
    url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    http: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build error: {e}")))?;
        Ok(Self {
            url: url.into(),
            model: model.into(),
            api_key: api_key.into(),
            max_tokens: 220,
            temperature: 0.6,
            timeout,
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(
            cfg.generation_url.clone(),
            cfg.generation_model.clone(),
            cfg.generation_api_key.clone(),
            cfg.retry.attempt_timeout,
        )?
        .with_sampling(cfg.generation_max_tokens, cfg.generation_temperature))
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, PartialEq, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// System prompt first, then prior turns oldest-first, then the new text.
/// User turns carry the speaker's name so the model can tell people apart.
fn build_messages(req: &GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(req.history.len() + 2);
    messages.push(ChatMessage {
        role: "system",
        content: req.system.clone(),
    });
    for u in &req.history {
        messages.push(match &u.speaker {
            Speaker::User(author) => ChatMessage {
                role: "user",
                content: format!("{}: {}", author.display_name, u.text),
            },
            Speaker::Assistant => ChatMessage {
                role: "assistant",
                content: u.text.clone(),
            },
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: req.user_text.clone(),
    });
    messages
}

fn parse_reply(body: &str) -> std::result::Result<String, GenerationError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Malformed(format!("invalid json: {e}")))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(GenerationError::Malformed(
            "response has no message content".to_string(),
        ));
    }
    Ok(text)
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

#[async_trait]
impl ReplyGenerator for ChatCompletionsClient {
    async fn generate(&self, req: &GenerationRequest) -> std::result::Result<String, GenerationError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: build_messages(req),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        debug!(
            model = %self.model,
            turns = payload.messages.len(),
            "requesting completion"
        );

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.timeout)
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        parse_reply(&body)
    }
}
