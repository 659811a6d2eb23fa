//! Responder abstraction for text-generation backends.
//!
//! The [`Responder`] trait decouples strategies from the transport. The
//! production implementation talks to an OpenAI-compatible
//! `/v1/chat/completions` endpoint; tests use scripted responders that return
//! predetermined replies without touching the network.

use std::env;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::metrics::TokenUsage;
use crate::io::config::EndpointConfig;

const CHAT_COMPLETION_PATH: &str = "v1/chat/completions";
/// Longest error body echoed into an error message.
const ERROR_BODY_LIMIT: usize = 500;

/// One completed model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Model that produced the reply, used as the token-accounting key.
    pub model: String,
    pub usage: Option<TokenUsage>,
}

/// Abstraction over text-generation backends.
pub trait Responder {
    /// Produce a reply to `prompt`, optionally under a system prompt.
    ///
    /// Rate limiting is handled inside the implementation and never surfaces
    /// as an error unless its own retry budget runs out.
    fn respond(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Reply>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Responder backed by an OpenAI-compatible chat completion endpoint.
pub struct ChatResponder {
    client: HttpClient,
    url: String,
    endpoint: EndpointConfig,
    api_key: Option<String>,
}

impl ChatResponder {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        let api_key = match &endpoint.api_key_env {
            Some(var) => Some(
                env::var(var).with_context(|| format!("read api key from ${var}"))?,
            ),
            None => None,
        };
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            url: format!("{}/{}", endpoint.resolved_base_url(), CHAT_COMPLETION_PATH),
            endpoint: endpoint.clone(),
            api_key,
        })
    }

    fn request_body(&self, prompt: &str, system_prompt: Option<&str>) -> ChatRequest<'_> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });
        ChatRequest {
            model: &self.endpoint.model,
            messages,
            stream: false,
            temperature: self.endpoint.temperature,
        }
    }
}

impl Responder for ChatResponder {
    #[instrument(skip_all, fields(model = %self.endpoint.model, prompt_bytes = prompt.len()))]
    fn respond(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Reply> {
        let body = self.request_body(prompt, system_prompt);
        let retries = self.endpoint.rate_limit_retries;

        for attempt in 0..=retries {
            let mut request = self
                .client
                .post(&self.url)
                .header(CONTENT_TYPE, "application/json")
                .json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }
            let response = request
                .send()
                .with_context(|| format!("post {}", self.url))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt == retries {
                    break;
                }
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let delay = rate_limit_delay(
                    retry_after.as_deref(),
                    attempt,
                    self.endpoint.rate_limit_backoff_ms,
                );
                warn!(
                    attempt = attempt + 1,
                    retries,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, retrying"
                );
                thread::sleep(delay);
                continue;
            }
            if !status.is_success() {
                let text = response.text().unwrap_or_default();
                warn!(status = status.as_u16(), "chat completion failed");
                bail!(
                    "chat completion failed with status {}: {}",
                    status,
                    truncate(&text, ERROR_BODY_LIMIT)
                );
            }

            let parsed: ChatCompletionResponse =
                response.json().context("parse chat completion response")?;
            let reply = reply_from_response(parsed, &self.endpoint.model)?;
            debug!(
                reply_bytes = reply.content.len(),
                usage = ?reply.usage,
                "chat completion received"
            );
            return Ok(reply);
        }

        info!(retries, "rate limit retries exhausted");
        Err(anyhow!(
            "chat completion still rate limited after {retries} retries"
        ))
    }
}

fn reply_from_response(parsed: ChatCompletionResponse, fallback_model: &str) -> Result<Reply> {
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("chat completion returned no choices"))?;
    Ok(Reply {
        content: choice.message.content,
        model: parsed.model.unwrap_or_else(|| fallback_model.to_string()),
        usage: parsed.usage,
    })
}

/// Delay before retrying a rate-limited call.
///
/// Honors a numeric `Retry-After` (seconds) that fits a `Duration`; otherwise
/// backs off linearly.
pub fn rate_limit_delay(retry_after: Option<&str>, attempt: u32, backoff_ms: u64) -> Duration {
    if let Some(delay) = retry_after
        .and_then(|value| value.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    {
        return delay;
    }
    Duration::from_millis(backoff_ms.saturating_mul(u64::from(attempt) + 1))
}

pub(crate) fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}[truncated {} bytes]", &text[..end], text.len() - end)
}
