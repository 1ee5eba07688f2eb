//! Local Ollama-style client speaking `/api/generate` and `/api/chat`.
//!
//! Local models have no structured-output mode, so JSON answers are coaxed by
//! appending an example payload to the prompt and cleaned up afterwards by the
//! tolerant decoder in `extract`. Local inference is slow on modest hardware,
//! hence the generous fixed request timeout.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use async_trait::async_trait;

use crate::config::OllamaConfig;
use crate::domain::{ChatMessage, ChatRole};
use crate::error::AiError;
use crate::extract;
use crate::provider::{JsonShape, LlmBackend, ModelRole};
use crate::util::trunc_for_log;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const GENERATE_TEMPERATURE: f32 = 0.7;

pub struct OllamaClient {
  client: reqwest::Client,
  base_url: String,
  fast_model: String,
  thinking_model: String,
}

impl OllamaClient {
  /// Build the client from injected config. No credentials needed; the only
  /// way this fails is a broken TLS/HTTP stack.
  pub fn new(cfg: &OllamaConfig) -> Result<Self, AiError> {
    let client = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| AiError::Config(format!("cannot build HTTP client: {e}")))?;
    Ok(Self {
      client,
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      fast_model: cfg.fast_model.clone(),
      thinking_model: cfg.thinking_model.clone(),
    })
  }

  fn model_for(&self, role: ModelRole) -> &str {
    match role {
      ModelRole::Fast => &self.fast_model,
      ModelRole::Thinking => &self.thinking_model,
    }
  }

  /// One non-streaming `/api/generate` round-trip.
  #[instrument(level = "info", skip(self, prompt, system), fields(model = %model, prompt_len = prompt.len()))]
  async fn generate(&self, model: &str, prompt: &str, system: Option<&str>) -> Result<String, AiError> {
    let url = format!("{}/api/generate", self.base_url);
    let req = GenerateRequest {
      model: model.to_string(),
      prompt: prompt.to_string(),
      stream: false,
      options: Options { temperature: GENERATE_TEMPERATURE },
      system: system.map(str::to_string),
    };
    let start = std::time::Instant::now();

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "algocoach-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_ollama_error(&body).unwrap_or(body);
      return Err(AiError::Upstream { status: status.as_u16(), message });
    }

    let raw = res.text().await?;
    let body: GenerateResponse = serde_json::from_str(&raw).map_err(|e| {
      error!(raw = %trunc_for_log(&raw, 400), "Unparseable /api/generate envelope");
      AiError::Decode { message: format!("bad /api/generate envelope: {e}"), raw }
    })?;

    let text = body.response.trim().to_string();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Ollama response received");
    Ok(text)
  }
}

#[async_trait]
impl LlmBackend for OllamaClient {
  fn name(&self) -> &'static str {
    "ollama"
  }

  async fn generate_text(
    &self,
    role: ModelRole,
    prompt: &str,
    system: Option<&str>,
  ) -> Result<String, AiError> {
    self.generate(self.model_for(role), prompt, system).await
  }

  async fn generate_json(
    &self,
    role: ModelRole,
    prompt: &str,
    system: Option<&str>,
    shape: &JsonShape,
  ) -> Result<Value, AiError> {
    let prompt = json_prompt(prompt, shape);
    let text = self.generate(self.model_for(role), &prompt, system).await?;
    // Local models love to wrap JSON in fences anyway; decode tolerantly.
    extract::decode_json(&text)
  }

  #[instrument(level = "info", skip(self, system, history, message), fields(model = %self.model_for(role), turns = history.len()))]
  async fn chat(
    &self,
    role: ModelRole,
    system: &str,
    history: &[ChatMessage],
    message: &str,
  ) -> Result<String, AiError> {
    let url = format!("{}/api/chat", self.base_url);
    let req = ChatRequest {
      model: self.model_for(role).to_string(),
      messages: wire_messages(system, history, message),
      stream: false,
    };
    let start = std::time::Instant::now();

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "algocoach-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_ollama_error(&body).unwrap_or(body);
      return Err(AiError::Upstream { status: status.as_u16(), message });
    }

    let raw = res.text().await?;
    let body: ChatResponse = serde_json::from_str(&raw).map_err(|e| {
      error!(raw = %trunc_for_log(&raw, 400), "Unparseable /api/chat envelope");
      AiError::Decode { message: format!("bad /api/chat envelope: {e}"), raw }
    })?;

    let text = body.message.content.trim().to_string();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Ollama chat response received");
    Ok(text)
  }
}

/// Splice the JSON contract into the prompt: an example payload plus a
/// bare-JSON-only instruction, mirroring what the hosted schema enforces.
fn json_prompt(prompt: &str, shape: &JsonShape) -> String {
  format!(
    "{prompt}\n\nTrả về DUY NHẤT một JSON object hợp lệ theo đúng cấu trúc ví dụ sau, \
không kèm markdown hay văn bản nào khác:\n{example}",
    example = shape.example
  )
}

/// System turn first, then the prior conversation, then the new user turn.
fn wire_messages(system: &str, history: &[ChatMessage], message: &str) -> Vec<WireMessage> {
  let mut messages = Vec::with_capacity(history.len() + 2);
  messages.push(WireMessage { role: "system", content: system.to_string() });
  for m in history {
    messages.push(WireMessage {
      role: match m.role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
      },
      content: m.text.clone(),
    });
  }
  messages.push(WireMessage { role: "user", content: message.to_string() });
  messages
}

// --- Wire DTOs ---

#[derive(Serialize)]
struct GenerateRequest {
  model: String,
  prompt: String,
  stream: bool,
  options: Options,
  #[serde(skip_serializing_if = "Option::is_none")]
  system: Option<String>,
}
#[derive(Serialize)]
struct Options {
  temperature: f32,
}
#[derive(Deserialize)]
struct GenerateResponse {
  response: String,
}

#[derive(Serialize)]
struct ChatRequest {
  model: String,
  messages: Vec<WireMessage>,
  stream: bool,
}
#[derive(Serialize)]
struct WireMessage {
  role: &'static str,
  content: String,
}
#[derive(Deserialize)]
struct ChatResponse {
  message: ChatResponseMessage,
}
#[derive(Deserialize)]
struct ChatResponseMessage {
  #[serde(default)]
  content: String,
}

/// Ollama error bodies are `{"error": "..."}`.
fn extract_ollama_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error)
}
