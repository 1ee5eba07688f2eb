//! Hosted Gemini-style client speaking the `generateContent` REST API.
//!
//! Structured answers use the API's native JSON mode (`responseMimeType` +
//! `responseSchema`), so this client decodes strictly and never prompt-hacks.
//! Calls are instrumented and log model names, latencies, and sizes; payload
//! text only appears, truncated, when decoding fails.
//!
//! NOTE: the API key travels in a header, never in the URL, and is never
//! logged.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use async_trait::async_trait;

use crate::config::GeminiConfig;
use crate::domain::{ChatMessage, ChatRole};
use crate::error::AiError;
use crate::provider::{JsonShape, LlmBackend, ModelRole};
use crate::util::trunc_for_log;

// Thinking models legitimately take minutes, but a stalled connection must
// not hold a request handler forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct GeminiClient {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  fast_model: String,
  thinking_model: String,
}

impl GeminiClient {
  /// Build the client from injected config. The only hard requirement is the
  /// API key; everything else has defaults. No network I/O happens here.
  pub fn new(cfg: &GeminiConfig) -> Result<Self, AiError> {
    let api_key = cfg
      .api_key
      .clone()
      .ok_or_else(|| AiError::Config("GEMINI_API_KEY not found in environment".into()))?;
    let client = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| AiError::Config(format!("cannot build HTTP client: {e}")))?;
    Ok(Self {
      client,
      api_key,
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

  /// One `generateContent` round-trip, returning the concatenated candidate
  /// text. All three trait methods funnel through here.
  #[instrument(level = "info", skip(self, req), fields(model = %model))]
  async fn generate_content(&self, model: &str, req: &GenerateContentRequest) -> Result<String, AiError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, model);
    let start = std::time::Instant::now();

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "algocoach-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_gemini_error(&body).unwrap_or(body);
      return Err(AiError::Upstream { status: status.as_u16(), message });
    }

    let raw = res.text().await?;
    let body: GenerateContentResponse = serde_json::from_str(&raw).map_err(|e| {
      error!(raw = %trunc_for_log(&raw, 400), "Unparseable generateContent envelope");
      AiError::Decode { message: format!("bad generateContent envelope: {e}"), raw }
    })?;

    if let Some(usage) = &body.usage_metadata {
      info!(
        prompt_tokens = ?usage.prompt_token_count,
        candidate_tokens = ?usage.candidates_token_count,
        total_tokens = ?usage.total_token_count,
        "Gemini usage"
      );
    }

    let text = body
      .candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect::<String>())
      .unwrap_or_default()
      .trim()
      .to_string();

    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Gemini response received");
    Ok(text)
  }
}

#[async_trait]
impl LlmBackend for GeminiClient {
  fn name(&self) -> &'static str {
    "gemini"
  }

  async fn generate_text(
    &self,
    role: ModelRole,
    prompt: &str,
    system: Option<&str>,
  ) -> Result<String, AiError> {
    let req = GenerateContentRequest {
      contents: vec![Content::user(prompt)],
      system_instruction: system.map(SystemInstruction::from_text),
      generation_config: None,
    };
    self.generate_content(self.model_for(role), &req).await
  }

  async fn generate_json(
    &self,
    role: ModelRole,
    prompt: &str,
    system: Option<&str>,
    shape: &JsonShape,
  ) -> Result<Value, AiError> {
    let req = GenerateContentRequest {
      contents: vec![Content::user(prompt)],
      system_instruction: system.map(SystemInstruction::from_text),
      generation_config: Some(GenerationConfig {
        response_mime_type: Some("application/json".into()),
        response_schema: Some(shape.schema.clone()),
      }),
    };
    let text = self.generate_content(self.model_for(role), &req).await?;
    // JSON mode promises clean JSON text. Anything else is a decode error;
    // keep the raw text so operators can see what actually came back.
    serde_json::from_str::<Value>(&text).map_err(|e| {
      error!(raw = %trunc_for_log(&text, 400), "JSON mode returned non-JSON text");
      AiError::Decode { message: e.to_string(), raw: text }
    })
  }

  async fn chat(
    &self,
    role: ModelRole,
    system: &str,
    history: &[ChatMessage],
    message: &str,
  ) -> Result<String, AiError> {
    let req = GenerateContentRequest {
      contents: contents_from_history(history, message),
      system_instruction: Some(SystemInstruction::from_text(system)),
      generation_config: None,
    };
    self.generate_content(self.model_for(role), &req).await
  }
}

/// The API is stateless: every call ships the entire conversation as
/// alternating `user`/`model` turns, with the new message appended last.
fn contents_from_history(history: &[ChatMessage], message: &str) -> Vec<Content> {
  let mut contents: Vec<Content> = history
    .iter()
    .map(|m| Content {
      role: match m.role {
        ChatRole::User => "user".into(),
        ChatRole::Assistant => "model".into(),
      },
      parts: vec![Part { text: m.text.clone() }],
    })
    .collect();
  contents.push(Content::user(message));
  contents
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<SystemInstruction>,
  #[serde(skip_serializing_if = "Option::is_none")]
  generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
  role: String,
  parts: Vec<Part>,
}
impl Content {
  fn user(text: &str) -> Self {
    Content { role: "user".into(), parts: vec![Part { text: text.into() }] }
  }
}

#[derive(Serialize, Deserialize)]
struct Part {
  #[serde(default)]
  text: String,
}

#[derive(Serialize)]
struct SystemInstruction {
  parts: Vec<Part>,
}
impl SystemInstruction {
  fn from_text(text: &str) -> Self {
    SystemInstruction { parts: vec![Part { text: text.into() }] }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  response_mime_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_schema: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate {
  // Safety-blocked candidates come back without content.
  content: Option<CandidateContent>,
}
#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<Part>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)]
  prompt_token_count: Option<u32>,
  #[serde(default)]
  candidates_token_count: Option<u32>,
  #[serde(default)]
  total_token_count: Option<u32>,
}

/// Try to extract a clean message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn history_maps_roles_and_appends_new_message() {
    let history = vec![
      ChatMessage { role: ChatRole::User, text: "DFS là gì?".into() },
      ChatMessage { role: ChatRole::Assistant, text: "Duyệt theo chiều sâu.".into() },
    ];
    let contents = contents_from_history(&history, "Cho ví dụ?");
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0].role, "user");
    assert_eq!(contents[1].role, "model");
    assert_eq!(contents[2].role, "user");
    assert_eq!(contents[2].parts[0].text, "Cho ví dụ?");
  }

  #[test]
  fn request_serializes_camel_case_and_drops_absent_fields() {
    let req = GenerateContentRequest {
      contents: vec![Content::user("hi")],
      system_instruction: None,
      generation_config: Some(GenerationConfig {
        response_mime_type: Some("application/json".into()),
        response_schema: None,
      }),
    };
    let v = serde_json::to_value(&req).unwrap();
    assert!(v.get("systemInstruction").is_none());
    assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
    assert!(v["generationConfig"].get("responseSchema").is_none());
  }

  #[test]
  fn upstream_error_body_is_unwrapped() {
    let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
    assert_eq!(extract_gemini_error(body).as_deref(), Some("Resource has been exhausted"));
    assert_eq!(extract_gemini_error("not json"), None);
  }

  #[test]
  fn request_timeout_accommodates_thinking_models_yet_stays_bounded() {
    // Must outlast the local backend's 120 s ceiling without being infinite.
    assert!(REQUEST_TIMEOUT >= Duration::from_secs(120));
    assert!(REQUEST_TIMEOUT <= Duration::from_secs(600));
  }
}
