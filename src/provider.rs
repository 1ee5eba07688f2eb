//! The seam between AI tasks and concrete LLM backends.
//!
//! The orchestrator talks to `dyn LlmBackend` only. Which implementation sits
//! behind it is decided once at startup by [`backend_from_config`]; nothing
//! downstream ever branches on backend identity.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{AiConfig, BackendKind};
use crate::domain::ChatMessage;
use crate::error::AiError;
use crate::gemini::GeminiClient;
use crate::ollama::OllamaClient;

/// Abstract capability tier. Each client maps a role to a concrete model id
/// from its injected config, so tasks can ask for "the careful one" without
/// knowing model names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelRole {
  /// Low-latency model for generation, hints, and chat.
  Fast,
  /// Slower reasoning model for code review and reference solutions.
  Thinking,
}

/// How a structured response should be requested.
///
/// Backends with native structured output attach `schema` to the request;
/// backends without it splice `example` into the prompt and fence-strip the
/// reply. Both routes must yield the same JSON shape.
pub struct JsonShape {
  pub schema: Value,
  pub example: &'static str,
}

/// One LLM backend (hosted or local). Implementations own their HTTP client,
/// credentials, and model-id mapping.
#[async_trait]
pub trait LlmBackend: Send + Sync {
  /// Short stable name for logs ("gemini", "ollama").
  fn name(&self) -> &'static str;

  /// Single-shot free-text completion.
  async fn generate_text(
    &self,
    role: ModelRole,
    prompt: &str,
    system: Option<&str>,
  ) -> Result<String, AiError>;

  /// Single-shot completion that must come back as JSON matching `shape`.
  /// Implementations return the decoded value, never raw text.
  async fn generate_json(
    &self,
    role: ModelRole,
    prompt: &str,
    system: Option<&str>,
    shape: &JsonShape,
  ) -> Result<Value, AiError>;

  /// Multi-turn chat. `history` is the full prior conversation in order;
  /// `message` is the new user turn. Backends rebuild provider-native
  /// history from scratch on every call, so the server stays stateless.
  async fn chat(
    &self,
    role: ModelRole,
    system: &str,
    history: &[ChatMessage],
    message: &str,
  ) -> Result<String, AiError>;
}

/// Construct the one backend this process will use. Missing credentials for
/// the SELECTED backend surface here, at startup, not on first request.
pub fn backend_from_config(cfg: &AiConfig) -> Result<Arc<dyn LlmBackend>, AiError> {
  match cfg.backend {
    BackendKind::Gemini => Ok(Arc::new(GeminiClient::new(&cfg.gemini)?)),
    BackendKind::Ollama => Ok(Arc::new(OllamaClient::new(&cfg.ollama)?)),
  }
}
