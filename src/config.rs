//! Process configuration, read from the environment exactly once at startup.
//!
//! Everything a provider client needs (base URL, credentials, model names) is
//! resolved here and injected at construction time, so request paths never
//! consult the environment.

use std::path::PathBuf;

use tracing::info;

use crate::error::AiError;

/// Which LLM backend the process talks to. Chosen once; never re-examined
/// after startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
  Gemini,
  Ollama,
}

/// Settings for the hosted Gemini-style backend.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
  /// Absent key is only an error if this backend is actually selected.
  pub api_key: Option<String>,
  pub base_url: String,
  pub fast_model: String,
  pub thinking_model: String,
}

/// Settings for the local Ollama-style backend.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
  pub base_url: String,
  pub fast_model: String,
  pub thinking_model: String,
}

#[derive(Clone, Debug)]
pub struct AiConfig {
  pub backend: BackendKind,
  pub gemini: GeminiConfig,
  pub ollama: OllamaConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub ai: AiConfig,
  pub database_path: PathBuf,
}

fn env_or(name: &str, default: &str) -> String {
  std::env::var(name).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

/// Read `AppConfig` from the environment. Fails only on values we cannot
/// interpret (an unknown `AI_BACKEND`); a missing API key is deferred to
/// client construction because it only matters for the selected backend.
pub fn load_from_env() -> Result<AppConfig, AiError> {
  let backend = match env_or("AI_BACKEND", "gemini").trim().to_lowercase().as_str() {
    "gemini" => BackendKind::Gemini,
    "ollama" => BackendKind::Ollama,
    other => {
      return Err(AiError::Config(format!(
        "AI_BACKEND must be \"gemini\" or \"ollama\", got {other:?}"
      )))
    }
  };

  let gemini = GeminiConfig {
    // GEMINI_API_KEY preferred; API_KEY kept for older deployments.
    api_key: std::env::var("GEMINI_API_KEY")
      .or_else(|_| std::env::var("API_KEY"))
      .ok()
      .filter(|v| !v.trim().is_empty()),
    base_url: env_or("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com/v1beta"),
    fast_model: env_or("GEMINI_FAST_MODEL", "gemini-2.0-flash"),
    thinking_model: env_or("GEMINI_THINKING_MODEL", "gemini-2.0-flash-thinking-exp-01-21"),
  };

  let ollama = OllamaConfig {
    base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434"),
    fast_model: env_or("OLLAMA_FAST_MODEL", "llama3.1:8b"),
    thinking_model: env_or("OLLAMA_THINKING_MODEL", "deepseek-r1:8b"),
  };

  let database_path = PathBuf::from(env_or("DATABASE_PATH", "./data/coach.db"));

  info!(
    target: "algocoach_backend",
    backend = ?backend,
    db = %database_path.display(),
    "Configuration loaded"
  );

  Ok(AppConfig { ai: AiConfig { backend, gemini, ollama }, database_path })
}
