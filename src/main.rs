//! AlgoCoach · Competitive Programming Practice Backend
//!
//! - Axum HTTP API: AI problem generation, code review, hints, solutions, chat
//! - One LLM backend per process (hosted Gemini-style or local Ollama-style)
//! - SQLite accounts + attempt history
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   AI_BACKEND            : "gemini" (default) or "ollama"
//!   GEMINI_API_KEY        : required when AI_BACKEND=gemini (API_KEY also accepted)
//!   GEMINI_BASE_URL       : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_FAST_MODEL     : default "gemini-2.0-flash"
//!   GEMINI_THINKING_MODEL : default "gemini-2.0-flash-thinking-exp-01-21"
//!   OLLAMA_BASE_URL       : default "http://localhost:11434"
//!   OLLAMA_FAST_MODEL     : default "llama3.1:8b"
//!   OLLAMA_THINKING_MODEL : default "deepseek-r1:8b"
//!   DATABASE_PATH         : default "./data/coach.db"
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod error;
mod prompts;
mod provider;
mod gemini;
mod ollama;
mod extract;
mod tasks;
mod store;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;
use crate::store::Store;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Read configuration once; request paths never touch the environment.
  let cfg = config::load_from_env()?;

  // Pick the one LLM backend this process talks to. Misconfiguration
  // (missing key, unknown backend) aborts startup here.
  let ai = provider::backend_from_config(&cfg.ai)?;

  let store = Store::open(&cfg.database_path)?;

  let state = Arc::new(AppState::new(ai, store));

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "algocoach_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
