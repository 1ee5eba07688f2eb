//! Application state: the chosen LLM backend, the SQLite store, and the
//! in-memory session table.
//!
//! Sessions are bearer tokens handed out at login and kept only in memory; a
//! restart logs everyone out, which is acceptable for a single-node deploy.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::provider::LlmBackend;
use crate::store::{Store, UserRecord};

/// The authenticated identity a session token resolves to.
#[derive(Clone, Debug)]
pub struct SessionUser {
  pub user_id: i64,
  pub username: String,
}

pub struct AppState {
  pub ai: Arc<dyn LlmBackend>,
  pub store: Store,
  sessions: RwLock<HashMap<String, SessionUser>>,
}

impl AppState {
  pub fn new(ai: Arc<dyn LlmBackend>, store: Store) -> Self {
    info!(target: "algocoach_backend", backend = ai.name(), "Application state ready");
    Self { ai, store, sessions: RwLock::new(HashMap::new()) }
  }

  /// Mint a fresh session token for a verified user.
  #[instrument(level = "debug", skip(self, user), fields(user_id = user.id))]
  pub async fn open_session(&self, user: &UserRecord) -> String {
    let token = Uuid::new_v4().to_string();
    let session = SessionUser { user_id: user.id, username: user.username.clone() };
    self.sessions.write().await.insert(token.clone(), session);
    token
  }

  /// Resolve a bearer token to its user, if the session is live.
  pub async fn session_user(&self, token: &str) -> Option<SessionUser> {
    self.sessions.read().await.get(token).cloned()
  }

  /// Drop a session. Returns whether the token was actually live.
  #[instrument(level = "debug", skip_all)]
  pub async fn close_session(&self, token: &str) -> bool {
    self.sessions.write().await.remove(token).is_some()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ChatMessage;
  use crate::error::AiError;
  use crate::provider::{JsonShape, ModelRole};
  use async_trait::async_trait;

  struct NullBackend;

  #[async_trait]
  impl LlmBackend for NullBackend {
    fn name(&self) -> &'static str {
      "null"
    }
    async fn generate_text(
      &self,
      _role: ModelRole,
      _prompt: &str,
      _system: Option<&str>,
    ) -> Result<String, AiError> {
      Ok(String::new())
    }
    async fn generate_json(
      &self,
      _role: ModelRole,
      _prompt: &str,
      _system: Option<&str>,
      _shape: &JsonShape,
    ) -> Result<serde_json::Value, AiError> {
      Ok(serde_json::Value::Null)
    }
    async fn chat(
      &self,
      _role: ModelRole,
      _system: &str,
      _history: &[ChatMessage],
      _message: &str,
    ) -> Result<String, AiError> {
      Ok(String::new())
    }
  }

  #[tokio::test]
  async fn sessions_open_resolve_and_close() {
    let state = AppState::new(Arc::new(NullBackend), Store::open_in_memory().unwrap());
    let user = state.store.register_user("an", "x").unwrap();

    let token = state.open_session(&user).await;
    let resolved = state.session_user(&token).await.unwrap();
    assert_eq!(resolved.user_id, user.id);
    assert_eq!(resolved.username, "an");

    assert!(state.close_session(&token).await);
    assert!(state.session_user(&token).await.is_none());
    // Closing twice is a no-op.
    assert!(!state.close_session(&token).await);
  }

  #[tokio::test]
  async fn tokens_are_unique_per_login() {
    let state = AppState::new(Arc::new(NullBackend), Store::open_in_memory().unwrap());
    let user = state.store.register_user("an", "x").unwrap();
    let a = state.open_session(&user).await;
    let b = state.open_session(&user).await;
    assert_ne!(a, b);
    // Both sessions stay live until closed.
    assert!(state.session_user(&a).await.is_some());
    assert!(state.session_user(&b).await.is_some());
  }
}
