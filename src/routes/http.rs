//! HTTP endpoint handlers. These are thin wrappers that forward to tasks and
//! the store; status codes for failures come from the error types' own
//! `IntoResponse` impls.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::{info, instrument};

use crate::domain::{AnalysisResult, Problem, Solution};
use crate::error::{AiError, StoreError};
use crate::protocol::*;
use crate::state::{AppState, SessionUser};
use crate::tasks;

/// Pull the token out of `Authorization: Bearer <token>`. Any other scheme
/// is treated as absent.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(AUTHORIZATION)
    .and_then(|h| h.to_str().ok())
    .and_then(|h| h.strip_prefix("Bearer "))
    .filter(|t| !t.is_empty())
}

/// Extractor for endpoints that require a live session.
pub struct AuthUser(pub SessionUser);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
  type Rejection = (StatusCode, Json<serde_json::Value>);

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<AppState>,
  ) -> Result<Self, Self::Rejection> {
    let denied = || {
      (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "error": "authentication required" })),
      )
    };
    let token = bearer_token(&parts.headers).ok_or_else(denied)?;
    let user = state.session_user(token).await.ok_or_else(denied)?;
    Ok(AuthUser(user))
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, backend: state.ai.name() })
}

//
// AI endpoints
//

#[instrument(level = "info", skip(state, body), fields(%body.topic, %body.difficulty, has_custom = body.custom_request.is_some()))]
pub async fn http_generate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateIn>,
) -> Result<Json<Problem>, AiError> {
  let problem = tasks::generate_problem(
    state.ai.as_ref(),
    &body.topic,
    &body.difficulty,
    body.custom_request.as_deref(),
  )
  .await?;
  info!(target: "coach", title = %problem.title, "HTTP problem served");
  Ok(Json(problem))
}

#[instrument(level = "info", skip(state, body), fields(problem = %body.problem.title, code_len = body.user_code.len(), %body.language))]
pub async fn http_analyze(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnalyzeIn>,
) -> Result<Json<AnalysisResult>, AiError> {
  let analysis =
    tasks::analyze_solution(state.ai.as_ref(), &body.problem, &body.user_code, &body.language)
      .await?;
  info!(target: "coach", verdict = ?analysis.verdict, "HTTP analysis served");
  Ok(Json(analysis))
}

#[instrument(level = "info", skip(state, body), fields(problem = %body.problem.title))]
pub async fn http_hint(
  State(state): State<Arc<AppState>>,
  Json(body): Json<HintIn>,
) -> Result<Json<HintOut>, AiError> {
  let hint =
    tasks::request_hint(state.ai.as_ref(), &body.problem, &body.user_code, &body.current_feedback)
      .await?;
  info!(target: "coach", "HTTP hint served");
  Ok(Json(HintOut { hint }))
}

#[instrument(level = "info", skip(state, body), fields(problem = %body.problem.title, %body.language))]
pub async fn http_solution(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SolutionIn>,
) -> Result<Json<Solution>, AiError> {
  let solution = tasks::generate_solution(state.ai.as_ref(), &body.problem, &body.language).await?;
  info!(target: "coach", "HTTP solution served");
  Ok(Json(solution))
}

#[instrument(level = "info", skip(state, body), fields(turns = body.history.len(), has_context = body.current_context.is_some()))]
pub async fn http_chat(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ChatIn>,
) -> Result<Json<ChatOut>, AiError> {
  let text = tasks::chat_with_tutor(
    state.ai.as_ref(),
    &body.history,
    &body.new_message,
    body.current_context.as_deref(),
  )
  .await?;
  Ok(Json(ChatOut { text }))
}

//
// Auth endpoints
//

#[instrument(level = "info", skip(state, body), fields(%body.username))]
pub async fn http_register(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CredentialsIn>,
) -> Result<Json<AuthOut>, StoreError> {
  let user = state.store.register_user(body.username.trim(), &body.password)?;
  let token = state.open_session(&user).await;
  Ok(Json(AuthOut { success: true, user_id: user.id, username: user.username, token }))
}

#[instrument(level = "info", skip(state, body), fields(%body.username))]
pub async fn http_login(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CredentialsIn>,
) -> Result<Json<AuthOut>, StoreError> {
  let user = state.store.verify_user(body.username.trim(), &body.password)?;
  let token = state.open_session(&user).await;
  info!(target: "algocoach_backend", user_id = user.id, "Login ok");
  Ok(Json(AuthOut { success: true, user_id: user.id, username: user.username, token }))
}

/// Logout is idempotent: an already-dead token still yields success.
#[instrument(level = "info", skip(state, headers))]
pub async fn http_logout(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Json<OkOut> {
  if let Some(token) = bearer_token(&headers) {
    state.close_session(token).await;
  }
  Json(OkOut { success: true })
}

/// Introspection for the frontend's session restore. Never errors; an absent
/// or stale token simply reports `authenticated: false`.
#[instrument(level = "debug", skip(state, headers))]
pub async fn http_auth_me(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Json<MeOut> {
  let user = match bearer_token(&headers) {
    Some(token) => state.session_user(token).await,
    None => None,
  };
  Json(match user {
    Some(u) => {
      MeOut { authenticated: true, user_id: Some(u.user_id), username: Some(u.username) }
    }
    None => MeOut { authenticated: false, user_id: None, username: None },
  })
}

//
// History endpoints (session required)
//

#[instrument(level = "info", skip(state, user), fields(user_id = user.0.user_id))]
pub async fn http_history_list(
  State(state): State<Arc<AppState>>,
  user: AuthUser,
) -> Result<Json<HistoryOut>, StoreError> {
  let history = state.store.load_history(user.0.user_id)?;
  Ok(Json(HistoryOut { success: true, history }))
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = user.0.user_id))]
pub async fn http_history_save(
  State(state): State<Arc<AppState>>,
  user: AuthUser,
  Json(body): Json<HistorySaveIn>,
) -> Result<Json<SavedOut>, StoreError> {
  let id = state.store.save_history(
    user.0.user_id,
    &body.problem,
    &body.user_code,
    &body.verdict,
    &body.language,
  )?;
  info!(target: "algocoach_backend", user_id = user.0.user_id, history_id = id, "Attempt saved");
  Ok(Json(SavedOut { success: true, id }))
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = user.0.user_id, history_id = id))]
pub async fn http_history_update(
  State(state): State<Arc<AppState>>,
  user: AuthUser,
  Path(id): Path<i64>,
  Json(body): Json<HistoryUpdateIn>,
) -> Result<Json<OkOut>, StoreError> {
  state.store.update_history(user.0.user_id, id, &body.user_code, &body.verdict)?;
  Ok(Json(OkOut { success: true }))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value.parse().unwrap());
    headers
  }

  #[test]
  fn bearer_token_requires_the_bearer_scheme() {
    assert_eq!(bearer_token(&headers_with("Bearer abc123")), Some("abc123"));
    // Other schemes (or no scheme at all) must not authenticate.
    assert_eq!(bearer_token(&headers_with("Basic abc123")), None);
    assert_eq!(bearer_token(&headers_with("abc123")), None);
    assert_eq!(bearer_token(&headers_with("Bearer ")), None);
    assert_eq!(bearer_token(&HeaderMap::new()), None);
  }
}
