//! Error taxonomy for the AI pipeline and the persistence layer.
//!
//! `AiError` is the single error type every provider call and every
//! orchestrated task funnels into. Handlers return it directly; the
//! `IntoResponse` impl below decides the HTTP status so route code never
//! match-es on error variants.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
  /// Required credential or setting was absent or unusable at startup.
  #[error("configuration error: {0}")]
  Config(String),

  /// The backend could not be reached at all (refused, DNS, TLS, ...).
  #[error("cannot reach the model backend: {0}")]
  Connect(String),

  /// The backend accepted the connection but did not answer in time.
  /// Renders differently from `Connect`: a dead backend and a slow one
  /// are different incidents.
  #[error("the model backend timed out before producing a response")]
  Timeout,

  /// The backend answered with a non-success HTTP status.
  #[error("model backend returned HTTP {status}: {message}")]
  Upstream { status: u16, message: String },

  /// The backend answered 2xx but the payload could not be decoded into
  /// the expected shape. `raw` keeps the offending text for diagnostics.
  #[error("model response could not be decoded: {message}")]
  Decode { message: String, raw: String },
}

impl AiError {
  fn status(&self) -> StatusCode {
    match self {
      AiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AiError::Connect(_) | AiError::Upstream { .. } | AiError::Decode { .. } => {
        StatusCode::BAD_GATEWAY
      }
      AiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
  }
}

impl IntoResponse for AiError {
  fn into_response(self) -> Response {
    let status = self.status();
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

/// Transport-level reqwest failures sort themselves into the taxonomy,
/// so client code can lean on `?` after `.send()`.
impl From<reqwest::Error> for AiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      AiError::Timeout
    } else if e.is_decode() {
      AiError::Decode { message: e.to_string(), raw: String::new() }
    } else {
      AiError::Connect(e.to_string())
    }
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("username and password are required")]
  MissingCredentials,

  #[error("username already exists")]
  UsernameTaken,

  #[error("invalid username or password")]
  BadCredentials,

  #[error("history entry not found")]
  NotFound,

  /// A stored credential did not have the `blake3$salt$hash` layout.
  #[error("stored credential is malformed")]
  BadStoredCredential,

  #[error("database lock poisoned")]
  Poisoned,

  #[error("invalid json payload: {0}")]
  Json(#[from] serde_json::Error),

  #[error("database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("database error: {0}")]
  Io(#[from] std::io::Error),
}

impl StoreError {
  fn status(&self) -> StatusCode {
    match self {
      StoreError::MissingCredentials => StatusCode::BAD_REQUEST,
      StoreError::UsernameTaken => StatusCode::CONFLICT,
      StoreError::BadCredentials => StatusCode::UNAUTHORIZED,
      StoreError::NotFound => StatusCode::NOT_FOUND,
      StoreError::BadStoredCredential
      | StoreError::Poisoned
      | StoreError::Json(_)
      | StoreError::Sqlite(_)
      | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for StoreError {
  fn into_response(self) -> Response {
    let status = self.status();
    // Auth/history consumers key off `success`, mirror that here.
    (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timeout_and_connect_render_differently() {
    let timeout = AiError::Timeout.to_string();
    let connect = AiError::Connect("connection refused".into()).to_string();
    assert_ne!(timeout, connect);
    assert!(timeout.contains("timed out"));
    assert!(connect.contains("cannot reach"));
  }

  #[test]
  fn statuses_follow_the_taxonomy() {
    assert_eq!(AiError::Config("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(AiError::Connect("x".into()).status(), StatusCode::BAD_GATEWAY);
    assert_eq!(AiError::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
      AiError::Upstream { status: 429, message: "quota".into() }.status(),
      StatusCode::BAD_GATEWAY
    );
    assert_eq!(
      AiError::Decode { message: "eof".into(), raw: "{".into() }.status(),
      StatusCode::BAD_GATEWAY
    );
  }

  #[test]
  fn decode_keeps_the_raw_payload() {
    let err = AiError::Decode { message: "trailing characters".into(), raw: "{} oops".into() };
    match err {
      AiError::Decode { raw, .. } => assert_eq!(raw, "{} oops"),
      _ => unreachable!(),
    }
  }
}
