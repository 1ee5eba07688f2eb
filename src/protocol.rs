//! Public request/response structs for the HTTP API (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ChatMessage, Problem};
use crate::store::HistoryEntry;

//
// AI endpoints
//

#[derive(Debug, Deserialize)]
pub struct GenerateIn {
    pub topic: String,
    pub difficulty: String,
    #[serde(rename = "customRequest", default)]
    pub custom_request: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeIn {
    pub problem: Problem,
    #[serde(rename = "userCode")]
    pub user_code: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct HintIn {
    pub problem: Problem,
    #[serde(rename = "userCode")]
    pub user_code: String,
    #[serde(rename = "currentFeedback", default)]
    pub current_feedback: String,
}
#[derive(Serialize)]
pub struct HintOut {
    pub hint: String,
}

#[derive(Debug, Deserialize)]
pub struct SolutionIn {
    pub problem: Problem,
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatIn {
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(rename = "newMessage")]
    pub new_message: String,
    #[serde(rename = "currentContext", default)]
    pub current_context: Option<String>,
}
#[derive(Serialize)]
pub struct ChatOut {
    pub text: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub backend: &'static str,
}

//
// Auth endpoints
//

#[derive(Debug, Deserialize)]
pub struct CredentialsIn {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthOut {
    pub success: bool,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub username: String,
    /// Bearer token for the `Authorization` header.
    pub token: String,
}

#[derive(Serialize)]
pub struct MeOut {
    pub authenticated: bool,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Serialize)]
pub struct OkOut {
    pub success: bool,
}

//
// History endpoints
//

#[derive(Debug, Deserialize)]
pub struct HistorySaveIn {
    /// Stored opaquely; older clients may send shapes we no longer produce.
    pub problem: Value,
    #[serde(rename = "userCode", default)]
    pub user_code: String,
    #[serde(default)]
    pub verdict: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "cpp".to_string()
}

#[derive(Serialize)]
pub struct SavedOut {
    pub success: bool,
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryUpdateIn {
    #[serde(rename = "userCode")]
    pub user_code: String,
    pub verdict: String,
}

#[derive(Serialize)]
pub struct HistoryOut {
    pub success: bool,
    pub history: Vec<HistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_in_accepts_missing_custom_request() {
        let body: GenerateIn =
            serde_json::from_str(r#"{"topic":"Đồ thị","difficulty":"Khó"}"#).unwrap();
        assert_eq!(body.custom_request, None);
        let body: GenerateIn = serde_json::from_str(
            r#"{"topic":"Đồ thị","difficulty":"Khó","customRequest":"dãy ngoặc"}"#,
        )
        .unwrap();
        assert_eq!(body.custom_request.as_deref(), Some("dãy ngoặc"));
    }

    #[test]
    fn history_save_defaults_match_older_clients() {
        let body: HistorySaveIn =
            serde_json::from_str(r#"{"problem":{"title":"t"}}"#).unwrap();
        assert_eq!(body.user_code, "");
        assert_eq!(body.verdict, "");
        assert_eq!(body.language, "cpp");
    }

    #[test]
    fn me_out_omits_identity_when_anonymous() {
        let v = serde_json::to_value(MeOut {
            authenticated: false,
            user_id: None,
            username: None,
        })
        .unwrap();
        assert_eq!(v, serde_json::json!({"authenticated": false}));
    }
}
