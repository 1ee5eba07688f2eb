//! Domain models used by the backend: practice problems, code-review verdicts,
//! model solutions, and tutor chat messages.

use serde::{Deserialize, Serialize};

/// One worked sample case shown alongside a problem statement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Example {
  #[serde(default)] pub input: String,
  #[serde(default)] pub output: String,
}

/// A generated competitive-programming problem.
///
/// The wire shape is camelCase because the browser client consumes it as-is.
/// `topic`/`difficulty` default to empty so a model that omits them still
/// decodes; the orchestrator backfills them from the caller's request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
  pub title: String,
  pub description: String,
  pub input_format: String,
  pub output_format: String,
  pub constraints: String,
  pub examples: Vec<Example>,
  #[serde(default)] pub topic: String,
  #[serde(default)] pub difficulty: String,
}

/// Outcome class of an automated code review.
///
/// Wire values match the bracketed tokens the reviewer model is told to emit
/// (`[DUNG]` -> `CORRECT`, ...).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
  WrongDirection,
  Partial,
  Correct,
  Excellent,
  /// The model skipped the verdict token or produced one we do not know.
  Unknown,
}

/// Result of reviewing a submission: the verdict plus the reviewer's
/// free-form Markdown commentary (verdict token already stripped).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
  pub verdict: Verdict,
  pub feedback_markdown: String,
}

/// A model-authored reference solution for a problem.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
  pub explanation: String,
  pub sample_code: String,
  pub complexity: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
  User,
  /// Older clients send `model` for the assistant side; accept both.
  #[serde(alias = "model")]
  Assistant,
}

/// One turn of the tutoring conversation, as the client stores it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role: ChatRole,
  #[serde(default)] pub text: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn problem_wire_shape_is_camel_case() {
    let p = Problem {
      title: "Tổng đoạn con".into(),
      description: "...".into(),
      input_format: "n rồi n số".into(),
      output_format: "một số".into(),
      constraints: "n <= 1e5".into(),
      examples: vec![Example { input: "3\n1 2 3".into(), output: "6".into() }],
      topic: "prefix sum".into(),
      difficulty: "Dễ".into(),
    };
    let v = serde_json::to_value(&p).unwrap();
    assert!(v.get("inputFormat").is_some());
    assert!(v.get("outputFormat").is_some());
    assert!(v.get("input_format").is_none());
  }

  #[test]
  fn problem_decodes_without_topic_or_difficulty() {
    let p: Problem = serde_json::from_str(
      r#"{"title":"t","description":"d","inputFormat":"i","outputFormat":"o",
          "constraints":"c","examples":[]}"#,
    )
    .unwrap();
    assert_eq!(p.topic, "");
    assert_eq!(p.difficulty, "");
  }

  #[test]
  fn verdict_uses_screaming_snake_case() {
    assert_eq!(serde_json::to_string(&Verdict::WrongDirection).unwrap(), "\"WRONG_DIRECTION\"");
    assert!(serde_json::from_str::<Verdict>("\"XUAT_SAC\"").is_err());
    assert_eq!(serde_json::from_str::<Verdict>("\"EXCELLENT\"").unwrap(), Verdict::Excellent);
  }

  #[test]
  fn chat_role_accepts_model_alias() {
    let m: ChatMessage = serde_json::from_str(r#"{"role":"model","text":"hi"}"#).unwrap();
    assert_eq!(m.role, ChatRole::Assistant);
    let m: ChatMessage = serde_json::from_str(r#"{"role":"assistant","text":"hi"}"#).unwrap();
    assert_eq!(m.role, ChatRole::Assistant);
  }
}
