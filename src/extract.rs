//! Normalization of raw model output into typed values.
//!
//! Models that lack native structured output wrap JSON in Markdown code
//! fences, prepend prose, or skip fields. Everything in here is a pure
//! function so the quirks stay testable without a live backend.

use serde_json::Value;
use tracing::{debug, error};

use crate::domain::{Problem, Verdict};
use crate::error::AiError;
use crate::util::trunc_for_log;

/// Strip at most one leading and one trailing Markdown code fence.
///
/// The leading fence may carry a language tag (```json). Fences in the middle
/// of the text are left alone; only boundary markers are removed.
pub fn strip_code_fence(raw: &str) -> &str {
  let mut s = raw.trim();
  if let Some(rest) = s.strip_prefix("```") {
    s = match rest.split_once('\n') {
      // First line is a language tag, not payload: drop it.
      Some((tag, body)) if !tag.trim_start().starts_with(|c: char| c == '{' || c == '[') => body,
      _ => rest,
    };
  }
  s = s.trim_end();
  if let Some(rest) = s.strip_suffix("```") {
    s = rest;
  }
  s.trim()
}

/// Decode model text as JSON: exact parse first, then one retry with the
/// code fences stripped. Never returns a partially-parsed value.
pub fn decode_json(raw: &str) -> Result<Value, AiError> {
  if let Ok(v) = serde_json::from_str::<Value>(raw) {
    return Ok(v);
  }
  let stripped = strip_code_fence(raw);
  serde_json::from_str::<Value>(stripped).map_err(|e| {
    error!(target: "coach", raw = %trunc_for_log(raw, 400), "Model output is not JSON even after fence stripping");
    AiError::Decode { message: e.to_string(), raw: raw.to_string() }
  })
}

/// Split review text into a [`Verdict`] and the remaining Markdown feedback.
///
/// The verdict token must be bracketed at the very start of the text and must
/// not span lines; anything else classifies as `Unknown` with the full text
/// kept as feedback. Inside the bracket we match by containment, in a fixed
/// priority order, because models sometimes decorate the token.
pub fn split_verdict(raw: &str) -> (Verdict, String) {
  let Some(rest) = raw.strip_prefix('[') else {
    return (Verdict::Unknown, raw.to_string());
  };
  let Some(close) = rest.find(']') else {
    return (Verdict::Unknown, raw.to_string());
  };
  let code = &rest[..close];
  if code.contains('\n') {
    return (Verdict::Unknown, raw.to_string());
  }
  let verdict = if code.contains("SAI_HUONG") {
    Verdict::WrongDirection
  } else if code.contains("THIEU_SOT") {
    Verdict::Partial
  } else if code.contains("DUNG") {
    Verdict::Correct
  } else if code.contains("XUAT_SAC") {
    Verdict::Excellent
  } else {
    Verdict::Unknown
  };
  (verdict, rest[close + 1..].trim_start().to_string())
}

/// Fill in `topic`/`difficulty` from the caller's request when the model left
/// them out or blank. Never fails: a usable problem with inherited metadata
/// beats a rejected response.
pub fn backfill_missing_meta(problem: &mut Problem, topic: &str, difficulty: &str) {
  if problem.topic.trim().is_empty() {
    debug!(target: "coach", %topic, "Model omitted topic, backfilling from request");
    problem.topic = topic.to_string();
  }
  if problem.difficulty.trim().is_empty() {
    debug!(target: "coach", %difficulty, "Model omitted difficulty, backfilling from request");
    problem.difficulty = difficulty.to_string();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fence_with_language_tag_is_stripped() {
    assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    assert_eq!(strip_code_fence("  ```json\n[1,2]\n```  "), "[1,2]");
  }

  #[test]
  fn unfenced_text_passes_through() {
    assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    assert_eq!(strip_code_fence("  plain text  "), "plain text");
  }

  #[test]
  fn interior_fences_survive() {
    let s = "{\"code\":\"```cpp\\nint x;\\n```\"}";
    assert_eq!(strip_code_fence(s), s);
  }

  #[test]
  fn decode_json_retries_after_stripping() {
    let v = decode_json("```json\n{\"title\":\"Bài 1\"}\n```").unwrap();
    assert_eq!(v["title"], "Bài 1");
  }

  #[test]
  fn decode_json_keeps_raw_text_on_failure() {
    let raw = "Xin lỗi, tôi không thể tạo JSON.";
    match decode_json(raw) {
      Err(AiError::Decode { raw: kept, .. }) => assert_eq!(kept, raw),
      other => panic!("expected Decode error, got {other:?}"),
    }
  }

  #[test]
  fn decode_failure_keeps_the_full_payload_for_diagnostics() {
    // Truncation is for log excerpts only; the error carries everything.
    let raw = format!("Mô hình trả lời rất dài: {}", "x".repeat(2000));
    match decode_json(&raw) {
      Err(AiError::Decode { raw: kept, .. }) => assert_eq!(kept, raw),
      other => panic!("expected Decode error, got {other:?}"),
    }
  }

  #[test]
  fn verdict_tokens_map_in_priority_order() {
    let cases = [
      ("[SAI_HUONG] rà lại ý tưởng", Verdict::WrongDirection, "rà lại ý tưởng"),
      ("[THIEU_SOT] thiếu biên", Verdict::Partial, "thiếu biên"),
      ("[DUNG]\n### 1. Kết luận", Verdict::Correct, "### 1. Kết luận"),
      ("[XUAT_SAC] tuyệt vời", Verdict::Excellent, "tuyệt vời"),
      ("[GINHI_DO] lạ", Verdict::Unknown, "lạ"),
    ];
    for (raw, want, feedback) in cases {
      let (v, f) = split_verdict(raw);
      assert_eq!(v, want, "raw={raw}");
      assert_eq!(f, feedback);
    }
  }

  #[test]
  fn decorated_token_still_matches_by_containment() {
    let (v, _) = split_verdict("[VERDICT: XUAT_SAC] đẹp");
    assert_eq!(v, Verdict::Excellent);
    // DUNG outranks XUAT_SAC when both appear.
    let (v, _) = split_verdict("[DUNG, gần XUAT_SAC] ổn");
    assert_eq!(v, Verdict::Correct);
  }

  #[test]
  fn missing_or_malformed_token_keeps_full_text() {
    for raw in ["không có verdict nào cả", "xem [DUNG] ở giữa", "[DUNG\n] xuống dòng", "[mở mãi"] {
      let (v, f) = split_verdict(raw);
      assert_eq!(v, Verdict::Unknown, "raw={raw}");
      assert_eq!(f, raw);
    }
  }

  #[test]
  fn feedback_keeps_trailing_whitespace_shape() {
    // Only the token and the whitespace right after it are trimmed.
    let (v, f) = split_verdict("[DUNG]   \n\nTốt.\n");
    assert_eq!(v, Verdict::Correct);
    assert_eq!(f, "Tốt.\n");
  }

  #[test]
  fn backfill_touches_only_blank_fields() {
    let mut p: Problem = serde_json::from_str(
      r#"{"title":"t","description":"d","inputFormat":"i","outputFormat":"o",
          "constraints":"c","examples":[],"topic":"  ","difficulty":"Nâng cao"}"#,
    )
    .unwrap();
    backfill_missing_meta(&mut p, "Đồ thị", "Cơ bản");
    assert_eq!(p.topic, "Đồ thị");
    assert_eq!(p.difficulty, "Nâng cao");
  }
}
