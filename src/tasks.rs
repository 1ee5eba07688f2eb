//! High-level AI tasks behind the HTTP handlers.
//!
//! Each task assembles a prompt, picks a model role, calls the injected
//! backend, and normalizes the reply into a domain type. Nothing here knows
//! which backend is installed; that was decided once at startup.

use serde_json::json;
use tracing::{error, info, instrument};

use crate::domain::{AnalysisResult, ChatMessage, Problem, Solution};
use crate::error::AiError;
use crate::extract;
use crate::prompts;
use crate::provider::{JsonShape, LlmBackend, ModelRole};
use crate::util::trunc_for_log;

/// Structured-output contract for problem generation. `topic`/`difficulty`
/// are not required: the model should infer them but may omit them, and the
/// orchestrator backfills from the request.
pub fn problem_shape() -> JsonShape {
  JsonShape {
    schema: json!({
      "type": "OBJECT",
      "properties": {
        "title": {"type": "STRING"},
        "description": {"type": "STRING"},
        "inputFormat": {"type": "STRING"},
        "outputFormat": {"type": "STRING"},
        "constraints": {"type": "STRING"},
        "examples": {
          "type": "ARRAY",
          "items": {
            "type": "OBJECT",
            "properties": {
              "input": {"type": "STRING"},
              "output": {"type": "STRING"},
            },
          },
        },
        "topic": {"type": "STRING", "description": "Infer the topic from the problem"},
        "difficulty": {"type": "STRING", "description": "Infer the difficulty level"},
      },
      "required": ["title", "description", "inputFormat", "outputFormat", "constraints", "examples"],
    }),
    example: r#"{"title": "Tổng đoạn con lớn nhất", "description": "Cho dãy n số nguyên...", "inputFormat": "Dòng 1: n. Dòng 2: n số nguyên.", "outputFormat": "Một số nguyên duy nhất.", "constraints": "1 <= n <= 10^5", "examples": [{"input": "3\n-1 2 3", "output": "5"}], "topic": "Quy hoạch động", "difficulty": "Cơ bản"}"#,
  }
}

/// Structured-output contract for reference solutions.
pub fn solution_shape() -> JsonShape {
  JsonShape {
    schema: json!({
      "type": "OBJECT",
      "properties": {
        "explanation": {"type": "STRING", "description": "Detailed Markdown explanation of the algorithm approach."},
        "sampleCode": {"type": "STRING", "description": "Complete, well-commented source code."},
        "complexity": {"type": "STRING", "description": "Time and Space complexity analysis."},
      },
      "required": ["explanation", "sampleCode", "complexity"],
    }),
    // The payload embeds `"###` and `"#include`, so the delimiter needs four
    // hashes to avoid terminating inside the literal.
    example: r####"{"explanation": "### Phân tích\nDuyệt dãy một lần, giữ tổng tốt nhất...", "sampleCode": "#include <bits/stdc++.h>\nint main() { ... }", "complexity": "Thời gian $O(N)$, bộ nhớ $O(1)$."}"####,
  }
}

/// Generate a brand-new practice problem.
#[instrument(level = "info", skip(ai, custom_request), fields(backend = ai.name(), %topic, %difficulty, has_custom = custom_request.is_some()))]
pub async fn generate_problem(
  ai: &dyn LlmBackend,
  topic: &str,
  difficulty: &str,
  custom_request: Option<&str>,
) -> Result<Problem, AiError> {
  let instruction = prompts::problem_instruction(topic, difficulty, custom_request);
  let prompt = prompts::problem_prompt(&instruction);

  let value = match ai
    .generate_json(ModelRole::Fast, &prompt, Some(prompts::PROBLEM_SYSTEM), &problem_shape())
    .await
  {
    Ok(v) => v,
    Err(e) => {
      error!(target: "coach", error = %e, "Problem generation failed");
      return Err(e);
    }
  };

  let mut problem: Problem = serde_json::from_value(value.clone()).map_err(|e| {
    let raw = value.to_string();
    error!(target: "coach", raw = %trunc_for_log(&raw, 400), "Problem JSON missing required fields");
    AiError::Decode { message: format!("problem JSON missing required fields: {e}"), raw }
  })?;
  extract::backfill_missing_meta(&mut problem, topic, difficulty);

  info!(target: "coach", title = %trunc_for_log(&problem.title, 60), "Problem generated");
  Ok(problem)
}

/// Review submitted code without running it. The model's bracketed verdict
/// token is split off; an unrecognizable reply degrades to `Unknown` with the
/// full text kept as feedback, never to an error.
#[instrument(level = "info", skip(ai, problem, user_code), fields(backend = ai.name(), problem = %problem.title, code_len = user_code.len(), %language))]
pub async fn analyze_solution(
  ai: &dyn LlmBackend,
  problem: &Problem,
  user_code: &str,
  language: &str,
) -> Result<AnalysisResult, AiError> {
  let prompt = prompts::analysis_prompt(problem, user_code, language);

  let raw = match ai.generate_text(ModelRole::Thinking, &prompt, None).await {
    Ok(t) => t,
    Err(e) => {
      error!(target: "coach", error = %e, "Code analysis failed");
      return Err(e);
    }
  };

  let (verdict, feedback_markdown) = extract::split_verdict(&raw);
  info!(target: "coach", ?verdict, feedback_len = feedback_markdown.len(), "Analysis complete");
  Ok(AnalysisResult { verdict, feedback_markdown })
}

/// One nudge in the right direction, given the learner's current code and the
/// latest review feedback. Free text, passed through verbatim.
#[instrument(level = "info", skip(ai, problem, user_code, current_feedback), fields(backend = ai.name(), problem = %problem.title))]
pub async fn request_hint(
  ai: &dyn LlmBackend,
  problem: &Problem,
  user_code: &str,
  current_feedback: &str,
) -> Result<String, AiError> {
  let prompt = prompts::hint_prompt(problem, user_code, current_feedback);
  match ai.generate_text(ModelRole::Fast, &prompt, None).await {
    Ok(t) => Ok(t),
    Err(e) => {
      error!(target: "coach", error = %e, "Hint request failed");
      Err(e)
    }
  }
}

/// Produce a full reference solution for a problem.
#[instrument(level = "info", skip(ai, problem), fields(backend = ai.name(), problem = %problem.title, %language))]
pub async fn generate_solution(
  ai: &dyn LlmBackend,
  problem: &Problem,
  language: &str,
) -> Result<Solution, AiError> {
  let prompt = prompts::solution_prompt(problem, language);

  let value = match ai.generate_json(ModelRole::Thinking, &prompt, None, &solution_shape()).await {
    Ok(v) => v,
    Err(e) => {
      error!(target: "coach", error = %e, "Solution generation failed");
      return Err(e);
    }
  };

  serde_json::from_value(value.clone()).map_err(|e| {
    let raw = value.to_string();
    error!(target: "coach", raw = %trunc_for_log(&raw, 400), "Solution JSON missing required fields");
    AiError::Decode { message: format!("solution JSON missing required fields: {e}"), raw }
  })
}

/// One turn of the tutoring conversation. The caller owns the history; we
/// just forward it together with the persona (and the open problem, if any).
#[instrument(level = "info", skip(ai, history, new_message, current_context), fields(backend = ai.name(), turns = history.len(), has_context = current_context.is_some()))]
pub async fn chat_with_tutor(
  ai: &dyn LlmBackend,
  history: &[ChatMessage],
  new_message: &str,
  current_context: Option<&str>,
) -> Result<String, AiError> {
  let system = prompts::chat_system_instruction(current_context);
  match ai.chat(ModelRole::Fast, &system, history, new_message).await {
    Ok(t) => Ok(t),
    Err(e) => {
      error!(target: "coach", error = %e, "Tutor chat failed");
      Err(e)
    }
  }
}
