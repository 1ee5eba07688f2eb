//! Prompt assembly for every AI task. Pure string builders, no I/O.
//!
//! All instruction text is Vietnamese because the product targets Vietnamese
//! olympiad students; the code around it stays English. Builders never talk
//! to a backend and never fail, so they are trivially unit-testable.

use crate::domain::Problem;

/// System instruction used when generating a new problem.
pub const PROBLEM_SYSTEM: &str =
  "Bạn là một giám khảo HSG Tin học nghiêm khắc. Hãy tạo đề bài chất lượng cao.";

/// Instruction block describing WHAT problem to generate.
///
/// A non-blank `custom_request` wins over the topic parameter: the model is
/// told to honor the free-form request and keep only the difficulty. A blank
/// or absent request falls back to the plain topic/difficulty parameter list.
pub fn problem_instruction(topic: &str, difficulty: &str, custom_request: Option<&str>) -> String {
  if let Some(req) = custom_request.filter(|r| !r.trim().is_empty()) {
    return format!(
      r#"YÊU CẦU ĐẶC BIỆT TỪ NGƯỜI DÙNG: "{req}"

Hãy phân tích yêu cầu trên để tạo ra một đề bài phù hợp.
- Nếu người dùng mô tả một tình huống, hãy biến nó thành bài toán tin học.
- Nếu người dùng yêu cầu thuật toán cụ thể, hãy tạo bài toán sử dụng thuật toán đó.
- Bỏ qua tham số 'Chủ đề' gốc nếu yêu cầu của người dùng đã rõ ràng về chủ đề khác.
- Cố gắng giữ 'Độ khó' ở mức: {difficulty} (trừ khi người dùng yêu cầu khác).
"#
    );
  }
  format!(
    r#"Tham số sinh đề:
- Chủ đề: {topic}
- Độ khó: {difficulty}
"#
  )
}

/// Full problem-generation prompt wrapping an instruction block from
/// [`problem_instruction`].
pub fn problem_prompt(instruction: &str) -> String {
  format!(
    r#"Bạn là AI huấn luyện viên chuyên luyện thi Học sinh giỏi Tin học.
Hãy sinh một đề bài lập trình thi đấu mới.

{instruction}

Yêu cầu chung:
- Đề bài phải rõ ràng, chuẩn format HSG (Competitive Programming).
- Có ý tưởng thuật toán cụ thể.
- KHÔNG dùng emoji.
- Tự động suy luận lại 'topic' và 'difficulty' thực tế của bài toán bạn vừa tạo và điền vào JSON.

Trả về JSON khớp với schema.
"#
  )
}

/// Static-review prompt. The model must open with exactly one bracketed
/// verdict token and then a fixed three-section Markdown report.
pub fn analysis_prompt(problem: &Problem, user_code: &str, language: &str) -> String {
  format!(
    r#"ĐỀ BÀI:
{title}
{description}
Constraints: {constraints}

BÀI LÀM CỦA THÍ SINH ({language}):
{user_code}

NHIỆM VỤ:
Đóng vai giám khảo HSG Tin học, phân tích code trên (không chạy test case).

1. Xác định ý tưởng thuật toán.
2. Đánh giá độ đúng đắn (Logic, Edge cases). Nếu sai, phải chỉ ra input nào sẽ làm code sai.
3. Phân tích độ phức tạp (Time/Space) so với Constraints.
4. Đưa ra nhận xét và gợi ý.

QUAN TRỌNG VỀ FORMAT MARKDOWN:
- Mọi công thức toán học PHẢI dùng cú pháp LaTeX kẹp giữa dấu $. Ví dụ: $O(N^2)$, $10^{{18}}$, $dp[i]$.
- KHÔNG dùng \( ... \) hoặc \[ ... \].
- In đậm các từ khóa quan trọng.

PHÂN CẤP ĐÁNH GIÁ (Chọn 1 trong 4 để điền vào VERDICT_CODE):
- SAI_HUONG (Sai ý tưởng hoàn toàn hoặc thuật toán không chạy được)
- THIEU_SOT (Đúng hướng nhưng sai logic nhỏ, thiếu trường hợp biên, hoặc TLE/MLE)
- DUNG (Đúng thuật toán, pass được constraints)
- XUAT_SAC (Tư duy vượt trội, code đẹp, tối ưu nhất)

OUTPUT FORMAT:
Dòng 1: [VERDICT_CODE]
Các dòng sau (Markdown):

### 1. Kết luận
- **Trạng thái**: [Ghi rõ ĐÚNG hoặc SAI tại đây]
- **Nguyên nhân sai**: [Nếu sai, ghi ngắn gọn lý do tại đây. Nếu đúng, ghi "Đạt yêu cầu"]

### 2. Phân tích kỹ thuật
- **Thuật toán sử dụng**: ...
- **Độ phức tạp**: Thời gian $O(...)$, Bộ nhớ $O(...)$
- **Đánh giá Constraints**: [Phân tích xem độ phức tạp này có thỏa mãn giới hạn thời gian không]

### 3. Chi tiết & Góp ý
- [Chỉ ra lỗi sai cụ thể nếu có]
- [Nhận xét về phong cách code]
- [Gợi ý cải thiện]
"#,
    title = problem.title,
    description = problem.description,
    constraints = problem.constraints,
  )
}

/// Nudge prompt for a stuck learner. Explicitly forbids a full solution.
pub fn hint_prompt(problem: &Problem, user_code: &str, current_feedback: &str) -> String {
  format!(
    r#"ĐỀ BÀI: {title}
CODE HIỆN TẠI: {user_code}
NHẬN XÉT TRƯỚC ĐÓ: {current_feedback}

Người dùng đang bế tắc và xin gợi ý. Hãy đưa ra một gợi ý nhỏ (Hint) về hướng đi đúng hoặc cách tối ưu, không đưa lời giải đầy đủ.
Phong cách: Gợi mở tư duy.
"#,
    title = problem.title,
  )
}

/// Full reference-solution prompt (explanation, complexity, sample code).
pub fn solution_prompt(problem: &Problem, language: &str) -> String {
  format!(
    r#"ĐỀ BÀI:
{title}
{description}
Constraints: {constraints}

Ngôn ngữ: {language}

Học sinh đang bí và cần xem lời giải mẫu.
Hãy tạo ra một lời giải chi tiết gồm:
1. Phân tích thuật toán (giải thích cách tiếp cận, công thức quy hoạch động nếu có, v.v.).
2. Độ phức tạp.
3. Code mẫu chuẩn mực (Clean code, comment đầy đủ).

QUAN TRỌNG:
- Dùng cú pháp LaTeX chuẩn ($...$) cho công thức toán.
- Định dạng Markdown đẹp.

Trả về JSON.
"#,
    title = problem.title,
    description = problem.description,
    constraints = problem.constraints,
  )
}

const CHAT_SYSTEM_BASE: &str = "Bạn là Trợ lý học tập môn Tin học, chuyên giải đáp thắc mắc về \
thuật toán, cấu trúc dữ liệu và lập trình. Bạn thân thiện, kiên nhẫn và giải thích dễ hiểu. \
Sử dụng LaTeX ($...$) cho công thức toán.";

/// Tutor persona for the chat endpoint. When the learner currently has a
/// problem open, its statement is appended so the tutor can refer to it.
pub fn chat_system_instruction(current_context: Option<&str>) -> String {
  match current_context.filter(|c| !c.trim().is_empty()) {
    Some(ctx) => format!("{CHAT_SYSTEM_BASE}\n\nHọc sinh đang làm bài tập sau:\n{ctx}"),
    None => CHAT_SYSTEM_BASE.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Example, Problem};

  fn sample_problem() -> Problem {
    Problem {
      title: "Tổng đoạn con lớn nhất".into(),
      description: "Cho dãy số, tìm đoạn con có tổng lớn nhất.".into(),
      input_format: "Dòng 1: n. Dòng 2: n số.".into(),
      output_format: "Một số nguyên.".into(),
      constraints: "1 <= n <= 10^5".into(),
      examples: vec![Example { input: "3\n-1 2 3".into(), output: "5".into() }],
      topic: "Quy hoạch động".into(),
      difficulty: "Cơ bản".into(),
    }
  }

  #[test]
  fn custom_request_overrides_topic() {
    let got = problem_instruction("Đồ thị", "Khó", Some("bài về dãy ngoặc"));
    assert!(got.contains("YÊU CẦU ĐẶC BIỆT TỪ NGƯỜI DÙNG: \"bài về dãy ngoặc\""));
    assert!(got.contains("Khó"));
    assert!(!got.contains("Đồ thị"));
  }

  #[test]
  fn blank_custom_request_falls_back_to_parameters() {
    for req in [None, Some(""), Some("   ")] {
      let got = problem_instruction("Đồ thị", "Khó", req);
      assert!(got.contains("Chủ đề: Đồ thị"), "req={req:?}");
      assert!(got.contains("Độ khó: Khó"));
      assert!(!got.contains("YÊU CẦU ĐẶC BIỆT"));
    }
  }

  #[test]
  fn analysis_prompt_embeds_code_and_the_verdict_scale() {
    let p = sample_problem();
    let got = analysis_prompt(&p, "int main() { return 0; }", "C++");
    assert!(got.contains("int main() { return 0; }"));
    assert!(got.contains("(C++)"));
    for token in ["SAI_HUONG", "THIEU_SOT", "DUNG", "XUAT_SAC"] {
      assert!(got.contains(token), "missing {token}");
    }
    // Brace escaping in the format string must survive into the text.
    assert!(got.contains("$10^{18}$"));
    assert!(got.contains(r"KHÔNG dùng \( ... \)"));
  }

  #[test]
  fn hint_prompt_carries_previous_feedback() {
    let p = sample_problem();
    let got = hint_prompt(&p, "x = 1", "Sai ở vòng lặp");
    assert!(got.contains("NHẬN XÉT TRƯỚC ĐÓ: Sai ở vòng lặp"));
    assert!(got.contains(&p.title));
    assert!(got.contains("không đưa lời giải đầy đủ"));
  }

  #[test]
  fn chat_system_appends_context_only_when_present() {
    let plain = chat_system_instruction(None);
    assert!(!plain.contains("Học sinh đang làm bài tập sau"));
    let with = chat_system_instruction(Some("Bài: đếm số nguyên tố"));
    assert!(with.starts_with(&plain));
    assert!(with.contains("Bài: đếm số nguyên tố"));
    assert_eq!(chat_system_instruction(Some("  ")), plain);
  }
}
