//! Prompt assembly and failure-feedback accumulation.

use tracing::warn;

use crate::domain::Stage;

/// Default size cap of a session prompt, in bytes.
pub const DEFAULT_PROMPT_BUDGET: usize = 200_000;

/// Reply-format instructions sent as part of the system prompt.
pub const RESPONSE_FORMAT: &str = concat!(
    "Reply with the complete new content of every file you change, each framed by\n",
    "whole-line markers:\n",
    "/* START OF FILE: <path> */\n",
    "<file content>\n",
    "/* END OF FILE: <path> */\n",
    "Use the paths exactly as they appear in the dependency listing.\n",
    "You may replace one unchanged region per file with the line\n",
    "// ... (other functions remain unchanged)\n",
    "as long as the five lines before it and all text after it are copied\n",
    "unchanged from the original file.\n",
    "End the reply with a line `Summary: <three-word-dash-separated-token>` using only\n",
    "letters, digits and dashes, and optionally a line `Commit message: <text>`.\n",
);

/// One file rendered into the dependency listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFile {
    pub path: String,
    /// File text, or the read error rendered as text.
    pub content: Result<String, String>,
}

impl ContextFile {
    pub fn loaded(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Ok(content.into()),
        }
    }

    pub fn unreadable(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Err(error.into()),
        }
    }
}

/// Frame the user request and every dependency file in the same markers the
/// model is asked to reply with.
pub fn build_prompt(user_prompt: &str, files: &[ContextFile]) -> String {
    let mut out = String::new();
    out.push_str(user_prompt);
    out.push_str("\n\nDependencies:\n");

    for file in files {
        out.push_str(&format!("\n/* START OF FILE: {} */\n", file.path));
        match &file.content {
            Ok(text) => out.push_str(text),
            Err(err) => out.push_str(&format!("Error reading file: {err}\n")),
        }
        out.push_str(&format!("\n/* END OF FILE: {} */\n\n", file.path));
    }

    out
}

/// Heading of the feedback paragraph appended after a failed stage.
fn feedback_header(stage: Stage) -> String {
    format!(
        "\n{} failed, please address the following issues:\n",
        stage.label()
    )
}

fn feedback_body(output: &str) -> String {
    format!("{}\n", output.trim_end())
}

/// Bytes of the newest failure output kept even when that exceeds the budget.
pub const MIN_FEEDBACK_TAIL: usize = 4 * 1024;

/// Base prompt plus accumulated failure feedback, capped at a byte budget.
///
/// The base prompt is never trimmed. When the budget is exceeded the oldest
/// feedback is dropped first and a single marker records how much was
/// removed. The newest failure paragraph always survives: only the head of
/// its output is cut, and never below [`MIN_FEEDBACK_TAIL`] bytes, even if
/// the prompt then stays over budget.
#[derive(Debug, Clone)]
pub struct PromptBuffer {
    base: String,
    budget: usize,
    /// Feedback from earlier attempts.
    earlier: String,
    earlier_truncated: usize,
    latest_header: String,
    latest_body: String,
    latest_truncated: usize,
    dropped: usize,
    rendered: String,
}

impl PromptBuffer {
    pub fn new(base: impl Into<String>, budget: usize) -> Self {
        let base = base.into();
        let rendered = base.clone();
        Self {
            base,
            budget,
            earlier: String::new(),
            earlier_truncated: 0,
            latest_header: String::new(),
            latest_body: String::new(),
            latest_truncated: 0,
            dropped: 0,
            rendered,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Bytes of feedback dropped so far.
    pub fn truncated_bytes(&self) -> usize {
        self.dropped
    }

    pub fn push_feedback(&mut self, stage: Stage, output: &str) {
        let header = std::mem::replace(&mut self.latest_header, feedback_header(stage));
        let body = std::mem::replace(&mut self.latest_body, feedback_body(output));
        self.earlier.push_str(&header);
        self.earlier.push_str(&Self::output_marker(self.latest_truncated));
        self.earlier.push_str(&body);
        self.latest_truncated = 0;

        self.enforce_budget();
        self.render();
    }

    fn earlier_marker(truncated: usize) -> String {
        if truncated == 0 {
            String::new()
        } else {
            format!("\n[... {truncated} bytes of earlier failure output truncated ...]\n")
        }
    }

    fn output_marker(truncated: usize) -> String {
        if truncated == 0 {
            String::new()
        } else {
            format!("[... {truncated} bytes truncated ...]\n")
        }
    }

    fn rendered_len(&self) -> usize {
        self.base.len()
            + Self::earlier_marker(self.earlier_truncated).len()
            + self.earlier.len()
            + self.latest_header.len()
            + Self::output_marker(self.latest_truncated).len()
            + self.latest_body.len()
    }

    fn enforce_budget(&mut self) {
        loop {
            let total = self.rendered_len();
            if total <= self.budget {
                return;
            }
            let over = total - self.budget;

            if !self.earlier.is_empty() {
                let cut = ceil_char_boundary(&self.earlier, over.min(self.earlier.len()));
                self.earlier.drain(..cut);
                self.earlier_truncated += cut;
                self.dropped += cut;
                continue;
            }

            let removable = self.latest_body.len().saturating_sub(MIN_FEEDBACK_TAIL);
            if removable == 0 {
                warn!(
                    budget = self.budget,
                    prompt_bytes = total,
                    "prompt exceeds budget, keeping latest failure output"
                );
                return;
            }
            let cut = ceil_char_boundary(&self.latest_body, over.min(removable));
            self.latest_body.drain(..cut);
            self.latest_truncated += cut;
            self.dropped += cut;
        }
    }

    fn render(&mut self) {
        let mut rendered = String::with_capacity(self.rendered_len());
        rendered.push_str(&self.base);
        rendered.push_str(&Self::earlier_marker(self.earlier_truncated));
        rendered.push_str(&self.earlier);
        rendered.push_str(&self.latest_header);
        rendered.push_str(&Self::output_marker(self.latest_truncated));
        rendered.push_str(&self.latest_body);
        self.rendered = rendered;
    }
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_frames_dependencies() {
        let files = vec![
            ContextFile::loaded("repo/file1.go", "Content of file1"),
            ContextFile::loaded("repo/file2.go", "Content of file2"),
        ];
        let expected = "Add a new feature\n\nDependencies:\n\n/* START OF FILE: repo/file1.go */\n\
Content of file1\n/* END OF FILE: repo/file1.go */\n\n\
\n/* START OF FILE: repo/file2.go */\n\
Content of file2\n/* END OF FILE: repo/file2.go */\n\n";
        assert_eq!(build_prompt("Add a new feature", &files), expected);
    }

    #[test]
    fn test_build_prompt_reports_unreadable_file() {
        let files = vec![ContextFile::unreadable("gone.c", "No such file")];
        let prompt = build_prompt("p", &files);
        assert!(prompt.contains("/* START OF FILE: gone.c */\nError reading file: No such file\n"));
    }

    #[test]
    fn test_feedback_accumulates() {
        let mut buf = PromptBuffer::new("base", DEFAULT_PROMPT_BUDGET);
        buf.push_feedback(Stage::Build, "undefined: foo\n");
        buf.push_feedback(Stage::Test, "--- FAIL: TestX");
        let text = buf.as_str();
        assert!(text.starts_with("base\nBuild failed, please address the following issues:\nundefined: foo\n"));
        assert!(text.ends_with("\nTest failed, please address the following issues:\n--- FAIL: TestX\n"));
        assert_eq!(buf.truncated_bytes(), 0);
    }

    #[test]
    fn test_budget_drops_oldest_feedback_and_keeps_base() {
        let base = "BASE PROMPT";
        let mut buf = PromptBuffer::new(base, 200);
        buf.push_feedback(Stage::Build, &"a".repeat(150));
        buf.push_feedback(Stage::Test, &"b".repeat(50));

        let text = buf.as_str();
        assert!(text.len() <= 200, "len = {}", text.len());
        assert!(text.starts_with(base));
        assert!(text.contains("bytes of earlier failure output truncated"));
        assert!(text.ends_with(&format!("{}\n", "b".repeat(50))));
        assert!(buf.truncated_bytes() > 0);
    }

    #[test]
    fn test_latest_failure_survives_oversized_base() {
        let base = "x".repeat(DEFAULT_PROMPT_BUDGET + 1);
        let mut buf = PromptBuffer::new(base.clone(), DEFAULT_PROMPT_BUDGET);
        buf.push_feedback(Stage::Build, "error: undefined reference to `foo`");

        assert_eq!(buf.base(), base);
        let tail = &buf.as_str()[base.len()..];
        assert!(tail.contains("Build failed, please address the following issues:"));
        assert!(tail.contains("undefined reference to `foo`"));
        assert_eq!(buf.truncated_bytes(), 0);
    }

    #[test]
    fn test_oversized_latest_output_keeps_its_tail() {
        let base = "x".repeat(1000);
        let output = format!("first line\n{}\nlast error line", "z".repeat(20_000));
        let mut buf = PromptBuffer::new(base.clone(), 1000);
        buf.push_feedback(Stage::Test, "older failure");
        buf.push_feedback(Stage::Build, &output);

        let text = buf.as_str();
        assert!(text.starts_with(&base));
        assert!(!text.contains("older failure"));
        assert!(!text.contains("first line"));
        assert!(text.contains("Build failed, please address the following issues:\n[... "));
        assert!(text.ends_with("last error line\n"));
        let kept = text.len() - text.rfind("truncated ...]\n").unwrap() - "truncated ...]\n".len();
        assert_eq!(kept, MIN_FEEDBACK_TAIL);
    }

    #[test]
    fn test_latest_output_trimmed_only_to_budget() {
        let mut buf = PromptBuffer::new("base", 10_000);
        buf.push_feedback(Stage::Build, &"e".repeat(20_000));

        let text = buf.as_str();
        assert!(text.len() <= 10_000, "len = {}", text.len());
        assert!(text.len() > MIN_FEEDBACK_TAIL);
        assert!(buf.truncated_bytes() > 0);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let mut buf = PromptBuffer::new("b", 120);
        buf.push_feedback(Stage::Build, &"\u{00e9}".repeat(200));
        buf.push_feedback(Stage::Test, "x");
        // Would panic on a non-boundary drain.
        assert!(buf.truncated_bytes() > 0);
        assert!(buf.as_str().ends_with("x\n"));
    }

    #[test]
    fn test_response_format_mentions_placeholder() {
        assert!(RESPONSE_FORMAT.contains(crate::splice::PLACEHOLDER));
    }
}
