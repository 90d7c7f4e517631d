//! Response parser: model reply text → file blocks plus metadata.
//!
//! The wire format is a plain-text document containing, in any order:
//!
//! ```text
//! /* START OF FILE: <path> */
//! <content>
//! /* END OF FILE: <path> */
//! Summary: short-dash-token
//! Commit message: optional one-line message
//! ```
//!
//! Markers are whole-line tokens; the end marker's path is not compared
//! against the start marker's. Parsing is a pure text transformation.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::{FileBlock, ParsedResponse, Summary};

/// Errors that invalidate a whole reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("response has no `Summary: <token>` line")]
    MissingSummary,

    #[error("response has {} summary lines, expected exactly one: {0:?}", .0.len())]
    MultipleSummaries(Vec<String>),

    #[error("response contains no complete file blocks")]
    NoFileBlocks,

    #[error("file block with an empty path")]
    EmptyPath,

    #[error("file block for `{0}` appears more than once")]
    DuplicatePath(String),
}

fn start_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*/\* START OF FILE: (.*?) \*/\s*$").expect("start marker regex")
    })
}

fn end_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*/\* END OF FILE: .*? \*/\s*$").expect("end marker regex")
    })
}

fn summary_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Summary: ([a-zA-Z0-9-]+)").expect("summary regex"))
}

fn commit_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*Commit message:[ \t]*(\S.*?)\s*$").expect("commit regex")
    })
}

/// Parse a raw model reply.
///
/// A start marker with no end marker after it is dropped (and listed in
/// [`ParsedResponse::unterminated`]); every other block is still returned.
pub fn parse_response(text: &str) -> Result<ParsedResponse, ParseError> {
    let summary = extract_summary(text)?;

    let starts: Vec<_> = start_marker().captures_iter(text).collect();
    if starts.is_empty() {
        return Err(ParseError::NoFileBlocks);
    }

    let mut files = Vec::with_capacity(starts.len());
    let mut seen = HashSet::new();
    let mut unterminated = Vec::new();

    for caps in &starts {
        let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let path = path.as_str();
        if path.is_empty() {
            return Err(ParseError::EmptyPath);
        }

        let rest = &text[whole.end()..];
        let Some(end) = end_marker().find(rest) else {
            warn!(path = %path, "start marker without end marker; skipping block");
            unterminated.push(path.to_string());
            continue;
        };

        if !seen.insert(path.to_string()) {
            return Err(ParseError::DuplicatePath(path.to_string()));
        }

        let content = rest[..end.start()].trim();
        debug!(path = %path, bytes = content.len(), "parsed file block");
        files.push(FileBlock::new(path, content));
    }

    if files.is_empty() {
        return Err(ParseError::NoFileBlocks);
    }

    let commit_message = commit_line()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());

    Ok(ParsedResponse {
        files,
        summary,
        commit_message,
        unterminated,
    })
}

fn extract_summary(text: &str) -> Result<Summary, ParseError> {
    let tokens: Vec<String> = summary_line()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();

    match tokens.len() {
        0 => Err(ParseError::MissingSummary),
        1 => Summary::new(tokens[0].clone()).map_err(|_| ParseError::MissingSummary),
        _ => Err(ParseError::MultipleSummaries(tokens)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "Here you go.\n\
/* START OF FILE: src/a.go */\n\
package a\n\
\n\
func A() int { return 1 }\n\
/* END OF FILE: src/a.go */\n\
\n\
/* START OF FILE: src/b.go */\n\
package b\n\
/* END OF FILE: src/b.go */\n\
Summary: add-two-files\n";

    #[test]
    fn test_parse_two_blocks_in_order() {
        let parsed = parse_response(TWO_FILES).unwrap();
        assert_eq!(parsed.summary.as_str(), "add-two-files");
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.files[0].path, "src/a.go");
        assert_eq!(parsed.files[0].content, "package a\n\nfunc A() int { return 1 }");
        assert_eq!(parsed.files[1].path, "src/b.go");
        assert_eq!(parsed.files[1].content, "package b");
        assert!(parsed.unterminated.is_empty());
        assert!(parsed.commit_message.is_none());
    }

    #[test]
    fn test_missing_summary_fails_even_with_blocks() {
        let text = TWO_FILES.replace("Summary: add-two-files\n", "");
        assert_eq!(parse_response(&text), Err(ParseError::MissingSummary));
    }

    #[test]
    fn test_summary_without_blocks_fails() {
        let text = "I could not find anything to change.\nSummary: nothing\n";
        assert_eq!(parse_response(text), Err(ParseError::NoFileBlocks));
    }

    #[test]
    fn test_multiple_summaries_rejected() {
        let text = format!("{TWO_FILES}Summary: second-one\n");
        match parse_response(&text) {
            Err(ParseError::MultipleSummaries(tokens)) => {
                assert_eq!(tokens, vec!["add-two-files", "second-one"]);
            }
            other => panic!("expected MultipleSummaries, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_block_is_skipped() {
        let text = "/* START OF FILE: ok.c */\nint x;\n/* END OF FILE: ok.c */\n\
/* START OF FILE: broken.c */\nint y;\nSummary: partial\n";
        let parsed = parse_response(text).unwrap();
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].path, "ok.c");
        assert_eq!(parsed.unterminated, vec!["broken.c"]);
    }

    #[test]
    fn test_only_unterminated_blocks_is_no_blocks() {
        let text = "/* START OF FILE: broken.c */\nint y;\nSummary: partial\n";
        assert_eq!(parse_response(text), Err(ParseError::NoFileBlocks));
    }

    #[test]
    fn test_end_marker_path_is_not_compared() {
        let text = "/* START OF FILE: x.c */\nint x;\n/* END OF FILE: other.c */\nSummary: s\n";
        let parsed = parse_response(text).unwrap();
        assert_eq!(parsed.files[0].path, "x.c");
        assert_eq!(parsed.files[0].content, "int x;");
    }

    #[test]
    fn test_markers_tolerate_surrounding_whitespace() {
        let text = "   /* START OF FILE: x.c */   \n  int x;  \n\t/* END OF FILE: x.c */\t\nSummary: ws\n";
        let parsed = parse_response(text).unwrap();
        assert_eq!(parsed.files[0].content, "int x;");
    }

    #[test]
    fn test_inline_marker_text_is_not_a_marker() {
        let text = "see /* START OF FILE: x.c */ inline\nSummary: inline\n";
        assert_eq!(parse_response(text), Err(ParseError::NoFileBlocks));
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let text = "/* START OF FILE: a */\n1\n/* END OF FILE: a */\n\
/* START OF FILE: a */\n2\n/* END OF FILE: a */\nSummary: dup\n";
        assert_eq!(
            parse_response(text),
            Err(ParseError::DuplicatePath("a".to_string()))
        );
    }

    #[test]
    fn test_empty_path_rejected() {
        let text = "/* START OF FILE:  */\n1\n/* END OF FILE: a */\nSummary: empty\n";
        assert_eq!(parse_response(text), Err(ParseError::EmptyPath));
    }

    #[test]
    fn test_commit_message_is_optional_metadata() {
        let text = format!("{TWO_FILES}Commit message:   Add files a and b  \n");
        let parsed = parse_response(&text).unwrap();
        assert_eq!(parsed.commit_message.as_deref(), Some("Add files a and b"));
    }

    #[test]
    fn test_content_is_taken_verbatim() {
        let text = "/* START OF FILE: weird.txt */\n}}} not code {{{\n\u{1F600}\n/* END OF FILE: weird.txt */\nSummary: emoji\n";
        let parsed = parse_response(text).unwrap();
        assert_eq!(parsed.files[0].content, "}}} not code {{{\n\u{1F600}");
    }
}
