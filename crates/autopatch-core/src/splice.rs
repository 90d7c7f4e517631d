//! Partial-update splicer.
//!
//! A model may replace an unchanged span of a file with [`PLACEHOLDER`].
//! The splicer rebuilds the full file from the last-known-good content on
//! disk:
//!
//! 1. split the block on the placeholder into `before` and `after`
//!    (exactly one placeholder is allowed);
//! 2. take the last [`ANCHOR_LINES`] lines of `before` as the anchor and
//!    find its rightmost occurrence in the original;
//! 3. find the first occurrence of `after` at or past the end of that anchor;
//! 4. emit `before + original[anchor_end..after_start] + after`.
//!
//! The rightmost-anchor rule is a best-effort heuristic. When the anchor
//! text repeats, the match closest to the end of the file wins; when it
//! cannot be found the splice fails instead of guessing.

use std::path::Path;

use tracing::debug;

/// Sentinel standing in for omitted, unchanged code.
pub const PLACEHOLDER: &str = "// ... (other functions remain unchanged)";

/// Number of trailing `before` lines used to locate the splice point.
pub const ANCHOR_LINES: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("failed to read original file {path}: {source}")]
    UnreadableOriginal {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("expected exactly one placeholder, found {0}")]
    PlaceholderCount(usize),

    #[error("could not locate the text preceding the placeholder in the original file")]
    AnchorNotFound,

    #[error("could not locate the text following the placeholder in the original file")]
    AfterNotFound,
}

/// Whether a block needs splicing before it can be written.
pub fn has_placeholder(content: &str) -> bool {
    content.contains(PLACEHOLDER)
}

/// Rebuild a full file from `original` and a model block containing one
/// placeholder. Pure; never touches the filesystem.
pub fn splice(original: &str, model: &str) -> Result<String, SpliceError> {
    let parts: Vec<&str> = model.split(PLACEHOLDER).collect();
    if parts.len() != 2 {
        return Err(SpliceError::PlaceholderCount(parts.len().saturating_sub(1)));
    }
    let (before, after) = (parts[0], parts[1]);

    let anchor = anchor_of(before);
    let anchor_end = if anchor.is_empty() {
        0
    } else {
        let start = original.rfind(anchor).ok_or(SpliceError::AnchorNotFound)?;
        start + anchor.len()
    };

    let after_start = if after.is_empty() {
        original.len()
    } else {
        let offset = original[anchor_end..]
            .find(after)
            .ok_or(SpliceError::AfterNotFound)?;
        anchor_end + offset
    };

    let omitted = &original[anchor_end..after_start];
    debug!(
        anchor_end,
        after_start,
        omitted_bytes = omitted.len(),
        "spliced placeholder"
    );

    let mut out = String::with_capacity(before.len() + omitted.len() + after.len());
    out.push_str(before);
    out.push_str(omitted);
    out.push_str(after);
    Ok(out)
}

/// Read the original at `path` and splice `model` into it.
pub fn splice_file(path: &Path, model: &str) -> Result<String, SpliceError> {
    let original =
        std::fs::read_to_string(path).map_err(|source| SpliceError::UnreadableOriginal {
            path: path.display().to_string(),
            source,
        })?;
    splice(&original, model)
}

/// The last `ANCHOR_LINES` newline-separated segments of `before`.
fn anchor_of(before: &str) -> &str {
    let mut newlines = before.rmatch_indices('\n').map(|(i, _)| i);
    // `n` segments end at the string's end and start after the n-th newline
    // counted from the back.
    match newlines.nth(ANCHOR_LINES - 1) {
        Some(idx) => &before[idx + 1..],
        None => before,
    }
}
