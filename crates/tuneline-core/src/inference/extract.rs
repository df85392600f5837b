//! Assistant-response extraction from raw decoded output.
//!
//! The decoded sequence still contains the prompt and chat markers. Extraction
//! tries, in order: the assistant span between `<|assistant|>` and `<|end|>`
//! (or end of text); the text with the prompt and every marker removed; the
//! raw text as-is.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// How a prediction's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionOutcome {
    /// Assistant span found between markers.
    Marked,
    /// No assistant span; prompt and markers stripped.
    MarkersStripped,
    /// No markers at all; raw output kept.
    Unmarked,
    /// Extraction produced an empty string.
    Empty,
    /// Generation failed; the record holds the error text.
    Failed,
}

impl ExtractionOutcome {
    #[must_use]
    pub const fn is_clean(self) -> bool {
        matches!(self, Self::Marked)
    }
}

fn assistant_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<\|assistant\|>\s*(.*?)(?:<\|end\||$)").expect("valid assistant pattern")
    })
}

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<\|.*?\|>").expect("valid marker pattern")
    })
}

/// Pull the assistant answer out of `generated`, which was produced from `prompt`.
#[must_use]
pub fn extract_response(generated: &str, prompt: &str) -> (String, ExtractionOutcome) {
    if let Some(span) = assistant_pattern().captures(generated).and_then(|c| c.get(1)) {
        let text = span.as_str().trim().to_string();
        let outcome =
            if text.is_empty() { ExtractionOutcome::Empty } else { ExtractionOutcome::Marked };
        return (text, outcome);
    }

    if marker_pattern().is_match(generated) {
        let without_prompt =
            if prompt.is_empty() { generated.to_string() } else { generated.replace(prompt, "") };
        let text = marker_pattern().replace_all(without_prompt.trim(), "").trim().to_string();
        let outcome = if text.is_empty() {
            ExtractionOutcome::Empty
        } else {
            ExtractionOutcome::MarkersStripped
        };
        return (text, outcome);
    }

    let outcome = if generated.trim().is_empty() {
        ExtractionOutcome::Empty
    } else {
        ExtractionOutcome::Unmarked
    };
    (generated.to_string(), outcome)
}
