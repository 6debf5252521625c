//! Parsing generated text into a [`GeneratedSolution`].
//!
//! Two layouts are accepted: a JSON object with `steps`, `explanation`,
//! `final_answer` and `difficulty` (raw, inside a code fence, or embedded
//! in prose), and the sectioned text layout
//! `STEPS: / EXPLANATION: / FINAL ANSWER: / DIFFICULTY:`.

use serde_json::Value;
use thiserror::Error;

use crate::traits::GeneratedSolution;

/// Characters of the raw text quoted in parse errors.
const PREVIEW_CHARS: usize = 100;

/// Generated text could not be read as a solution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Neither JSON nor the sectioned layout was found.
    #[error("no structured solution found: {preview}")]
    NotStructured {
        /// Start of the offending text.
        preview: String,
    },
    /// JSON was found but is not a solution object.
    #[error("invalid solution JSON: {message}")]
    InvalidJson {
        /// What was wrong.
        message: String,
    },
}

/// Parse model output into a solution.
///
/// Missing fields come back empty; deciding whether the solution is usable
/// is left to the composer.
///
/// # Errors
///
/// Returns [`ParseError`] if the text has no recognisable structure.
pub fn parse_generation(text: &str) -> Result<GeneratedSolution, ParseError> {
    if let Some(value) = extract_json(text) {
        return from_json(&value);
    }
    parse_sections(text).ok_or_else(|| ParseError::NotStructured {
        preview: preview(text),
    })
}

/// Locate a JSON object in model output.
///
/// Tries the whole text, then a ```json fence, then any fence, then the
/// first balanced `{...}`.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let candidates = [
        Some(trimmed.to_string()),
        fenced(trimmed, "```json"),
        fenced(trimmed, "```"),
        balanced_object(trimmed),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|c| serde_json::from_str::<Value>(&c).ok().filter(Value::is_object))
}

fn fenced(text: &str, opener: &str) -> Option<String> {
    let start = text.find(opener)? + opener.len();
    let body = text[start..].trim_start();
    let end = body.find("```")?;
    let body = body[..end].trim();
    (!body.is_empty()).then(|| body.to_string())
}

fn balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(text[start..=start + i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn from_json(value: &Value) -> Result<GeneratedSolution, ParseError> {
    let Some(object) = value.as_object() else {
        return Err(ParseError::InvalidJson {
            message: "expected an object".into(),
        });
    };

    let steps = match object.get("steps") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(s)) => split_lines(s),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(ParseError::InvalidJson {
                message: format!("steps must be a list, got {other}"),
            })
        }
    };

    Ok(GeneratedSolution {
        steps,
        explanation: object.get("explanation").and_then(scalar_text).unwrap_or_default(),
        final_answer: object
            .get("final_answer")
            .or_else(|| object.get("answer"))
            .and_then(scalar_text)
            .unwrap_or_default(),
        difficulty: object
            .get("difficulty")
            .or_else(|| object.get("difficulty_assessment"))
            .and_then(scalar_text),
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

const STEPS: &str = "STEPS:";
const EXPLANATION: &str = "EXPLANATION:";
const FINAL_ANSWER: &str = "FINAL ANSWER:";
const DIFFICULTY: &str = "DIFFICULTY:";

/// Parse the sectioned layout. Returns `None` if no section marker exists.
fn parse_sections(text: &str) -> Option<GeneratedSolution> {
    // ASCII upper-casing keeps byte offsets aligned with `text`.
    let upper = text.to_ascii_uppercase();
    if ![STEPS, EXPLANATION, FINAL_ANSWER].iter().any(|m| upper.contains(m)) {
        return None;
    }

    let steps = section(text, &upper, STEPS, Some(EXPLANATION));
    let explanation = section(text, &upper, EXPLANATION, Some(FINAL_ANSWER));
    let final_answer = section(text, &upper, FINAL_ANSWER, Some(DIFFICULTY));
    let difficulty = section(text, &upper, DIFFICULTY, None);

    Some(GeneratedSolution {
        steps: split_lines(&steps),
        explanation,
        final_answer,
        difficulty: (!difficulty.is_empty()).then_some(difficulty),
    })
}

fn section(text: &str, upper: &str, marker: &str, next: Option<&str>) -> String {
    let Some(found) = upper.find(marker) else {
        return String::new();
    };
    let start = found + marker.len();
    let end = next
        .and_then(|n| upper[start..].find(n).map(|i| start + i))
        .unwrap_or(text.len());
    text[start..end].trim().to_string()
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}
