//! Prompt text for structured solution generation.

use std::fmt::Write as _;

use crate::traits::GenerationRequest;

/// Longest evidence snippet included in a prompt, in characters.
const MAX_SNIPPET_CHARS: usize = 1_200;

/// System instruction for the generation model.
#[must_use]
pub const fn system_prompt() -> &'static str {
    r#"You are an experienced mathematics professor. Solve the student's problem so that every step can be followed without skipping ahead.

Rules:
1. Split the solution into short, ordered steps.
2. Justify each step and use standard mathematical notation.
3. Prefer the supplied reference material when it is relevant; never invent citations.
4. State the final answer on its own, without restating the working.
5. Rate the difficulty as exactly one of: beginner, intermediate, advanced.

Respond with a single JSON object in this exact format:
{
  "steps": ["First step", "Second step"],
  "explanation": "Why this approach works",
  "final_answer": "The answer",
  "difficulty": "intermediate"
}"#
}

/// User prompt for one generation attempt.
#[must_use]
pub fn user_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Solve this mathematical problem step by step.\n\nQuestion: {}",
        request.question
    );
    if let Some(topic) = request.topic {
        let _ = write!(prompt, "\nTopic: {topic}");
    }
    if let Some(difficulty) = request.requested_difficulty {
        let _ = write!(prompt, "\nPitch the explanation at a {difficulty} level.");
    }
    if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        let _ = write!(prompt, "\n\nContext: {context}");
    }

    if !request.evidence.is_empty() {
        prompt.push_str("\n\nReference material:");
        for (i, item) in request.evidence.iter().enumerate() {
            let snippet: String = item.content.chars().take(MAX_SNIPPET_CHARS).collect();
            let _ = write!(
                prompt,
                "\n[{}] ({}, relevance {:.2}) {}\n{}",
                i + 1,
                item.kind,
                item.relevance,
                item.source_id,
                snippet.trim()
            );
        }
    }

    if request.attempt > 1 {
        prompt.push_str(
            "\n\nYour previous answer could not be used. Return only the JSON object, \
             with at least one step and a non-empty final_answer and explanation.",
        );
    }
    prompt
}
