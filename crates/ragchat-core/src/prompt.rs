//! Prompt templates for retrieval augmentation.
//!
//! Pure string building: greeting detection, context assembly from query
//! matches, and the final augmented prompt. The retrieval itself lives in
//! the app crate's `augment` module.

use crate::models::QueryMatch;

/// Instruction returned in place of retrieval when the user only greets.
pub const GREETING_INSTRUCTION: &str =
    "The user greeted the assistant. Respond warmly and ask how you can help.";

/// Reply the model is told to give when the context does not cover the question.
pub const INSUFFICIENT_CONTEXT_REPLY: &str =
    "I don't have enough information to answer that question.";

/// Greeting tokens recognised when none are configured.
pub const DEFAULT_GREETINGS: [&str; 4] = ["hi", "hello", "hey", "hola"];

/// Returns `true` when the trimmed, lower-cased query is exactly one of
/// `greetings`. This is an exact token match, not a classifier.
///
/// ```rust
/// use ragchat_core::prompt::is_greeting;
///
/// let greetings = vec!["hi".to_string(), "hey".to_string()];
/// assert!(is_greeting(" HEY ", &greetings));
/// assert!(!is_greeting("hey there", &greetings));
/// ```
pub fn is_greeting(query: &str, greetings: &[String]) -> bool {
    let normalized = query.trim().to_lowercase();
    greetings.iter().any(|g| g.trim().to_lowercase() == normalized)
}

/// Join the text of every match, in rank order, separated by blank lines.
pub fn build_context(matches: &[QueryMatch]) -> String {
    matches
        .iter()
        .map(|m| m.metadata.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the composite prompt: context block, the literal question, then
/// the answer-from-context instruction.
pub fn augmented_prompt(context: &str, question: &str) -> String {
    format!(
        "Context from your documents:\n{}\n\nUser's question: {}\n\nPlease answer the question based on the provided context. If the context doesn't contain relevant information, say \"{}\"",
        context, question, INSUFFICIENT_CONTEXT_REPLY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordMetadata;

    fn defaults() -> Vec<String> {
        DEFAULT_GREETINGS.iter().map(|g| g.to_string()).collect()
    }

    fn hit(text: &str) -> QueryMatch {
        QueryMatch {
            id: "x".to_string(),
            score: 0.9,
            metadata: RecordMetadata {
                text: text.to_string(),
                filename: "x.pdf".to_string(),
                document_id: "x".to_string(),
            },
        }
    }

    #[test]
    fn test_greetings_match_case_and_whitespace_insensitively() {
        let g = defaults();
        assert!(is_greeting("hi", &g));
        assert!(is_greeting("Hello", &g));
        assert!(is_greeting(" HEY ", &g));
        assert!(is_greeting("hola\n", &g));
    }

    #[test]
    fn test_greeting_requires_exact_token() {
        let g = defaults();
        assert!(!is_greeting("hi there", &g));
        assert!(!is_greeting("hello?", &g));
        assert!(!is_greeting("", &g));
    }

    #[test]
    fn test_empty_greeting_list_never_matches() {
        assert!(!is_greeting("hi", &[]));
    }

    #[test]
    fn test_context_joins_with_blank_lines() {
        let ctx = build_context(&[hit("first"), hit("second"), hit("third")]);
        assert_eq!(ctx, "first\n\nsecond\n\nthird");
    }

    #[test]
    fn test_augmented_prompt_layout() {
        let prompt = augmented_prompt("some context", "What is the refund policy?");
        assert!(prompt.starts_with("Context from your documents:\nsome context\n\n"));
        assert!(prompt.contains("User's question: What is the refund policy?\n\n"));
        assert!(prompt.ends_with(&format!("say \"{}\"", INSUFFICIENT_CONTEXT_REPLY)));
        let ctx_pos = prompt.find("some context").unwrap();
        let q_pos = prompt.find("User's question").unwrap();
        assert!(ctx_pos < q_pos);
    }
}
