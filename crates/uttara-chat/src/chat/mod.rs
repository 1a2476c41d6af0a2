pub mod engine;

use crate::types::{Fragment, Message, Role};

// ============================================================================
// Fixed phrase sets
// ============================================================================

/// Canned reply for the greeting short-circuit.
pub const GREETING_REPLY: &str =
    "Hello! How can I assist you with your construction project today?";

/// Messages that short-circuit the pipeline entirely (trim + lowercase,
/// exact match).
pub const DEFAULT_GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "how are you",
    "good morning",
    "good afternoon",
    "good evening",
];

/// Prefixes that mark a message as trivial for the title heuristic.
/// Slightly wider than the greeting set.
const TRIVIAL_PREFIXES: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "how are you",
    "good morning",
    "good evening",
    "good afternoon",
    "what's up",
    "yo",
];

/// Substrings that mark a synthesized answer as having failed to use the
/// retrieved context. Matched case-insensitively. A correct answer that
/// happens to contain one of these is escalated anyway — over-triggering
/// is the accepted tradeoff.
pub const DEFAULT_VAGUE_PHRASES: &[&str] = &[
    "the provided text does not",
    "does not contain information",
    "cannot find",
    "no information available",
    "no jokes",
    "not included",
    "no content",
    "not available",
    "sorry",
    "not found",
    "not specified",
    "not mentioned",
    "not provided",
    "not in the text",
    "not in the provided text",
    "not in the documents",
    "not in the provided documents",
    "not in the context",
    "not in the context provided",
    "not in the context of the question",
    "not in the context of the provided text",
    "not in the context of the documents",
];

// ============================================================================
// Prompts
// ============================================================================

/// Prompt for the primary documents tier: answer from retrieved fragments,
/// with recent conversation for continuity.
pub fn document_answer_prompt(question: &str, fragments: &[Fragment], history: &[Message]) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant specializing in construction documents. \
         Answer the question using only the relevant information from the retrieved documents. \
         Do not mention or refer to \"the provided text\" or \"the documents\" directly in your response. \
         Be clear and concise, and explain the answer in natural language.\n",
    );

    if !history.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for msg in history {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            prompt.push_str(&format!("{}: {}\n", role, msg.content));
        }
    }

    prompt.push_str("\nRelevant Context:\n");
    for fragment in fragments {
        prompt.push_str(&fragment.content);
        prompt.push_str("\n\n");
    }

    prompt.push_str(&format!("Question: {}\n\nAnswer:", question));
    prompt
}

/// Prompt for summarizing web-search snippets into an answer.
pub fn search_summary_prompt(combined_snippets: &str) -> String {
    format!(
        "You are a helpful assistant. Use the search results below to answer \
         clearly and concisely. Do NOT say 'provided text'.\n\n\
         Search Results:\n{}\n\nAnswer:",
        combined_snippets
    )
}

/// Last-resort prompt: no retrieval context at all.
pub fn general_knowledge_prompt(question: &str) -> String {
    format!(
        "You are a helpful assistant. Answer the following question using your \
         general knowledge. Avoid saying 'provided text'.\n\nQuestion: {}",
        question
    )
}

/// Prompt for compressing a first message into a short session title.
pub fn title_prompt(message: &str) -> String {
    format!(
        "Summarize this message in 5 words or fewer to use as a chat session \
         title:\n\n{}",
        message
    )
}

// ============================================================================
// Heuristics
// ============================================================================

/// Vagueness gate for the documents tier. Pure substring matching against a
/// fixed (but configurable) phrase list — deterministic, no external call.
#[derive(Debug, Clone)]
pub struct VaguenessClassifier {
    phrases: Vec<String>,
}

impl VaguenessClassifier {
    pub fn new(phrases: &[String]) -> Self {
        Self {
            phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// True when the answer contains any blacklisted phrase,
    /// case-insensitively.
    pub fn is_vague(&self, answer: &str) -> bool {
        let lower = answer.to_lowercase();
        self.phrases.iter().any(|p| lower.contains(p.as_str()))
    }
}

/// Exact greeting match after trim + lowercase.
pub fn is_greeting(message: &str, greetings: &[String]) -> bool {
    let normalized = message.trim().to_lowercase();
    greetings.iter().any(|g| g == &normalized)
}

/// A message is worth a session title if it carries more than 3 words, or
/// does not open with a trivial greeting prefix.
pub fn is_meaningful_message(message: &str) -> bool {
    let normalized = message.trim().to_lowercase();
    normalized.split_whitespace().count() > 3
        || TRIVIAL_PREFIXES.iter().all(|g| !normalized.starts_with(g))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn classifier() -> VaguenessClassifier {
        let phrases: Vec<String> = DEFAULT_VAGUE_PHRASES.iter().map(|s| s.to_string()).collect();
        VaguenessClassifier::new(&phrases)
    }

    #[test]
    fn vague_phrase_is_detected_case_insensitively() {
        let c = classifier();
        assert!(c.is_vague("The provided text does NOT contain information about unit rates."));
        assert!(c.is_vague("I Cannot Find that item in the schedule."));
    }

    #[test]
    fn clean_answer_is_not_vague() {
        let c = classifier();
        assert!(!c.is_vague("The unit rate for item 3.1 is 450 per cubic metre."));
    }

    #[test]
    fn correct_answer_with_blacklisted_substring_still_escalates() {
        // Documented over-trigger: "sorry" anywhere flags the answer.
        let c = classifier();
        assert!(c.is_vague("The contractor must say sorry in writing per clause 12."));
    }

    #[test]
    fn greeting_matches_exactly_after_normalization() {
        let greetings: Vec<String> = DEFAULT_GREETINGS.iter().map(|s| s.to_string()).collect();
        assert!(is_greeting("  Hello  ", &greetings));
        assert!(is_greeting("GOOD MORNING", &greetings));
        assert!(!is_greeting("hello there", &greetings));
        assert!(!is_greeting("what is a BOQ", &greetings));
    }

    #[test]
    fn short_greeting_is_not_meaningful() {
        assert!(!is_meaningful_message("hi"));
        assert!(!is_meaningful_message("hey there"));
    }

    #[test]
    fn long_message_is_meaningful_even_with_greeting_prefix() {
        assert!(is_meaningful_message(
            "hello, what is the unit rate for item 3.1?"
        ));
    }

    #[test]
    fn short_non_greeting_is_meaningful() {
        assert!(is_meaningful_message("concrete grade?"));
    }

    #[test]
    fn document_prompt_includes_history_and_fragments() {
        let fragments = vec![Fragment {
            content: "Item 3.1: excavation, rate 450/m3".into(),
            score: 0.91,
        }];
        let history = vec![Message {
            user_id: "u1".into(),
            session_id: "s1".into(),
            role: Role::User,
            content: "earlier question".into(),
            created_time: Utc::now(),
            tier: None,
        }];
        let prompt = document_answer_prompt("What is the rate for 3.1?", &fragments, &history);
        assert!(prompt.contains("Item 3.1: excavation"));
        assert!(prompt.contains("user: earlier question"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn search_summary_prompt_forbids_provided_text() {
        let prompt = search_summary_prompt("snippet one\n\nsnippet two");
        assert!(prompt.contains("Do NOT say 'provided text'"));
        assert!(prompt.contains("snippet two"));
    }
}
