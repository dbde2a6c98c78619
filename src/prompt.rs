//! Grounded system prompt assembly for the chat gateway.

use serde::{Deserialize, Serialize};

use docgate_core::models::ScoredHit;

/// Sentence the model must answer with when the context is insufficient.
pub const NOT_FOUND_ANSWER: &str =
    "I could not find this information in the provided internal documents.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Content of the last `user` message, else the last message, else empty.
pub fn last_user_message(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .or_else(|| messages.last())
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

/// Instructions followed by a `CONTEXT:` block with one line per hit.
pub fn build_system_prompt(hits: &[ScoredHit]) -> String {
    let mut parts: Vec<String> = vec![
        "You are an internal assistant. Answer ONLY from the CONTEXT below.".to_string(),
        format!(
            "If the CONTEXT does not contain enough information, reply exactly: '{}'",
            NOT_FOUND_ANSWER
        ),
        String::new(),
        "Always answer in this JSON format:".to_string(),
        "{".to_string(),
        "  \"answer\": \"your answer\",".to_string(),
        "  \"citations\": [".to_string(),
        "    {\"source\": \"file name\", \"page\": page_number},".to_string(),
        "    ...".to_string(),
        "  ]".to_string(),
        "}".to_string(),
        String::new(),
        "If there is no information, citations = []".to_string(),
        String::new(),
        "CONTEXT:".to_string(),
    ];

    for hit in hits {
        let tag = match hit.page_number {
            Some(page) => format!("{} | page {}", hit.source, page),
            None => hit.source.clone(),
        };
        parts.push(format!("- ({}) {}", tag, hit.text));
    }
    parts.join("\n")
}
