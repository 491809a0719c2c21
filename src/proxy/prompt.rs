use crate::gemini_client::{Content, GenerationConfig};
use crate::types::ChatMessage;

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

pub const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.7,
    top_k: 40,
    top_p: 0.8,
    max_output_tokens: 2048,
};

/// Instructions prepended to the first turn of every conversation.
pub const SYSTEM_PROMPT: &str = r#"Your Name is Benge ,You are a helpful, accurate, and friendly AI assistant. Follow these guidelines in your responses:

1. Be concise and direct while maintaining a friendly tone
2. If you're unsure about something, acknowledge the uncertainty
3. Format code blocks using proper syntax highlighting
4. Use Markdown for formatting when appropriate
5. Break down complex explanations into digestible parts
6. Provide specific examples when explaining concepts
7. When discussing technical topics:
   - Include relevant code examples
   - Explain potential pitfalls
   - Suggest best practices
8. For questions about current events or time-sensitive information:
   - Clearly state if the information might be outdated
   - Suggest verifying with current sources
9. Focus on being:
   - Accurate over comprehensive
   - Practical over theoretical
   - Clear over clever

Remember: Safety and accuracy are top priorities. If a request seems harmful or inappropriate, politely decline and explain why."#;

/// What goes upstream for one conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamTurn {
    pub history: Vec<Content>,
    pub message: String,
}

/// Split a conversation into upstream history and the new message.
///
/// Everything but the last message becomes history, in order. The last
/// message is the turn to send; on a single-message conversation it is
/// prefixed with [`SYSTEM_PROMPT`]. Returns `None` for an empty conversation.
pub fn build_turn(messages: &[ChatMessage]) -> Option<UpstreamTurn> {
    let (last, earlier) = messages.split_last()?;

    let history = earlier
        .iter()
        .map(|msg| Content::text(msg.role().upstream_name(), msg.content()))
        .collect();

    let message = if earlier.is_empty() {
        format!("{}\n\nUser Query: {}", SYSTEM_PROMPT, last.content())
    } else {
        last.content().to_string()
    };

    Some(UpstreamTurn { history, message })
}
