use crate::models::messages::MessageRole;

/// Fixed preamble prepended to every prompt sent to the inference server.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful and knowledgeable AI assistant.\n\
Provide clear, accurate, and well-structured responses.\n\
If you're unsure about something, admit it.";

/// Builds the prompt for one completion: the system preamble, then the last
/// `context_window` turns as alternating "User:"/"Assistant:" lines, ending
/// with a bare "Assistant:" for the model to continue. The caller is expected
/// to have appended the current user message to `history` already.
pub fn build_prompt(history: &[(MessageRole, String)], context_window: usize) -> String {
    let tail_start = history.len().saturating_sub(context_window);
    let mut lines = Vec::with_capacity(history.len() - tail_start);

    for (role, content) in &history[tail_start..] {
        let prefix = match role {
            MessageRole::User => "User: ",
            MessageRole::Assistant => "Assistant: ",
            MessageRole::System => "System: ",
        };
        lines.push(format!("{prefix}{content}"));
    }

    format!("{SYSTEM_PREAMBLE}\n\n{}\nAssistant:", lines.join("\n"))
}
