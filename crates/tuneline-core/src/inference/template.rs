//! Phi-3 style chat template.

use tuneline_models::bigram::{ASSISTANT_MARKER, END_MARKER, USER_MARKER};
use tuneline_training::ConversationExample;

/// Generation prompt for one user turn, ending where the assistant should speak.
#[must_use]
pub fn render_prompt(user: &str) -> String {
    format!("{USER_MARKER}\n{user}{END_MARKER}\n{ASSISTANT_MARKER}\n")
}

/// Full training text for an example: the prompt followed by the closed assistant turn.
#[must_use]
pub fn render_training_text(example: &ConversationExample) -> String {
    format!("{}{}{END_MARKER}", render_prompt(example.user()), example.assistant())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt() {
        assert_eq!(render_prompt("Hello"), "<|user|>\nHello<|end|>\n<|assistant|>\n");
    }

    #[test]
    fn test_render_training_text() {
        let example = ConversationExample::new("Hi", "Hello, you are.");
        assert_eq!(
            render_training_text(&example),
            "<|user|>\nHi<|end|>\n<|assistant|>\nHello, you are.<|end|>"
        );
    }
}
