use crate::llm::{Message, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the assistant is asked to do with the text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    Brainstorm,
    Outline,
    #[default]
    Rewrite,
    Summarize,
    Fix,
}

impl PromptMode {
    pub fn all() -> [PromptMode; 5] {
        [
            PromptMode::Brainstorm,
            PromptMode::Outline,
            PromptMode::Rewrite,
            PromptMode::Summarize,
            PromptMode::Fix,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptMode::Brainstorm => "brainstorm",
            PromptMode::Outline => "outline",
            PromptMode::Rewrite => "rewrite",
            PromptMode::Summarize => "summarize",
            PromptMode::Fix => "fix",
        }
    }

    /// Unknown names fall back to `Rewrite`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "brainstorm" => PromptMode::Brainstorm,
            "outline" => PromptMode::Outline,
            "summarize" => PromptMode::Summarize,
            "fix" => PromptMode::Fix,
            _ => PromptMode::Rewrite,
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            PromptMode::Brainstorm => "Brainstorm ideas for the following text:",
            PromptMode::Outline => "Create an outline for the following text:",
            PromptMode::Rewrite => "Rewrite the following text to improve clarity and style:",
            PromptMode::Summarize => "Summarize the following text:",
            PromptMode::Fix => "Correct the grammar and spelling in the following text:",
        }
    }
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `instruction + "\n\n" + text`.
pub fn compose_prompt(mode: PromptMode, text: &str) -> String {
    format!("{}\n\n{}", mode.instruction(), text)
}

/// System turn that grounds the model in the section being edited.
pub fn section_context_message(section_content: &str) -> Message {
    Message::system(format!(
        "The user is working on the following section of their writing project. \
         Use it as context when answering.\n\n{}",
        section_content
    ))
}

/// Prepend the grounding turn when there is section content to show.
pub fn with_section_context(messages: Vec<Message>, section_content: Option<&str>) -> Vec<Message> {
    match section_content {
        Some(content) if !content.trim().is_empty() => {
            let mut composed = Vec::with_capacity(messages.len() + 1);
            composed.push(section_context_message(content));
            composed.extend(messages);
            composed
        }
        _ => messages,
    }
}

/// True when the newest user turn asks for a rewrite or a fix.
pub fn wants_structured_edit(messages: &[Message]) -> bool {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| {
            let text = m.content.to_lowercase();
            text.contains("rewrite") || text.contains("fix")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mode_falls_back_to_rewrite() {
        assert_eq!(PromptMode::parse("poetry"), PromptMode::Rewrite);
        assert_eq!(PromptMode::parse(" Summarize "), PromptMode::Summarize);
    }

    #[test]
    fn blank_section_content_adds_nothing() {
        let messages = vec![Message::user("hello")];
        let composed = with_section_context(messages.clone(), Some("   "));
        assert_eq!(composed, messages);
    }

    #[test]
    fn sniffing_only_looks_at_last_user_turn() {
        let messages = vec![
            Message::user("please fix this"),
            Message::assistant("done"),
            Message::user("thanks, now summarize"),
        ];
        assert!(!wants_structured_edit(&messages));
    }
}
