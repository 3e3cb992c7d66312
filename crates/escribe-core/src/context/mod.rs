mod history;
pub mod composer;

pub use history::ConversationHistory;
pub use composer::{compose_prompt, with_section_context, wants_structured_edit, PromptMode};
