use crate::constants::conversation::MAX_HISTORY;
use crate::llm::{Message, Role};
use std::collections::VecDeque;

/// Ordered, bounded list of conversation turns. The oldest turn is evicted
/// first once the cap is reached.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: VecDeque<Message>,
    max_messages: usize,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages: MAX_HISTORY,
        }
    }

    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max;
        self.trim_if_needed();
        self
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.add_message(Message::user(content));
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.add_message(Message::assistant(content));
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push_back(message);
        self.trim_if_needed();
    }

    /// Swap the trailing assistant turn for `message`, or append when the
    /// last turn is not an assistant reply.
    pub fn replace_last_assistant(&mut self, message: Message) {
        if self.last_message().map(|m| m.role) == Some(Role::Assistant) {
            self.messages.pop_back();
        }
        self.add_message(message);
    }

    pub fn get_messages(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    /// Every turn except the newest one.
    pub fn without_last(&self) -> Vec<Message> {
        let keep = self.messages.len().saturating_sub(1);
        self.messages.iter().take(keep).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.back()
    }

    fn trim_if_needed(&mut self) {
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}
