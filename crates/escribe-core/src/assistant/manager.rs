use super::transport::AssistantTransport;
use crate::constants::conversation::{BACKEND_UNREACHABLE, ERROR_PREFIX, REQUEST_IN_FLIGHT};
use crate::context::{compose_prompt, ConversationHistory, PromptMode};
use crate::llm::{Message, StructuredReply};
use crate::proxy::AssistantRequest;
use crate::store::Project;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// What `ask` hands back: plain text, or an edit the caller may apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssistantReply {
    Edit(StructuredReply),
    Text(String),
}

impl AssistantReply {
    fn failure(message: &str) -> Self {
        AssistantReply::Text(format!("{}{}", ERROR_PREFIX, message))
    }

    /// The text to show; for edits, the suggested content.
    pub fn text(&self) -> &str {
        match self {
            AssistantReply::Edit(edit) => &edit.new_content,
            AssistantReply::Text(text) => text,
        }
    }

    pub fn as_edit(&self) -> Option<&StructuredReply> {
        match self {
            AssistantReply::Edit(edit) => Some(edit),
            AssistantReply::Text(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AssistantReply::Text(text) if text.starts_with(ERROR_PREFIX))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Re-send the last prompt instead of adding a new user turn.
    pub regenerate: bool,
    /// Visible text for the user turn when it differs from the payload.
    pub display_message: Option<String>,
    pub mode: PromptMode,
    /// Grounding text forwarded to the proxy; never stored in history.
    pub section_content: Option<String>,
    /// Overrides the proxy's rewrite/fix sniffing when set.
    pub expect_structured_edit: Option<bool>,
}

impl AskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: PromptMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_display_message(mut self, message: impl Into<String>) -> Self {
        self.display_message = Some(message.into());
        self
    }

    pub fn with_section_content(mut self, content: impl Into<String>) -> Self {
        self.section_content = Some(content.into());
        self
    }

    pub fn expect_structured_edit(mut self, expect: bool) -> Self {
        self.expect_structured_edit = Some(expect);
        self
    }

    pub fn regenerate(mut self) -> Self {
        self.regenerate = true;
        self
    }
}

#[derive(Debug, Clone)]
struct LastPrompt {
    text: String,
    payload: String,
    section_content: Option<String>,
    expect_structured_edit: Option<bool>,
}

#[derive(Debug, Default)]
struct ConversationState {
    history: ConversationHistory,
    loading: bool,
    error: Option<String>,
    last_prompt: Option<LastPrompt>,
    response: Option<AssistantReply>,
    /// Bumped by `clear_history`; replies started under an older value are
    /// not recorded.
    generation: u64,
}

fn lock(state: &Mutex<ConversationState>) -> MutexGuard<'_, ConversationState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Conversation state for one editing surface (a section or a project view).
///
/// Holds a bounded history and the last prompt, and talks to the assistant
/// through an [`AssistantTransport`]. Only one request may be in flight; a
/// second call made while loading is answered with a warning and changes
/// nothing.
#[derive(Clone)]
pub struct ConversationManager {
    transport: Arc<dyn AssistantTransport>,
    state: Arc<Mutex<ConversationState>>,
}

impl ConversationManager {
    pub fn new(transport: Arc<dyn AssistantTransport>) -> Self {
        Self {
            transport,
            state: Arc::new(Mutex::new(ConversationState::default())),
        }
    }

    pub fn with_history_limit(self, limit: usize) -> Self {
        {
            let mut state = lock(&self.state);
            let history = std::mem::take(&mut state.history);
            state.history = history.with_max_messages(limit);
        }
        self
    }

    pub fn history(&self) -> Vec<Message> {
        lock(&self.state).history.get_messages()
    }

    pub fn history_limit(&self) -> usize {
        lock(&self.state).history.max_messages()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).loading
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    /// Raw text of the last non-regenerated prompt.
    pub fn last_prompt(&self) -> Option<String> {
        lock(&self.state).last_prompt.as_ref().map(|p| p.text.clone())
    }

    pub fn response(&self) -> Option<AssistantReply> {
        lock(&self.state).response.clone()
    }

    /// Send `text` to the assistant. Failures come back as a `⚠️ ` reply and
    /// are also recorded in [`error`](Self::error).
    pub async fn ask(&self, text: &str, options: AskOptions) -> AssistantReply {
        {
            let mut state = lock(&self.state);
            if state.loading {
                tracing::debug!("Ignoring ask while a request is in flight");
                return AssistantReply::failure(REQUEST_IN_FLIGHT);
            }
            state.loading = true;
            state.error = None;
            state.response = None;
        }
        let _loading = scopeguard::guard(Arc::clone(&self.state), |state| {
            lock(&state).loading = false;
        });

        let (request, generation) = self.prepare(text, &options);
        let result = self.transport.send(&request).await;

        let mut state = lock(&self.state);
        let current = state.generation == generation;
        if !current {
            tracing::debug!("Conversation was cleared mid-request; reply not recorded");
        }
        let reply = match result {
            Ok(message) => {
                let (turn, reply) = match StructuredReply::parse(&message.content) {
                    Some(edit) => (
                        Message::assistant(edit.new_content.clone()),
                        AssistantReply::Edit(edit),
                    ),
                    None => (
                        Message::assistant(message.content.clone()),
                        AssistantReply::Text(message.content),
                    ),
                };
                if current && options.regenerate {
                    state.history.replace_last_assistant(turn);
                } else if current {
                    state.history.add_message(turn);
                }
                reply
            }
            Err(e) => {
                let mut message = e.user_message();
                if message.is_empty() {
                    message = BACKEND_UNREACHABLE.to_string();
                }
                tracing::warn!("Assistant request failed: {}", message);
                let reply = AssistantReply::failure(&message);
                if current {
                    state.error = Some(message);
                }
                reply
            }
        };
        if current {
            state.response = Some(reply.clone());
        }
        reply
    }

    /// Snapshot the history, then record the new user turn. The outbound list
    /// is built from the snapshot so the new turn is never sent twice.
    /// Also returns the generation the request belongs to.
    fn prepare(&self, text: &str, options: &AskOptions) -> (AssistantRequest, u64) {
        let mut state = lock(&self.state);
        let generation = state.generation;

        if options.regenerate {
            let mut messages = state.history.without_last();
            let request = match &state.last_prompt {
                Some(last) => {
                    messages.push(Message::user(last.payload.clone()));
                    AssistantRequest {
                        messages,
                        section_content: options
                            .section_content
                            .clone()
                            .or_else(|| last.section_content.clone()),
                        expect_structured_edit: options
                            .expect_structured_edit
                            .or(last.expect_structured_edit),
                    }
                }
                None => {
                    messages.push(Message::user(compose_prompt(options.mode, text)));
                    AssistantRequest {
                        messages,
                        section_content: options.section_content.clone(),
                        expect_structured_edit: options.expect_structured_edit,
                    }
                }
            };
            return (request, generation);
        }

        let mut messages = state.history.get_messages();
        let payload = compose_prompt(options.mode, text);
        let visible = match &options.display_message {
            Some(display) => {
                Message::user(display.clone()).with_original_prompt(payload.clone())
            }
            None => Message::user(payload.clone()),
        };
        state.last_prompt = Some(LastPrompt {
            text: text.to_string(),
            payload: payload.clone(),
            section_content: options.section_content.clone(),
            expect_structured_edit: options.expect_structured_edit,
        });
        state.history.add_message(visible);

        messages.push(Message::user(payload));
        let request = AssistantRequest {
            messages,
            section_content: options.section_content.clone(),
            expect_structured_edit: options.expect_structured_edit,
        };
        (request, generation)
    }

    /// Re-issue the last prompt, replacing the previous reply. `None` when
    /// nothing has been asked yet.
    pub async fn regenerate(&self) -> Option<AssistantReply> {
        let text = self.last_prompt()?;
        Some(self.ask(&text, AskOptions::new().regenerate()).await)
    }

    /// Ask a question about a whole project. The full project text is sent;
    /// only the question is shown in history.
    pub async fn ask_about_project(&self, project: &Project, question: &str) -> AssistantReply {
        let context = format!(
            "This is a project named \"{}\". Here are all its sections:\n\n{}\n\nQuestion: {}",
            project.name,
            project.sections_context(),
            question
        );
        let options = AskOptions::new()
            .with_display_message(question)
            .expect_structured_edit(false);
        self.ask(&context, options).await
    }

    pub fn clear_history(&self) {
        let mut state = lock(&self.state);
        state.generation = state.generation.wrapping_add(1);
        state.history.clear();
        state.last_prompt = None;
        state.error = None;
        state.response = None;
    }
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ConversationManager")
            .field("history", &state.history.len())
            .field("loading", &state.loading)
            .field("error", &state.error)
            .finish()
    }
}
