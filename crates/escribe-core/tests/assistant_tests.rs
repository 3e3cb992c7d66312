use escribe_core::assistant::{AskOptions, AssistantReply, AssistantTransport, ConversationManager};
use escribe_core::{AssistantRequest, EscribeError, Message, Project, PromptMode, Role};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Mock transport that replays scripted outcomes and records every request.
struct MockTransport {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<AssistantRequest>>,
}

impl MockTransport {
    fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(String::from).map_err(String::from))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<AssistantRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn last_request(&self) -> AssistantRequest {
        self.requests().last().cloned().expect("no request sent")
    }
}

#[async_trait::async_trait]
impl AssistantTransport for MockTransport {
    async fn send(&self, request: &AssistantRequest) -> escribe_core::error::Result<Message> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Mock response".to_string()));
        next.map(Message::assistant).map_err(EscribeError::Transport)
    }
}

/// Transport that blocks until released, for observing the loading state.
struct GatedTransport {
    started: Notify,
    release: Notify,
}

#[async_trait::async_trait]
impl AssistantTransport for GatedTransport {
    async fn send(&self, _request: &AssistantRequest) -> escribe_core::error::Result<Message> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(Message::assistant("finally"))
    }
}

fn manager(transport: &Arc<MockTransport>) -> ConversationManager {
    ConversationManager::new(transport.clone())
}

#[tokio::test]
async fn test_ask_records_user_and_assistant_turns() {
    let transport = MockTransport::new(vec![Ok("A sharper sentence.")]);
    let manager = manager(&transport);

    let reply = manager.ask("a dull sentence", AskOptions::new()).await;

    assert_eq!(reply, AssistantReply::Text("A sharper sentence.".into()));
    let history = manager.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(
        history[0].content,
        "Rewrite the following text to improve clarity and style:\n\na dull sentence"
    );
    assert_eq!(history[1], Message::assistant("A sharper sentence."));
    assert_eq!(manager.last_prompt().as_deref(), Some("a dull sentence"));
    assert_eq!(manager.response(), Some(reply));
    assert!(!manager.is_loading());
    assert!(manager.error().is_none());
}

#[tokio::test]
async fn test_brainstorm_mode_templates_outbound_prompt() {
    let transport = MockTransport::new(vec![Ok("ideas")]);
    let manager = manager(&transport);

    manager
        .ask("a lighthouse keeper", AskOptions::new().with_mode(PromptMode::Brainstorm))
        .await;

    let request = transport.last_request();
    assert_eq!(request.messages.len(), 1);
    assert!(request.messages[0]
        .content
        .starts_with("Brainstorm ideas for the following text:\n\n"));
}

#[tokio::test]
async fn test_outbound_list_excludes_new_turn_from_snapshot() {
    let transport = MockTransport::new(vec![Ok("first answer"), Ok("second answer")]);
    let manager = manager(&transport);

    manager.ask("first", AskOptions::new()).await;
    manager.ask("second", AskOptions::new()).await;

    let requests = transport.requests();
    assert_eq!(requests[0].messages.len(), 1);

    let second = &requests[1].messages;
    assert_eq!(second.len(), 3);
    assert_eq!(second[0].role, Role::User);
    assert!(second[0].content.ends_with("first"));
    assert_eq!(second[1], Message::assistant("first answer"));
    assert!(second[2].content.ends_with("second"));
    assert_eq!(manager.history().len(), 4);
}

#[tokio::test]
async fn test_history_never_exceeds_cap() {
    let transport = MockTransport::new(vec![]);
    let manager = manager(&transport);

    for i in 0..10 {
        manager.ask(&format!("question {}", i), AskOptions::new()).await;
        assert!(manager.history().len() <= 6);
    }

    let history = manager.history();
    assert_eq!(history.len(), 6);
    assert!(history[0].content.ends_with("question 7"));

    // Outbound list is capped history plus the new prompt.
    assert_eq!(transport.last_request().messages.len(), 7);
}

#[tokio::test]
async fn test_custom_history_limit() {
    let transport = MockTransport::new(vec![]);
    let manager = ConversationManager::new(transport.clone()).with_history_limit(2);

    manager.ask("one", AskOptions::new()).await;
    manager.ask("two", AskOptions::new()).await;

    assert_eq!(manager.history_limit(), 2);
    assert_eq!(manager.history().len(), 2);
    assert!(manager.history()[0].content.ends_with("two"));
}

#[tokio::test]
async fn test_display_message_is_stored_payload_is_sent() {
    let transport = MockTransport::new(vec![Ok("answer")]);
    let manager = manager(&transport);

    manager
        .ask(
            "long templated context",
            AskOptions::new().with_display_message("short question"),
        )
        .await;

    let history = manager.history();
    assert_eq!(history[0].content, "short question");
    assert_eq!(
        history[0].original_prompt.as_deref(),
        Some("Rewrite the following text to improve clarity and style:\n\nlong templated context")
    );
    assert!(transport.last_request().messages[0]
        .content
        .ends_with("long templated context"));
}

#[tokio::test]
async fn test_section_content_forwarded_not_stored() {
    let transport = MockTransport::new(vec![Ok("ok")]);
    let manager = manager(&transport);

    manager
        .ask("tighten this", AskOptions::new().with_section_content("The whole chapter"))
        .await;

    assert_eq!(
        transport.last_request().section_content.as_deref(),
        Some("The whole chapter")
    );
    assert!(manager
        .history()
        .iter()
        .all(|m| !m.content.contains("The whole chapter")));
}

#[tokio::test]
async fn test_structured_reply_returned_and_new_content_stored() {
    let transport = MockTransport::new(vec![Ok(r#"{"newContent":"Fixed text."}"#)]);
    let manager = manager(&transport);

    let reply = manager
        .ask("fix this txt", AskOptions::new().with_mode(PromptMode::Fix))
        .await;

    assert_eq!(reply.as_edit().unwrap().new_content, "Fixed text.");
    assert_eq!(reply.text(), "Fixed text.");
    assert_eq!(manager.history()[1], Message::assistant("Fixed text."));
}

#[tokio::test]
async fn test_unparseable_json_falls_back_to_text() {
    let transport = MockTransport::new(vec![Ok("{\"newContent\": oops")]);
    let manager = manager(&transport);

    let reply = manager.ask("rewrite", AskOptions::new()).await;
    assert_eq!(reply, AssistantReply::Text("{\"newContent\": oops".into()));
}

#[tokio::test]
async fn test_failure_becomes_warning_reply() {
    let transport = MockTransport::new(vec![Err("Incorrect API key provided")]);
    let manager = manager(&transport);

    let reply = manager.ask("anything", AskOptions::new()).await;

    assert!(reply.is_error());
    assert_eq!(reply.text(), "⚠️ Incorrect API key provided");
    assert_eq!(manager.error().as_deref(), Some("Incorrect API key provided"));
    assert_eq!(manager.response(), Some(reply));
    assert!(!manager.is_loading());

    // The user turn stays, no assistant turn is added.
    let history = manager.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test]
async fn test_next_ask_clears_previous_error() {
    let transport = MockTransport::new(vec![Err("boom"), Ok("fine")]);
    let manager = manager(&transport);

    manager.ask("one", AskOptions::new()).await;
    assert!(manager.error().is_some());

    manager.ask("two", AskOptions::new()).await;
    assert!(manager.error().is_none());
}

#[tokio::test]
async fn test_regenerate_without_prompt_is_noop() {
    let transport = MockTransport::new(vec![]);
    let manager = manager(&transport);

    assert!(manager.regenerate().await.is_none());
    assert!(manager.history().is_empty());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_regenerate_replaces_last_reply() {
    let transport = MockTransport::new(vec![Ok("draft one"), Ok("draft two")]);
    let manager = manager(&transport);

    manager
        .ask("the opening line", AskOptions::new().with_section_content("ctx"))
        .await;
    let reply = manager.regenerate().await.unwrap();

    assert_eq!(reply.text(), "draft two");
    let history = manager.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1], Message::assistant("draft two"));

    // History minus its last entry, plus the same payload.
    let request = transport.last_request();
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[0], history[0]);
    assert_eq!(request.messages[1].content, history[0].content);
    assert_eq!(request.section_content.as_deref(), Some("ctx"));
}

#[tokio::test]
async fn test_regenerate_after_failure_keeps_single_user_turn() {
    let transport = MockTransport::new(vec![Err("timeout"), Ok("recovered")]);
    let manager = manager(&transport);

    manager.ask("retry me", AskOptions::new()).await;
    let reply = manager.regenerate().await.unwrap();

    assert_eq!(reply.text(), "recovered");
    let request = transport.last_request();
    assert_eq!(request.messages.len(), 1);
    assert_eq!(manager.history().len(), 2);
}

#[tokio::test]
async fn test_clear_history_resets_everything() {
    let transport = MockTransport::new(vec![Ok("a"), Err("b")]);
    let manager = manager(&transport);

    manager.ask("one", AskOptions::new()).await;
    manager.ask("two", AskOptions::new()).await;
    manager.clear_history();

    assert!(manager.history().is_empty());
    assert!(manager.error().is_none());
    assert!(manager.last_prompt().is_none());
    assert!(manager.response().is_none());
    assert!(manager.regenerate().await.is_none());
}

#[tokio::test]
async fn test_ask_about_project_sends_all_sections() {
    let transport = MockTransport::new(vec![Ok("It is a mystery.")]);
    let manager = manager(&transport);

    let mut project = Project::new("user-1", "Whodunit").unwrap();
    let id = project.add_section("The Body").unwrap();
    project.set_section_content(&id, "A scream at midnight.", None).unwrap();

    manager.ask_about_project(&project, "What genre is this?").await;

    let history = manager.history();
    assert_eq!(history[0].content, "What genre is this?");

    let request = transport.last_request();
    assert_eq!(request.expect_structured_edit, Some(false));
    let payload = &request.messages[0].content;
    assert!(payload.contains("This is a project named \"Whodunit\". Here are all its sections:"));
    assert!(payload.contains("Chapter: The Body\n\nA scream at midnight.\n\n---\n\n"));
    assert!(payload.ends_with("Question: What genre is this?"));
}

#[tokio::test]
async fn test_second_ask_while_loading_is_rejected() {
    let transport = Arc::new(GatedTransport {
        started: Notify::new(),
        release: Notify::new(),
    });
    let manager = ConversationManager::new(transport.clone());

    let background = manager.clone();
    let first = tokio::spawn(async move { background.ask("first", AskOptions::new()).await });

    transport.started.notified().await;
    assert!(manager.is_loading());

    let rejected = manager.ask("second", AskOptions::new()).await;
    assert_eq!(rejected.text(), "⚠️ A request is already in progress");
    assert_eq!(manager.history().len(), 1);
    assert!(manager.error().is_none());

    transport.release.notify_one();
    let reply = first.await.unwrap();
    assert_eq!(reply.text(), "finally");
    assert!(!manager.is_loading());
    assert_eq!(manager.history().len(), 2);
}

#[tokio::test]
async fn test_clear_during_request_discards_late_reply() {
    let transport = Arc::new(GatedTransport {
        started: Notify::new(),
        release: Notify::new(),
    });
    let manager = ConversationManager::new(transport.clone());

    let background = manager.clone();
    let pending = tokio::spawn(async move { background.ask("first", AskOptions::new()).await });
    transport.started.notified().await;

    manager.clear_history();
    assert!(manager.history().is_empty());

    transport.release.notify_one();
    let reply = pending.await.unwrap();
    assert_eq!(reply.text(), "finally");

    assert!(manager.history().is_empty());
    assert!(manager.response().is_none());
    assert!(manager.last_prompt().is_none());
    assert!(!manager.is_loading());

    // The conversation keeps working after the discarded reply.
    transport.release.notify_one();
    let next = manager.ask("second", AskOptions::new()).await;
    assert_eq!(next.text(), "finally");
    assert_eq!(manager.history().len(), 2);
}

#[tokio::test]
async fn test_dropped_request_clears_loading() {
    let transport = Arc::new(GatedTransport {
        started: Notify::new(),
        release: Notify::new(),
    });
    let manager = ConversationManager::new(transport.clone());

    let background = manager.clone();
    let task = tokio::spawn(async move { background.ask("abandoned", AskOptions::new()).await });
    transport.started.notified().await;
    assert!(manager.is_loading());

    task.abort();
    let _ = task.await;
    assert!(!manager.is_loading());
}
