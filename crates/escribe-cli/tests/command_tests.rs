use escribe_cli::commands::{handle_command, CommandResult};
use escribe_core::{ExportFormat, PromptMode};

// --- BASIC SLASH COMMANDS ---

#[test]
fn test_help_command() {
    let result = handle_command("/help");

    if let CommandResult::Message(msg) = result {
        assert!(msg.contains("Escribe Commands"));
        assert!(msg.contains("/regenerate"));
        assert!(msg.contains("/section <path>"));
    } else {
        panic!("expected help text");
    }
}

#[test]
fn test_help_command_short_alias() {
    assert!(matches!(handle_command("/h"), CommandResult::Message(_)));
}

#[test]
fn test_quit_aliases() {
    for input in ["/exit", "/quit", "/q"] {
        assert_eq!(handle_command(input), CommandResult::Quit, "{input}");
    }
}

#[test]
fn test_clear_command() {
    assert_eq!(handle_command("/clear"), CommandResult::Clear);
}

#[test]
fn test_regenerate_and_alias() {
    assert_eq!(handle_command("/regenerate"), CommandResult::Regenerate);
    assert_eq!(handle_command("/r"), CommandResult::Regenerate);
}

#[test]
fn test_version_command() {
    if let CommandResult::Message(msg) = handle_command("/version") {
        assert!(msg.starts_with("Escribe v"));
    } else {
        panic!("expected version text");
    }
}

// --- MODES ---

#[test]
fn test_mode_sets_known_mode() {
    assert_eq!(
        handle_command("/mode fix"),
        CommandResult::SetMode(PromptMode::Fix)
    );
    assert_eq!(
        handle_command("/mode Brainstorm"),
        CommandResult::SetMode(PromptMode::Brainstorm)
    );
}

#[test]
fn test_mode_rejects_unknown_name() {
    match handle_command("/mode poetry") {
        CommandResult::Message(msg) => {
            assert!(msg.contains("Unknown mode: poetry"));
            assert!(msg.contains("summarize"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_mode_without_argument_shows_usage() {
    match handle_command("/mode") {
        CommandResult::Message(msg) => assert!(msg.starts_with("Usage: /mode")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_modes_lists_every_instruction() {
    let CommandResult::Message(msg) = handle_command("/modes") else {
        panic!("expected a listing");
    };
    for mode in PromptMode::all() {
        assert!(msg.contains(mode.as_str()));
        assert!(msg.contains(mode.instruction()));
    }
}

// --- SECTION / EXPORT ---

#[test]
fn test_section_with_path() {
    assert_eq!(
        handle_command("/section drafts/chapter one.md"),
        CommandResult::SetSection("drafts/chapter one.md".into())
    );
}

#[test]
fn test_section_without_path_shows_usage() {
    assert!(matches!(handle_command("/section"), CommandResult::Message(_)));
    assert!(matches!(handle_command("/section   "), CommandResult::Message(_)));
}

#[test]
fn test_unsection_history_status() {
    assert_eq!(handle_command("/unsection"), CommandResult::ClearSection);
    assert_eq!(handle_command("/history"), CommandResult::ShowHistory);
    assert_eq!(handle_command("/status"), CommandResult::ShowStatus);
}

#[test]
fn test_export_requires_path() {
    assert_eq!(
        handle_command("/export notes.txt"),
        CommandResult::Export("notes.txt".into())
    );
    assert!(matches!(handle_command("/export"), CommandResult::Message(_)));
}

// --- NON-COMMANDS ---

#[test]
fn test_plain_text_is_not_a_command() {
    assert_eq!(
        handle_command("make this paragraph punchier"),
        CommandResult::NotACommand
    );
}

#[test]
fn test_unknown_slash_command() {
    match handle_command("/frobnicate") {
        CommandResult::Message(msg) => assert!(msg.contains("Unknown command: /frobnicate")),
        other => panic!("unexpected {other:?}"),
    }
}

// --- ACCOUNT ---

#[test]
fn test_login_takes_email_and_password() {
    assert_eq!(
        handle_command("/login ana@example.com hunter22"),
        CommandResult::Login {
            email: "ana@example.com".into(),
            password: "hunter22".into(),
        }
    );
}

#[test]
fn test_login_with_missing_password_shows_usage() {
    match handle_command("/login ana@example.com") {
        CommandResult::Message(msg) => assert!(msg.starts_with("Usage: /login")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_signup_needs_username() {
    assert_eq!(
        handle_command("/signup ana@example.com secret123 ana_writes"),
        CommandResult::Signup {
            email: "ana@example.com".into(),
            password: "secret123".into(),
            username: "ana_writes".into(),
        }
    );
    assert!(matches!(
        handle_command("/signup ana@example.com secret123"),
        CommandResult::Message(_)
    ));
}

#[test]
fn test_passwd_and_username() {
    assert_eq!(
        handle_command("/passwd old-secret new-secret"),
        CommandResult::ChangePassword {
            current: "old-secret".into(),
            new_password: "new-secret".into(),
        }
    );
    assert_eq!(handle_command("/username"), CommandResult::Username(None));
    assert_eq!(
        handle_command("/username  ana "),
        CommandResult::Username(Some("ana".into()))
    );
    assert_eq!(handle_command("/logout"), CommandResult::Logout);
}

// --- PROJECTS ---

#[test]
fn test_project_commands_keep_full_names() {
    assert_eq!(handle_command("/projects"), CommandResult::ListProjects);
    assert_eq!(
        handle_command("/new-project The Long Winter"),
        CommandResult::NewProject("The Long Winter".into())
    );
    assert_eq!(
        handle_command("/open 42"),
        CommandResult::OpenProject("42".into())
    );
    assert_eq!(
        handle_command("/rename-project Second Draft"),
        CommandResult::RenameProject("Second Draft".into())
    );
    assert_eq!(handle_command("/delete-project"), CommandResult::DeleteProject);
}

#[test]
fn test_project_commands_without_argument_show_usage() {
    for input in ["/new-project", "/open", "/chapter", "/add-chapter", "/ask-project"] {
        match handle_command(input) {
            CommandResult::Message(msg) => assert!(msg.starts_with("Usage:"), "{input}"),
            other => panic!("unexpected {other:?} for {input}"),
        }
    }
}

#[test]
fn test_chapter_commands() {
    assert_eq!(handle_command("/chapters"), CommandResult::ListChapters);
    assert_eq!(
        handle_command("/chapter Opening Night"),
        CommandResult::SelectChapter("Opening Night".into())
    );
    assert_eq!(
        handle_command("/add-chapter Epilogue"),
        CommandResult::AddChapter("Epilogue".into())
    );
    assert_eq!(handle_command("/apply"), CommandResult::ApplyEdit);
}

#[test]
fn test_ask_project_keeps_the_whole_question() {
    assert_eq!(
        handle_command("/ask-project Who is the narrator?"),
        CommandResult::AskProject("Who is the narrator?".into())
    );
}

#[test]
fn test_export_project_format() {
    assert_eq!(
        handle_command("/export-project out"),
        CommandResult::ExportProject {
            dir: "out".into(),
            format: ExportFormat::Markdown,
        }
    );
    assert_eq!(
        handle_command("/export-project out txt"),
        CommandResult::ExportProject {
            dir: "out".into(),
            format: ExportFormat::Text,
        }
    );
    match handle_command("/export-project out pdf") {
        CommandResult::Message(msg) => assert!(msg.contains("Unknown format: pdf")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_help_lists_project_commands() {
    let CommandResult::Message(msg) = handle_command("/help") else {
        panic!("expected help text");
    };
    for command in ["/login", "/projects", "/open", "/ask-project", "/export-project"] {
        assert!(msg.contains(command), "{command}");
    }
}
