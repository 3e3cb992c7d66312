use escribe_core::{ExportFormat, PromptMode};

/// Result of processing a slash command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Clear the conversation history.
    Clear,
    /// Quit the application.
    Quit,
    /// Re-send the last prompt.
    Regenerate,
    /// Switch the prompt mode used for new asks.
    SetMode(PromptMode),
    /// Load a file as section context.
    SetSection(String),
    /// Drop the section context.
    ClearSection,
    /// Print the conversation history.
    ShowHistory,
    /// Show status (mode, section, history size).
    ShowStatus,
    /// Write the last reply to a file.
    Export(String),
    Login { email: String, password: String },
    Signup { email: String, password: String, username: String },
    Logout,
    ChangePassword { current: String, new_password: String },
    /// Show the username, or set it when a name is given.
    Username(Option<String>),
    ListProjects,
    NewProject(String),
    /// Open a project by id or by name.
    OpenProject(String),
    RenameProject(String),
    DeleteProject,
    ListChapters,
    /// Use a chapter of the open project as section context.
    SelectChapter(String),
    AddChapter(String),
    /// Write the last suggested edit into the selected chapter and save.
    ApplyEdit,
    /// Ask about the whole open project.
    AskProject(String),
    ExportProject { dir: String, format: ExportFormat },
    /// Not a command - treat as regular input.
    NotACommand,
}

pub fn handle_command(input: &str) -> CommandResult {
    let parts: Vec<&str> = input.trim().splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/exit" | "/quit" | "/q" => CommandResult::Quit,
        "/clear" => CommandResult::Clear,
        "/regenerate" | "/r" => CommandResult::Regenerate,

        "/mode" => {
            if arg.is_empty() {
                CommandResult::Message(format!(
                    "Usage: /mode <name>\nModes: {}",
                    mode_names()
                ))
            } else {
                match PromptMode::all()
                    .iter()
                    .find(|m| m.as_str().eq_ignore_ascii_case(arg))
                {
                    Some(mode) => CommandResult::SetMode(*mode),
                    None => CommandResult::Message(format!(
                        "Unknown mode: {arg}. Modes: {}",
                        mode_names()
                    )),
                }
            }
        }
        "/modes" => {
            let lines: Vec<String> = PromptMode::all()
                .iter()
                .map(|m| format!("  {:<12}{}", m.as_str(), m.instruction()))
                .collect();
            CommandResult::Message(format!("Prompt modes:\n{}", lines.join("\n")))
        }

        "/section" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /section <path>".into())
            } else {
                CommandResult::SetSection(arg.to_string())
            }
        }
        "/unsection" => CommandResult::ClearSection,
        "/history" => CommandResult::ShowHistory,
        "/status" => CommandResult::ShowStatus,
        "/export" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /export <file.md|file.txt>".into())
            } else {
                CommandResult::Export(arg.to_string())
            }
        }
        "/version" => CommandResult::Message(format!("Escribe v{}", env!("CARGO_PKG_VERSION"))),

        "/login" => match words(arg).as_slice() {
            [email, password] => CommandResult::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            _ => usage("/login <email> <password>"),
        },
        "/signup" => match words(arg).as_slice() {
            [email, password, username] => CommandResult::Signup {
                email: email.to_string(),
                password: password.to_string(),
                username: username.to_string(),
            },
            _ => usage("/signup <email> <password> <username>"),
        },
        "/logout" => CommandResult::Logout,
        "/passwd" => match words(arg).as_slice() {
            [current, new_password] => CommandResult::ChangePassword {
                current: current.to_string(),
                new_password: new_password.to_string(),
            },
            _ => usage("/passwd <current> <new>"),
        },
        "/username" => {
            CommandResult::Username((!arg.is_empty()).then(|| arg.to_string()))
        }

        "/projects" => CommandResult::ListProjects,
        "/new-project" => with_arg(arg, "/new-project <name>", CommandResult::NewProject),
        "/open" => with_arg(arg, "/open <id|name>", CommandResult::OpenProject),
        "/rename-project" => {
            with_arg(arg, "/rename-project <name>", CommandResult::RenameProject)
        }
        "/delete-project" => CommandResult::DeleteProject,
        "/chapters" => CommandResult::ListChapters,
        "/chapter" => with_arg(arg, "/chapter <name>", CommandResult::SelectChapter),
        "/add-chapter" => with_arg(arg, "/add-chapter <name>", CommandResult::AddChapter),
        "/apply" => CommandResult::ApplyEdit,
        "/ask-project" => with_arg(arg, "/ask-project <question>", CommandResult::AskProject),
        "/export-project" => match words(arg).as_slice() {
            [dir] => CommandResult::ExportProject {
                dir: dir.to_string(),
                format: ExportFormat::Markdown,
            },
            [dir, ext] => match ExportFormat::from_extension(ext) {
                Some(format) => CommandResult::ExportProject {
                    dir: dir.to_string(),
                    format,
                },
                None => CommandResult::Message(format!("Unknown format: {ext}. Use md or txt.")),
            },
            _ => usage("/export-project <dir> [md|txt]"),
        },

        _ => {
            if input.starts_with('/') {
                CommandResult::Message(format!("Unknown command: {cmd}. Type /help for commands."))
            } else {
                CommandResult::NotACommand
            }
        }
    }
}

fn words(arg: &str) -> Vec<&str> {
    arg.split_whitespace().collect()
}

fn usage(text: &str) -> CommandResult {
    CommandResult::Message(format!("Usage: {text}"))
}

fn with_arg(arg: &str, usage_text: &str, make: fn(String) -> CommandResult) -> CommandResult {
    if arg.is_empty() {
        usage(usage_text)
    } else {
        make(arg.to_string())
    }
}

fn mode_names() -> String {
    PromptMode::all()
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn show_help() -> CommandResult {
    let help_text = "\
Escribe Commands

  CONVERSATION
    /clear                    Clear conversation history
    /regenerate, /r           Ask again, replacing the last reply
    /history                  Show the conversation so far

  PROMPTS
    /mode <name>              Set the prompt mode for new messages
    /modes                    List prompt modes

  SECTION
    /section <path>           Use a file as section context
    /unsection                Stop sending section context
    /export <path>            Save the last reply (.md or .txt)

  ACCOUNT
    /login <email> <password> Sign in to the document store
    /signup <email> <password> <username>
                              Create an account
    /logout                   Forget the current session
    /passwd <current> <new>   Change your password
    /username [name]          Show or set your username

  PROJECTS
    /projects                 List your projects
    /new-project <name>       Create a project and open it
    /open <id|name>           Open a project
    /rename-project <name>    Rename the open project
    /delete-project           Delete the open project
    /chapters                 List chapters of the open project
    /chapter <name>           Use a chapter as section context
    /add-chapter <name>       Add an empty chapter
    /apply                    Write the last suggested edit into the chapter
    /ask-project <question>   Ask about the whole project
    /export-project <dir> [md|txt]
                              Save every chapter into one file

  OTHER
    /status                   Show mode, section and history size
    /version                  Show version information
    /help, /h                 Show this help message
    /exit, /quit, /q          Quit";

    CommandResult::Message(help_text.into())
}
