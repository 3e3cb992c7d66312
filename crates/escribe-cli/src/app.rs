use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use escribe_core::assistant::{HttpTransport, LocalTransport};
use escribe_core::store::{export_project, export_section, Session};
use escribe_core::{
    AskOptions, AssistantHandler, AssistantReply, AssistantTransport, ConversationManager,
    ExportFormat, Project, PromptMode, Role, Settings, StoreClient,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::commands::{handle_command, CommandResult};

/// Pick the transport: an in-process handler with `local`, the proxy otherwise.
pub fn build_transport(
    settings: &Settings,
    local: bool,
) -> Result<(Arc<dyn AssistantTransport>, String)> {
    if local {
        let llm = settings.build_llm_client()?;
        let handler = AssistantHandler::new(llm).with_options(settings.chat_options());
        let transport: Arc<dyn AssistantTransport> = Arc::new(LocalTransport::new(handler));
        Ok((transport, format!("local ({})", settings.assistant.model)))
    } else {
        let http = HttpTransport::new(&settings.client.proxy_url);
        let label = http.endpoint().to_string();
        let transport: Arc<dyn AssistantTransport> = Arc::new(http);
        Ok((transport, label))
    }
}

/// Grounding text sent with each ask: a file, or a chapter of the open project.
struct LoadedSection {
    label: String,
    content: String,
    chapter_id: Option<String>,
}

/// REPL state around one conversation.
pub struct App {
    manager: ConversationManager,
    mode: PromptMode,
    section: Option<LoadedSection>,
    transport_label: String,
    store: Option<StoreClient>,
    session: Option<Session>,
    project: Option<Project>,
}

impl App {
    pub fn new(settings: &Settings, transport: Arc<dyn AssistantTransport>, label: String) -> Self {
        Self {
            manager: ConversationManager::new(transport)
                .with_history_limit(settings.assistant.history_limit),
            mode: PromptMode::default(),
            section: None,
            transport_label: label,
            store: settings
                .build_store_client()
                .map_err(|e| tracing::debug!("Document store disabled: {}", e))
                .ok(),
            session: None,
            project: None,
        }
    }

    pub fn with_mode(mut self, mode: PromptMode) -> Self {
        self.mode = mode;
        self
    }

    pub async fn load_section(&mut self, path: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(path).await?;
        self.section = Some(LoadedSection {
            label: path.display().to_string(),
            content,
            chapter_id: None,
        });
        Ok(())
    }

    pub async fn ask(&self, text: &str) -> AssistantReply {
        let mut options = AskOptions::new().with_mode(self.mode);
        if let Some(ref section) = self.section {
            options = options.with_section_content(section.content.clone());
        }
        self.manager.ask(text, options).await
    }

    /// Returns `false` when the user asked to quit.
    async fn dispatch(&mut self, line: &str) -> bool {
        match handle_command(line) {
            CommandResult::NotACommand => {
                let reply = self.ask(line).await;
                print_reply(&reply);
            }
            CommandResult::Quit => return false,
            CommandResult::Message(msg) => println!("{msg}"),
            CommandResult::Clear => {
                self.manager.clear_history();
                println!("History cleared.");
            }
            CommandResult::Regenerate => match self.manager.regenerate().await {
                Some(reply) => print_reply(&reply),
                None => println!("Nothing to regenerate yet."),
            },
            CommandResult::SetMode(mode) => {
                self.mode = mode;
                println!("Mode: {mode}");
            }
            CommandResult::SetSection(path) => {
                let path = PathBuf::from(path);
                match self.load_section(&path).await {
                    Ok(()) => println!("Section context: {}", path.display()),
                    Err(e) => {
                        tracing::warn!("Failed to load section {}: {}", path.display(), e);
                        eprintln!("Could not read {}: {e}", path.display());
                    }
                }
            }
            CommandResult::ClearSection => {
                self.section = None;
                println!("Section context cleared.");
            }
            CommandResult::ShowHistory => {
                let history = self.manager.history();
                if history.is_empty() {
                    println!("(empty)");
                }
                for message in history {
                    let who = match message.role {
                        Role::User => "you",
                        Role::Assistant => "assistant",
                        Role::System => "system",
                    };
                    println!("[{who}] {}", message.content);
                }
            }
            CommandResult::ShowStatus => println!("{}", self.status()),
            CommandResult::Export(path) => match self.export(Path::new(&path)) {
                Ok(written) => println!("Saved {}", written.display()),
                Err(e) => {
                    tracing::warn!("Export to {} failed: {}", path, e);
                    eprintln!("Export failed: {e}");
                }
            },
            CommandResult::AskProject(question) => match self.project.as_ref() {
                Some(project) => {
                    let reply = self.manager.ask_about_project(project, &question).await;
                    print_reply(&reply);
                }
                None => println!("Open a project first (/projects, /open <id|name>)."),
            },
            other => {
                if let Err(e) = self.run_project_command(other).await {
                    tracing::warn!("Project command failed: {}", e);
                    eprintln!("{e}");
                }
            }
        }
        true
    }

    fn store(&self) -> Result<&StoreClient> {
        self.store.as_ref().ok_or_else(|| {
            anyhow::anyhow!("Document store is not configured (set SUPABASE_URL and SUPABASE_ANON_KEY)")
        })
    }

    /// Store client carrying the session token, plus the signed-in user.
    fn signed_in(&self) -> Result<(StoreClient, &Session)> {
        let store = self.store()?;
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Sign in first (/login <email> <password>)"))?;
        Ok((store.clone().with_session(session), session))
    }

    fn open_project(&self) -> Result<&Project> {
        self.project
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Open a project first (/projects, /open <id|name>)"))
    }

    async fn run_project_command(&mut self, command: CommandResult) -> Result<()> {
        match command {
            CommandResult::Login { email, password } => {
                let session = self.store()?.sign_in_with_password(&email, &password).await?;
                println!("Signed in as {}", session.user.email.as_deref().unwrap_or(&email));
                self.session = Some(session);
                self.project = None;
            }
            CommandResult::Signup {
                email,
                password,
                username,
            } => {
                let created = self.store()?.register(&email, &password, &username).await?;
                match created {
                    Some(session) => {
                        println!("Account created. Signed in as {email}");
                        self.session = Some(session);
                        self.project = None;
                    }
                    None => println!("Check your email to confirm the account, then /login."),
                }
            }
            CommandResult::Logout => {
                self.session = None;
                self.project = None;
                self.drop_chapter_context();
                println!("Signed out.");
            }
            CommandResult::ChangePassword {
                current,
                new_password,
            } => {
                let (store, session) = self.signed_in()?;
                let email = session
                    .user
                    .email
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("This account has no email address"))?;
                store.change_password(&email, &current, &new_password).await?;
                println!("Password updated.");
            }
            CommandResult::Username(None) => {
                let (store, session) = self.signed_in()?;
                match store.get_username(&session.user.id).await? {
                    Some(name) => println!("Username: {name}"),
                    None => println!("No username set."),
                }
            }
            CommandResult::Username(Some(name)) => {
                let (store, session) = self.signed_in()?;
                if store.username_taken(name.trim()).await? {
                    anyhow::bail!("This username is already taken");
                }
                store.set_username(&session.user.id, &name).await?;
                println!("Username saved.");
            }
            CommandResult::ListProjects => {
                let (store, session) = self.signed_in()?;
                let projects = store.list_projects(&session.user.id).await?;
                if projects.is_empty() {
                    println!("No projects yet. Create one with /new-project <name>.");
                }
                for project in projects {
                    println!(
                        "  {:<10}{} ({} chapters)",
                        project.id,
                        project.name,
                        project.sections.len()
                    );
                }
            }
            CommandResult::NewProject(name) => {
                let (store, session) = self.signed_in()?;
                let project = store.create_project(&session.user.id, &name).await?;
                println!("Created {} ({})", project.name, project.id);
                self.set_project(project);
            }
            CommandResult::OpenProject(key) => {
                let (store, session) = self.signed_in()?;
                let project = store
                    .list_projects(&session.user.id)
                    .await?
                    .into_iter()
                    .find(|p| p.id == key || p.name.eq_ignore_ascii_case(&key))
                    .ok_or_else(|| anyhow::anyhow!("No project matching {key}"))?;
                println!("Opened {} ({} chapters)", project.name, project.sections.len());
                self.set_project(project);
            }
            CommandResult::RenameProject(name) => {
                let (store, _) = self.signed_in()?;
                let id = self.open_project()?.id.clone();
                store.rename_project(&id, &name).await?;
                if let Some(project) = self.project.as_mut() {
                    project.name = name.trim().to_string();
                }
                println!("Renamed.");
            }
            CommandResult::DeleteProject => {
                let (store, _) = self.signed_in()?;
                let project = self.open_project()?;
                store.delete_project(&project.id).await?;
                println!("Deleted {}.", project.name);
                self.project = None;
                self.drop_chapter_context();
            }
            CommandResult::ListChapters => {
                let project = self.open_project()?;
                if project.sections.is_empty() {
                    println!("No chapters yet. Add one with /add-chapter <name>.");
                }
                for (i, section) in project.sections.iter().enumerate() {
                    println!("  {}. {} ({} chars)", i + 1, section.name, section.content.len());
                }
            }
            CommandResult::SelectChapter(name) => {
                let section = self
                    .open_project()?
                    .sections
                    .iter()
                    .find(|s| s.name.eq_ignore_ascii_case(&name))
                    .ok_or_else(|| anyhow::anyhow!("No chapter named {name}"))?;
                self.section = Some(LoadedSection {
                    label: format!("chapter {}", section.name),
                    content: section.content.clone(),
                    chapter_id: Some(section.id.clone()),
                });
                println!("Section context: chapter {name}");
            }
            CommandResult::AddChapter(name) => {
                let (store, _) = self.signed_in()?;
                let mut project = self.open_project()?.clone();
                project.add_section(&name)?;
                store.save_sections(&project).await?;
                println!("Added chapter {}.", name.trim());
                self.project = Some(project);
            }
            CommandResult::ApplyEdit => self.apply_edit().await?,
            CommandResult::ExportProject { dir, format } => {
                let written = export_project(Path::new(&dir), self.open_project()?, format)?;
                println!("Saved {}", written.display());
            }
            other => tracing::debug!("Unhandled command: {:?}", other),
        }
        Ok(())
    }

    /// Write the last suggested edit into the selected chapter and save it.
    async fn apply_edit(&mut self) -> Result<()> {
        let (store, _) = self.signed_in()?;
        let reply = self
            .manager
            .response()
            .ok_or_else(|| anyhow::anyhow!("No suggested edit to apply"))?;
        let edit = reply
            .as_edit()
            .ok_or_else(|| anyhow::anyhow!("The last reply is not an edit"))?;
        let chapter_id = self
            .section
            .as_ref()
            .and_then(|s| s.chapter_id.clone())
            .ok_or_else(|| anyhow::anyhow!("Select a chapter first (/chapter <name>)"))?;

        let mut project = self.open_project()?.clone();
        project.set_section_content(&chapter_id, edit.new_content.clone(), None)?;
        store.save_sections(&project).await?;
        self.project = Some(project);
        if let Some(section) = self.section.as_mut() {
            section.content = edit.new_content.clone();
        }
        println!("Chapter updated.");
        Ok(())
    }

    fn set_project(&mut self, project: Project) {
        self.project = Some(project);
        self.drop_chapter_context();
    }

    /// Chapter context belongs to the project it came from.
    fn drop_chapter_context(&mut self) {
        if self.section.as_ref().is_some_and(|s| s.chapter_id.is_some()) {
            self.section = None;
        }
    }

    fn status(&self) -> String {
        let section = self
            .section
            .as_ref()
            .map(|s| s.label.clone())
            .unwrap_or_else(|| "none".into());
        let mut status = format!(
            "Backend: {}\nMode: {}\nSection: {}\nHistory: {}/{}",
            self.transport_label,
            self.mode,
            section,
            self.manager.history().len(),
            self.manager.history_limit()
        );
        if let Some(ref session) = self.session {
            status.push_str(&format!(
                "\nSigned in: {}",
                session.user.email.as_deref().unwrap_or(&session.user.id)
            ));
        }
        if let Some(ref project) = self.project {
            status.push_str(&format!("\nProject: {}", project.name));
        }
        if let Some(error) = self.manager.error() {
            status.push_str(&format!("\nLast error: {error}"));
        }
        status
    }

    fn export(&self, path: &Path) -> Result<PathBuf> {
        let reply = self
            .manager
            .response()
            .filter(|r| !r.is_error())
            .ok_or_else(|| anyhow::anyhow!("no reply to export"))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ExportFormat::from_extension)
            .unwrap_or(ExportFormat::Markdown);
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Ok(export_section(dir, name, reply.text(), format)?)
    }
}

fn print_reply(reply: &AssistantReply) {
    match reply {
        AssistantReply::Edit(edit) => println!("Suggested edit:\n{}\n", edit.new_content),
        AssistantReply::Text(_) if reply.is_error() => eprintln!("{}", reply.text()),
        AssistantReply::Text(text) => println!("{text}\n"),
    }
}

pub async fn run_single_prompt(app: &App, prompt: &str) -> Result<()> {
    let reply = app.ask(prompt).await;
    print_reply(&reply);
    if reply.is_error() {
        anyhow::bail!("assistant request failed");
    }
    Ok(())
}

pub async fn run_repl(mut app: App) -> Result<()> {
    println!("Escribe ({}). Type /help for commands.", app.transport_label);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(format!("{}> ", app.mode).as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !app.dispatch(line).await {
            break;
        }
    }
    Ok(())
}
