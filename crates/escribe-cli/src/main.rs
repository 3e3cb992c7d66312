use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use escribe_core::PromptMode;

mod app;
mod commands;

#[derive(Parser)]
#[command(name = "escribe")]
#[command(about = "Escribe - writing assistant for long-form projects")]
#[command(version)]
struct Cli {
    /// Ask a single question and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Prompt mode (brainstorm, outline, rewrite, summarize, fix)
    #[arg(short, long, default_value = "rewrite")]
    mode: String,

    /// File whose contents ground the conversation
    #[arg(long)]
    section: Option<PathBuf>,

    /// Call the model directly instead of going through the proxy
    #[arg(long)]
    local: bool,

    /// Assistant proxy URL (overrides ESCRIBE_PROXY_URL)
    #[arg(long)]
    proxy_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = escribe_core::Settings::load();
    if let Some(url) = cli.proxy_url {
        settings.client.proxy_url = url;
    }

    let (transport, label) = app::build_transport(&settings, cli.local)?;
    let mut app =
        app::App::new(&settings, transport, label).with_mode(PromptMode::parse(&cli.mode));

    if let Some(ref path) = cli.section {
        app.load_section(path).await?;
    }

    if let Some(prompt) = cli.prompt {
        app::run_single_prompt(&app, &prompt).await?;
    } else {
        app::run_repl(app).await?;
    }

    Ok(())
}
