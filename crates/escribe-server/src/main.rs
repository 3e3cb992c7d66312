use anyhow::{Context, Result};
use clap::Parser;
use escribe_core::{AssistantHandler, Settings};

#[derive(Parser)]
#[command(name = "escribe-server")]
#[command(about = "Escribe assistant proxy - forwards chat requests to OpenAI")]
#[command(version)]
struct Cli {
    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Chat model to request
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load();
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(model) = cli.model {
        settings.assistant.model = model;
    }

    let llm = settings.build_llm_client()?;
    let handler = AssistantHandler::new(llm).with_options(settings.chat_options());

    let server = escribe_server::start(&settings.bind_address(), handler)
        .context("failed to start assistant proxy")?;
    println!("Server running on port {}", server.port());

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            shutdown.shutdown();
        }
    });

    server.wait().await;
    Ok(())
}
