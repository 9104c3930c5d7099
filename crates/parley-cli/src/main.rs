mod config;

use clap::{Parser, Subcommand};
use config::{AppConfig, SessionBackend};
use parley_agent::{AgentRuntime, LlmAgentRuntime, ToolServersConfig, ToolTransport};
use parley_gateway::GatewayServer;
use parley_session::{FileSessionStore, MemorySessionStore, SessionStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parley", about = "Parley: HTTP front for a conversational agent")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "parley.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List configured tool servers
    Tools,
}

fn init_tracing(local: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if local {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    config.apply_env(|name| std::env::var(name).ok())?;
    init_tracing(config.is_local());

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            serve(config).await?;
        }
        Commands::Tools => {
            let tools = ToolServersConfig::load(&config.mcp_config).await;
            if tools.is_empty() {
                println!("No tool servers configured.");
                println!("Declare them in {} under \"mcpServers\"", config.mcp_config.display());
            } else {
                println!("Tool servers:");
                for (name, server) in &tools.servers {
                    let state = if server.disabled { " (disabled)" } else { "" };
                    match &server.transport {
                        ToolTransport::StreamableHttp { url } => {
                            println!("  {name}: streamable-http {url}{state}");
                        }
                        ToolTransport::Stdio { command, args, .. } => {
                            println!("  {name}: stdio {command} {}{state}", args.join(" "));
                        }
                    }
                }
                println!("\nTotal: {} server(s)", tools.servers.len());
            }
        }
    }

    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let sessions: Arc<dyn SessionStore> = match config.sessions.backend {
        SessionBackend::File => {
            info!(dir = %config.sessions.dir.display(), "Using file session store");
            Arc::new(FileSessionStore::new(config.sessions.dir.clone()).await?)
        }
        SessionBackend::Memory => {
            info!("Using in-memory session store");
            Arc::new(MemorySessionStore::new())
        }
    };

    let tool_servers = ToolServersConfig::load(&config.mcp_config).await;
    info!(
        provider = ?config.model.provider,
        model_id = %config.model.model_id,
        "Initializing agent runtime"
    );
    let runtime = Arc::new(
        LlmAgentRuntime::new(config.model.clone(), sessions.clone())
            .with_tool_servers(tool_servers),
    );

    let app = GatewayServer::build_with_options(sessions, runtime.clone(), config.stream_options());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, environment = %config.server.environment, "Parley listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
