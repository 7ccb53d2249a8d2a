use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use whatsapp_ragent::core::config::{DEFAULT_SESSION_DIR, WHATSAPP_WEB_URL};
use whatsapp_ragent::mcp::McpServer;
use whatsapp_ragent::{ActionRegistry, ChromeBrowser, Config, DefaultClient, SelectorTable};

/// Serve WhatsApp Web tools to an MCP client over stdio.
#[derive(Parser, Debug)]
#[command(name = "whatsapp-ragent")]
#[command(version)]
struct Cli {
    /// Browser profile directory holding the WhatsApp Web login
    #[arg(long, default_value = DEFAULT_SESSION_DIR)]
    session_dir: PathBuf,

    /// Default for `connect_whatsapp` calls that do not pass `headless`
    #[arg(long)]
    headless: bool,

    /// JSON file overriding the built-in selector table
    #[arg(long)]
    selectors: Option<PathBuf>,

    #[arg(long, default_value = WHATSAPP_WEB_URL)]
    app_url: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries JSON-RPC responses only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::default().with_session_dir(&cli.session_dir);
    config.browser.app_url = cli.app_url.clone();
    config.browser.headless = cli.headless;

    if let Some(path) = &cli.selectors {
        config.selectors = SelectorTable::from_json_file(path)
            .with_context(|| format!("loading selectors from {}", path.display()))?;
        info!(path = %path.display(), "using selector overrides");
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = build_config(&cli)?;
    let registry = ActionRegistry::<ChromeBrowser>::with_whatsapp_tools();
    info!(
        tools = ?registry.list_actions(),
        session_dir = %cli.session_dir.display(),
        "MCP server ready on stdin"
    );
    let mut server = McpServer::new(registry, DefaultClient::new(ChromeBrowser::new(), config));

    let served = tokio::select! {
        result = server.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };
    if let Err(e) = &served {
        error!(error = %e, "server stopped");
    }

    server.shutdown().await;
    info!("browser closed");
    served
}
