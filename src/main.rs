use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tower_lsp::{LspService, Server};
use tracing::{debug, info};

use drupal_language_server::config::EngineConfig;
use drupal_language_server::logging::init_logger;
use drupal_language_server::lsp::backend::DrupalBackend;

/// Language server for Drupal projects.
#[derive(Parser, Debug)]
#[command(name = "drupal-language-server", version, about, long_about = None)]
struct ServerConfig {
    /// Log level for stderr (TRACE, DEBUG, INFO, WARN, ERROR); overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Disable ANSI colors in log output
    #[arg(long)]
    no_color: bool,

    /// Do not write a session log to the user cache directory
    #[arg(long)]
    no_file_logging: bool,

    /// Use stdio as the communication channel (default)
    #[arg(long, conflicts_with = "socket")]
    stdio: bool,

    /// Listen on this TCP port and serve the first client that connects
    #[arg(long)]
    socket: Option<u16>,

    /// Workspace root to index instead of the one sent by the client
    #[arg(long)]
    root: Option<PathBuf>,

    /// Threads used by the initial workspace scan (defaults to one per core)
    #[arg(long)]
    scan_threads: Option<usize>,

    /// Additional directory names skipped by the workspace scan
    #[arg(long = "exclude-dir", value_name = "NAME")]
    exclude_dirs: Vec<String>,
}

impl ServerConfig {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig {
            scan_threads: self.scan_threads,
            ..EngineConfig::default()
        };
        config.excluded_dirs.extend(self.exclude_dirs.iter().cloned());
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerConfig::parse();
    let _guard = init_logger(args.no_color, args.log_level.as_deref(), !args.no_file_logging)
        .context("failed to initialize logging")?;
    info!("Starting {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let engine_config = args.engine_config();
    let root = args.root.clone();
    let (service, socket) = LspService::new(move |client| DrupalBackend::new(client, engine_config, root));

    match args.socket {
        Some(port) => {
            let listener = TcpListener::bind(("127.0.0.1", port))
                .await
                .with_context(|| format!("failed to bind port {}", port))?;
            info!("Listening on 127.0.0.1:{}", port);
            let (stream, peer) = listener.accept().await.context("failed to accept client")?;
            info!("Client connected from {}", peer);
            let (read, write) = tokio::io::split(stream);
            Server::new(read, write, socket).serve(service).await;
        }
        None => {
            if !args.stdio {
                debug!("No transport given, using stdio");
            }
            Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
                .serve(service)
                .await;
        }
    }

    info!("Language server stopped");
    Ok(())
}
