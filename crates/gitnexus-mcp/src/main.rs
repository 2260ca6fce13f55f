//! GitNexus MCP gateway daemon entry point.
//!
//! ```bash
//! # Serve on the default shared port (54319)
//! gitnexus-mcp serve
//!
//! # Serve on a custom port
//! gitnexus-mcp serve --port 61000
//! ```
//!
//! Configuration comes from the environment (`GITNEXUS_TOKEN`,
//! `GITNEXUS_AGENT`, `GITNEXUS_TIMEOUT_QUICK`, `GITNEXUS_TIMEOUT_HEAVY`,
//! `GITNEXUS_DEBUG`, `LOG_LEVEL`); the CLI only picks the port. Exit code is
//! 0 on graceful shutdown, non-zero when an error escapes the top level.

use std::env;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use gitnexus_core::resilience::CircuitBreaker;
use gitnexus_core::Config;
use gitnexus_mcp::{logging, Bridge, Handlers, McpServer};

/// Parsed CLI arguments.
///
/// Deliberately minimal: one subcommand, one flag. Manual parsing keeps the
/// binary free of an argument-parser dependency it doesn't need.
struct CliArgs {
    serve: bool,
    port: Option<u16>,
    help: bool,
}

impl CliArgs {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut cli = CliArgs {
            serve: false,
            port: None,
            help: false,
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "serve" => cli.serve = true,
                "--help" | "-h" => cli.help = true,
                "--port" => {
                    i += 1;
                    if i < args.len() {
                        if let Ok(port) = args[i].parse::<u16>() {
                            cli.port = Some(port);
                        }
                    }
                }
                _ => {} // Ignore unknown arguments
            }
            i += 1;
        }

        cli
    }
}

fn print_help() {
    eprintln!(
        r#"GitNexus MCP gateway

USAGE:
    gitnexus-mcp serve [OPTIONS]

OPTIONS:
    --port <PORT>    Shared hub/peer WebSocket port (default: 54319)
    --help, -h       Show this help message

ENVIRONMENT VARIABLES:
    GITNEXUS_TOKEN           Preshared bridge token; generated and logged when unset
    GITNEXUS_AGENT           Agent name tagged onto logs and forwarded requests
    GITNEXUS_TIMEOUT_QUICK   Quick-tool deadline in milliseconds (default: 60000)
    GITNEXUS_TIMEOUT_HEAVY   Heavy-tool deadline in milliseconds (default: 120000)
    GITNEXUS_DEBUG           "true" adds diagnostic details to error envelopes
    LOG_LEVEL                Log level (error, warn, info, debug, trace; default: info)

The first daemon on a port becomes the hub and owns the browser connection;
later daemons join it as peers. Stdout carries MCP JSON-RPC exclusively; all
logs go to stderr as JSON lines."#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();

    if cli.help || !cli.serve {
        print_help();
        return Ok(());
    }

    // stderr only: stdout must stay clean for the protocol.
    logging::init();

    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!(
        port = config.port,
        agent = %config.agent_name,
        "GitNexus MCP gateway starting"
    );

    // Resilience singletons first, then the bridge election, then stdio.
    let breaker = Arc::new(CircuitBreaker::new());
    let bridge = Bridge::start(config.clone()).await;

    bridge.subscribe_context(|context| match context {
        Some(snapshot) => info!(
            project = %snapshot.project_name,
            files = snapshot.stats.file_count,
            "context snapshot updated"
        ),
        None => info!("context snapshot cleared"),
    });

    let handlers = Arc::new(Handlers::new(Arc::clone(&bridge), breaker, config));
    let server = McpServer::new(handlers);

    // First signal wins; the watch flag stops the accept loop idempotently.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    if let Err(err) = server.run(shutdown_rx).await {
        error!(error = %err, "server loop failed");
        bridge.shutdown().await;
        return Err(err);
    }

    // Drain: let in-flight calls finish, then drop the sockets.
    info!(grace = ?gitnexus_mcp::server::DRAIN_GRACE, "draining in-flight requests");
    tokio::time::sleep(gitnexus_mcp::server::DRAIN_GRACE).await;
    bridge.shutdown().await;

    info!("gateway shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            error!(error = %err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
