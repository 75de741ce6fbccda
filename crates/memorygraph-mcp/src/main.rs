//! MemoryGraph MCP server binary.
//!
//! Reads configuration from the `MEMORY_*` environment (CLI flags override),
//! constructs the selected backend through the factory, and serves MCP over
//! stdio. Logging goes to stderr; stdout belongs to JSON-RPC.
//!
//! Exit codes: 0 graceful stop, 1 server error, 130 interrupted by user.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use memorygraph_core::backend::{create_backend, GraphBackend};
use memorygraph_core::config::{BackendKind, Config, ToolProfile};
use memorygraph_core::repository::MemoryRepository;

use memorygraph_mcp::protocol::stdio::StdioTransport;
use memorygraph_mcp::server::McpServer;
use memorygraph_mcp::tools::ServerState;

/// Knowledge-graph memory server for AI coding assistants (MCP over stdio).
#[derive(Parser)]
#[command(name = "memorygraph-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Knowledge-graph memory MCP server")]
struct Cli {
    /// Backend to use (sqlite|neo4j|memgraph|falkordb|falkordblite|turso|ladybugdb|cloud|auto)
    #[arg(long)]
    backend: Option<String>,

    /// Tool profile (core|extended)
    #[arg(long)]
    profile: Option<String>,

    /// Log level (DEBUG|INFO|WARNING|ERROR)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,

    /// Run a backend health check and exit
    #[arg(long)]
    health: bool,
}

fn init_logging(level: &str) {
    // Python-style level names map onto tracing directives
    let directive = match level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) -> Result<(), String> {
    if let Some(backend) = &cli.backend {
        config.backend = BackendKind::parse(backend).map_err(|e| e.to_string())?;
    }
    if let Some(profile) = &cli.profile {
        config.tool_profile = ToolProfile::parse(profile).map_err(|e| e.to_string())?;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.to_uppercase();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };
    if let Err(e) = apply_cli_overrides(&mut config, &cli) {
        eprintln!("error: {e}");
        return ExitCode::from(1);
    }

    init_logging(&config.log_level);

    if cli.show_config {
        match serde_json::to_string_pretty(&config.summary()) {
            Ok(summary) => println!("{summary}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        }
        return ExitCode::SUCCESS;
    }

    info!(
        "MemoryGraph MCP server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    // A failed startup (no reachable backend, schema init failure)
    // terminates with exit code 1 and a diagnostic log line
    let backend = match create_backend(&config).await {
        Ok(backend) => backend,
        Err(e) => {
            error!("Failed to initialize backend: {e}");
            return ExitCode::from(1);
        }
    };
    info!("Backend: {}", backend.backend_name());

    if cli.health {
        return match backend.health_check().await {
            Ok(health) => {
                let payload = serde_json::to_string_pretty(&health)
                    .unwrap_or_else(|_| format!("{health:?}"));
                println!("{payload}");
                if health.connected {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(1)
                }
            }
            Err(e) => {
                error!("Health check failed: {e}");
                ExitCode::from(1)
            }
        };
    }

    let repository = MemoryRepository::new(backend);
    if let Err(e) = repository.initialize_schema().await {
        error!("Failed to initialize schema: {e}");
        return ExitCode::from(1);
    }

    let state = Arc::new(ServerState { repository, config });
    info!("Tool profile: {}", state.config.tool_profile.to_string().to_uppercase());

    let server = McpServer::new(Arc::clone(&state));
    let transport = StdioTransport::new();

    tokio::select! {
        result = transport.run(server) => {
            match result {
                Ok(()) => {
                    info!("stdin closed, shutting down");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("Server error: {e}");
                    ExitCode::from(1)
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt signal");
            ExitCode::from(130)
        }
    }
}
