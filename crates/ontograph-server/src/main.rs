//! Ontograph: ontology graph extraction and session server.

use std::sync::Arc;

use ontograph_core::OntographConfig;
use ontograph_server::{build_router, open_backend, AppState};
use ontograph_store::Availability;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!("Ontograph: ontology graph extraction and session server");
    println!();
    println!("Usage: ontograph [command]");
    println!();
    println!("Commands:");
    println!("  (none)                   Start the server");
    println!("  check                    Probe the configured backend and exit");
    println!("  help                     Show this help message");
    println!();
    println!("Environment:");
    println!("  PORT                     HTTP port (default 3000)");
    println!("  REDIS_URL                redis://host:port, or memory:// for an in-process store");
    println!("  ONTOGRAPH_OP_TIMEOUT_MS  Per-command backend timeout (default 2000)");
    println!("  ONTOGRAPH_HEALTH_TTL_MS  Backend probe cache interval (default 5000)");
    println!("  ONTOGRAPH_LLM_CONFIG     LLM provider settings file (default data/llm-config.json)");
    println!("  ONTOGRAPH_LINK_IDENTITY  endpoints | endpoints+label");
}

async fn check(config: &OntographConfig) -> anyhow::Result<bool> {
    let backend = open_backend(config)?;
    let availability = backend.availability().await;
    println!(
        "backend: {} ({:?})",
        backend.kind().unwrap_or("none"),
        availability
    );
    Ok(availability == Availability::Available)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = OntographConfig::from_env()?;

    // Handle CLI subcommands
    if args.len() > 1 {
        match args[1].as_str() {
            "--check" | "check" => {
                let ok = check(&config).await?;
                std::process::exit(if ok { 0 } else { 1 });
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'ontograph help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let port = config.port;
    let state = Arc::new(AppState::from_config(config)?);

    let llm = state.extractor.status();
    match llm.provider.as_deref() {
        Some(provider) => info!("Extraction provider: {}", provider),
        None => info!("No LLM provider configured; analysis requests will fail"),
    }

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Ontograph server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
