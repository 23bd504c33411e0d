use anyhow::{Context, Result};
use colored::Colorize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::load_config;
use crate::server::{create_router, AppState};

/// Serve the JSON API on localhost until Ctrl-C
pub async fn run(port: Option<u16>, open_browser: bool) -> Result<()> {
    let config = load_config()?;
    let port = port.unwrap_or(config.server.port);
    let backend = config.backend.url.clone();

    let state = AppState::new(config)
        .with_context(|| format!("Invalid backend URL: {}", backend))?;
    let app = create_router(Arc::new(state));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let url = format!("http://{}/api/dashboard", addr);

    println!("\n{}", "  ccpulse API".bold().bright_yellow());
    println!("{}", "  ─────────────────────────────".dimmed());
    println!("  {} {}", "Listening:".cyan(), url);
    println!("  {} {}", "Backend:".cyan(), backend.dimmed());
    println!("  {}\n", "Press Ctrl-C to stop".dimmed());
    info!(%addr, backend = %backend, "api server started");

    if open_browser {
        if let Err(e) = open::that(&url) {
            warn!(error = %e, "could not open browser");
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("API server failed")?;

    info!("api server stopped");
    Ok(())
}
