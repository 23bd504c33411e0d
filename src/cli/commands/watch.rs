use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::aggregate::{fetch_dashboard, spawn_refresh_loop, AggregateError};
use crate::config::load_config;

/// Re-render the dashboard every interval until Ctrl-C
pub async fn run(range: Option<String>, interval: Option<u64>) -> Result<()> {
    let config = load_config()?;
    let spec = config
        .dashboard
        .resolve_range(range.as_deref(), None, None)?;
    let client = super::connect(&config)?;
    let filters = Arc::new(config.dashboard.filters.label_filters());
    let period = interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.dashboard.refresh_interval());

    info!(interval_secs = period.as_secs(), range = %spec.label(), "watching dashboard");

    let handle = spawn_refresh_loop(period, move || {
        let client = Arc::clone(&client);
        let filters = Arc::clone(&filters);
        async move {
            match fetch_dashboard(&client, &spec, &filters, Utc::now()).await {
                Ok(metrics) => super::dashboard::render(&metrics, &spec),
                Err(AggregateError::Disconnected(message)) => {
                    println!("  {} {}", "not connected:".red(), message.dimmed());
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    println!("\n  {}", "Stopping...".dimmed());
    handle.stop().await;
    Ok(())
}
