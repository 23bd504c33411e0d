use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::prometheus::PrometheusClient;

pub mod check;
pub mod config;
pub mod dashboard;
pub mod discover;
pub mod health;
pub mod insights;
pub mod serve;
pub mod sessions;
pub mod watch;

/// Client for the configured backend
pub fn connect(config: &Config) -> Result<Arc<PrometheusClient>> {
    let client =
        PrometheusClient::with_options(&config.backend.url, config.backend.client_options())
            .with_context(|| format!("Invalid backend URL: {}", config.backend.url))?;
    Ok(Arc::new(client))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
