use anyhow::{Context, Result};
use colored::Colorize;
use futures_util::future::join_all;
use std::collections::BTreeSet;

use crate::config::load_config;

/// List backend metric names matching any of the patterns
pub async fn run(patterns: Vec<String>) -> Result<()> {
    let config = load_config()?;
    let client = super::connect(&config)?;

    let lookups = patterns
        .iter()
        .map(|pattern| client.discover_metric_names(pattern));
    let results = join_all(lookups).await;

    let mut names = BTreeSet::new();
    for (pattern, result) in patterns.iter().zip(results) {
        let matched =
            result.with_context(|| format!("Failed to discover metrics matching {:?}", pattern))?;
        names.extend(matched);
    }

    if names.is_empty() {
        println!(
            "No metrics matching {}. Is Claude Code telemetry exported to {}?",
            patterns.join(", ").yellow(),
            config.backend.url
        );
        return Ok(());
    }

    for name in &names {
        println!("{}", name);
    }
    Ok(())
}
