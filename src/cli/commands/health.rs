use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use crate::cli::format::{format_bytes, format_duration, sparkline};
use crate::config::load_config;
use crate::prometheus::fetch_backend_health;

pub async fn run(range: Option<String>, json: bool) -> Result<()> {
    let config = load_config()?;
    let spec = config
        .dashboard
        .resolve_range(range.as_deref(), None, None)?;
    let client = super::connect(&config)?;

    let health = fetch_backend_health(&client, &spec, Utc::now()).await;

    if json {
        return super::print_json(&health);
    }

    println!(
        "\n{}",
        format!("  Prometheus health ({})", config.backend.url)
            .bold()
            .bright_yellow()
    );
    println!("{}", "  ─────────────────────────────".dimmed());

    if !health.is_ready {
        println!("  {} {}\n", "Status:".bold(), "not connected".red());
        anyhow::bail!("Metrics backend unreachable at {}", config.backend.url);
    }

    let row = |label: &str, value: Option<String>| {
        println!(
            "  {} {}",
            format!("{:>18}", label).bold(),
            value.unwrap_or_else(|| "-".dimmed().to_string())
        );
    };

    row("Status:", Some("ready".green().to_string()));
    row("Version:", health.version.clone());
    row("Uptime:", health.uptime_secs.map(format_duration));
    row("Storage:", health.total_storage_bytes().map(format_bytes));
    row("Head series:", health.head_series.map(|v| format!("{:.0}", v)));
    row("Memory:", health.resident_memory_bytes.map(format_bytes));
    row("Goroutines:", health.goroutines.map(|v| format!("{:.0}", v)));
    row("Samples/sec:", health.samples_per_sec.map(|v| format!("{:.1}", v)));
    row(
        "Targets:",
        health
            .targets
            .as_ref()
            .map(|t| format!("{}/{} up", t.healthy, t.active)),
    );
    row(
        "Config reload:",
        health.config_reload_ok.map(|ok| {
            if ok {
                "ok".green().to_string()
            } else {
                "failed".red().to_string()
            }
        }),
    );

    if let Some(targets) = &health.targets {
        for issue in &targets.issues {
            println!(
                "    {} {} {}",
                issue.job.yellow(),
                issue.scrape_url.dimmed(),
                issue.last_error.red()
            );
        }
    }

    if !health.memory_series.is_empty() {
        let values: Vec<f64> = health.memory_series.iter().map(|p| p.value).collect();
        println!("\n  {} {}", "Memory:".bold(), sparkline(&values).cyan());
    }
    if !health.ingestion_series.is_empty() {
        let values: Vec<f64> = health.ingestion_series.iter().map(|p| p.value).collect();
        println!("  {} {}", "Ingestion:".bold(), sparkline(&values).cyan());
    }
    if !health.failed.is_empty() {
        println!(
            "\n  {} {}",
            "Unavailable:".dimmed(),
            health.failed.join(", ").dimmed()
        );
    }

    println!();
    Ok(())
}
