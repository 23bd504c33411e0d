use anyhow::Result;
use colored::Colorize;

use crate::config::load_config;

/// Probe the backend and print its build info
pub async fn run() -> Result<()> {
    let config = load_config()?;
    let client = super::connect(&config)?;

    println!("\n  {} {}", "Backend:".bold(), config.backend.url.cyan());

    match client.check_connection().await {
        Ok(info) => {
            println!("  {} {}", "Status:".bold(), "connected".green());
            if !info.version.is_empty() {
                println!("  {} {}", "Version:".bold(), info.version);
            }
            if !info.go_version.is_empty() {
                println!("  {} {}", "Go:".bold(), info.go_version.dimmed());
            }
            println!();
            Ok(())
        }
        Err(e) if e.is_transport() => {
            println!("  {} {}", "Status:".bold(), "not connected".red());
            println!("  {}\n", e.to_string().dimmed());
            anyhow::bail!("Metrics backend unreachable at {}", config.backend.url)
        }
        Err(e) => {
            println!("  {} {}\n", "Status:".bold(), "error".red());
            Err(e.into())
        }
    }
}
