use anyhow::Result;
use colored::Colorize;

use crate::cli::ConfigAction;
use crate::config::{config_path, load_config, load_config_file, save_config};
use crate::prometheus::PrometheusClient;

pub async fn run(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show(),
        ConfigAction::SetUrl { url } => set_url(url),
    }
}

fn show() -> Result<()> {
    let config = load_config()?;
    println!("{} {}", "#".dimmed(), config_path()?.display().to_string().dimmed());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn set_url(url: String) -> Result<()> {
    // Reject URLs the client could never use before persisting them
    PrometheusClient::new(&url)?;

    let mut config = load_config_file()?;
    config.backend.url = url.trim().to_string();
    save_config(&config)?;
    println!("Backend URL set to {}", config.backend.url.cyan());
    Ok(())
}
