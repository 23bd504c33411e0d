use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;

use crate::aggregate::{SessionRecord, SessionsEngine, SessionsOutcome};
use crate::cli::format::{format_cost_short, format_duration, format_tokens};
use crate::config::load_config;
use crate::usage::ProjectIndex;

pub async fn run(range: Option<String>, json: bool) -> Result<()> {
    let config = load_config()?;
    let spec = config
        .dashboard
        .resolve_range(range.as_deref(), None, None)?;
    let client = super::connect(&config)?;

    let index = ProjectIndex::scan(&config.stats.projects_dir());
    let mut engine = SessionsEngine::new(client).with_history(Arc::new(index));
    let outcome = engine.fetch(&spec).await;

    if json {
        return super::print_json(&outcome);
    }

    println!(
        "\n{}",
        format!("  Sessions ({})", spec.label()).bold().bright_yellow()
    );
    println!("{}", "  ─────────────────────────────".dimmed());

    match outcome {
        SessionsOutcome::Sessions { sessions, warning } => {
            if let Some(warning) = warning {
                println!("  {}", warning.message.yellow());
            }
            print_table(&sessions);
        }
        SessionsOutcome::NoSessions => {
            println!("  No sessions recorded in this range.");
        }
        SessionsOutcome::Disconnected { message, .. } => {
            println!("  {} {}", "not connected:".red(), message.dimmed());
            println!();
            anyhow::bail!("Metrics backend unreachable at {}", config.backend.url);
        }
        SessionsOutcome::Failed { failures } => {
            for failure in &failures {
                println!("  {} {}", failure.query.red(), failure.message.dimmed());
            }
            println!();
            anyhow::bail!("All session queries failed");
        }
    }
    println!();
    Ok(())
}

fn print_table(sessions: &[SessionRecord]) {
    println!(
        "  {:<38} {:>9} {:>8} {:>9}  {}",
        "SESSION".bold(),
        "COST".bold(),
        "TOKENS".bold(),
        "ACTIVE".bold(),
        "PROJECT".bold()
    );
    for s in sessions {
        println!(
            "  {:<38} {:>9} {:>8} {:>9}  {}",
            s.session_id.cyan(),
            format_cost_short(s.total_cost_usd),
            format_tokens(s.total_tokens),
            format_duration(s.active_time_secs),
            s.project_path.as_deref().unwrap_or("-").dimmed()
        );
    }
}
