use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use crate::aggregate::{fetch_dashboard, DashboardMetrics, TokenType};
use crate::cli::format::{format_cost_short, format_duration, format_tokens, sparkline};
use crate::config::load_config;
use crate::time_range::TimeRangeSpec;

pub async fn run(
    range: Option<String>,
    start: Option<String>,
    end: Option<String>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let spec =
        config
            .dashboard
            .resolve_range(range.as_deref(), start.as_deref(), end.as_deref())?;
    let client = super::connect(&config)?;
    let filters = config.dashboard.filters.label_filters();

    let metrics = fetch_dashboard(&client, &spec, &filters, Utc::now()).await?;

    if json {
        return super::print_json(&metrics);
    }
    render(&metrics, &spec);
    Ok(())
}

/// Human-readable dashboard, shared with `watch`
pub fn render(metrics: &DashboardMetrics, spec: &TimeRangeSpec) {
    println!(
        "\n{}",
        format!("  Claude Code usage ({})", spec.label())
            .bold()
            .bright_yellow()
    );
    println!("{}", "  ─────────────────────────────".dimmed());

    if let Some(warning) = &metrics.warning {
        println!("  {}", warning.message.yellow());
    }

    let row = |label: &str, value: String| {
        println!("  {} {}", format!("{:>16}", label).bold(), value);
    };
    row("Cost:", format_cost_short(metrics.total_cost_usd).bright_green().to_string());
    row("Tokens:", format_tokens(metrics.total_tokens).bright_yellow().to_string());
    row("Active time:", format_duration(metrics.active_time_secs));
    row("Sessions:", metrics.session_count.to_string());
    row(
        "Lines:",
        format!(
            "{} {}",
            format!("+{}", metrics.lines_added).green(),
            format!("-{}", metrics.lines_removed).red()
        ),
    );
    row("Commits:", metrics.commit_count.to_string());
    row("Pull requests:", metrics.pull_request_count.to_string());

    if metrics.tokens_by_type.total() > 0 {
        println!("\n  {}", "Tokens by type:".bold());
        for kind in TokenType::ALL {
            println!(
                "    {} {}",
                format!("{:>16}", kind.label()).cyan(),
                format_tokens(metrics.tokens_by_type.get(kind)).dimmed()
            );
        }
    }

    if !metrics.tokens_by_model.is_empty() {
        println!("\n  {}", "By model:".bold());
        for (model, tokens) in &metrics.tokens_by_model {
            let cost = metrics
                .cost_by_model
                .get(model)
                .map(|c| format_cost_short(*c))
                .unwrap_or_default();
            println!(
                "    {} {:>8} {}",
                format!("{:>28}", model).cyan(),
                format_tokens(*tokens),
                cost.dimmed()
            );
        }
    }

    if !metrics.token_rate.is_empty() {
        let values: Vec<f64> = metrics.token_rate.iter().map(|p| p.value).collect();
        println!(
            "\n  {} {}",
            "Token rate:".bold(),
            sparkline(&values).bright_yellow()
        );
    }
    println!();
}
