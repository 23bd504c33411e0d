use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::format::{format_change, format_tokens, sparkline};
use crate::config::load_config;
use crate::insights::{InsightsReport, MetricComparison, StatsCache};
use crate::time_range::parse_date;

/// Run the insights command over the local stats file
pub async fn run(days: u32, file: Option<PathBuf>, today: Option<String>, json: bool) -> Result<()> {
    let config = load_config()?;
    let path = file.unwrap_or_else(|| config.stats.cache_path());
    let today = match today {
        Some(raw) => parse_date(&raw)?,
        None => Local::now().date_naive(),
    };

    let cache = StatsCache::load(&path)
        .with_context(|| format!("Failed to load stats from {}", path.display()))?;
    let report = InsightsReport::build(&cache, days, today);

    if json {
        return super::print_json(&report);
    }

    println!(
        "\n{}",
        format!("  Claude Code Insights (last {} days)", report.days)
            .bold()
            .bright_yellow()
    );
    println!("{}", "  ─────────────────────────────".dimmed());

    println!(
        "\n  {} {} sessions, {} messages",
        "All time:".bold(),
        report.total_sessions.to_string().bright_yellow(),
        report.total_messages.to_string().bright_yellow()
    );

    let cmp = &report.comparison;
    println!(
        "\n  {} {}",
        cmp.period_label.bold(),
        cmp.comparison_label.dimmed()
    );
    comparison_row("Messages", &cmp.messages);
    comparison_row("Sessions", &cmp.sessions);
    comparison_row("Tool calls", &cmp.tool_calls);
    comparison_row("Tokens", &cmp.tokens);

    let messages: Vec<f64> = report.messages_trend.iter().map(|p| p.value as f64).collect();
    println!(
        "\n  {} {}",
        "Activity:".bold(),
        sparkline(&messages).bright_yellow()
    );

    let peak = &report.peak;
    println!("\n  {}", "Habits:".bold());
    println!(
        "    {:>20} {} days (longest {})",
        "Current streak".cyan(),
        peak.current_streak,
        peak.longest_streak
    );
    if let Some(hour) = peak.most_active_hour {
        println!("    {:>20} {:02}:00", "Peak hour".cyan(), hour);
    }
    if let Some(minutes) = peak.longest_session_minutes {
        println!("    {:>20} {} min", "Longest session".cyan(), minutes);
    }
    if let Some(day) = peak.busiest_day {
        println!(
            "    {:>20} {} ({} messages)",
            "Busiest day".cyan(),
            day,
            peak.busiest_day_messages
        );
    }
    if let Some(since) = peak.member_since {
        println!("    {:>20} {}", "Member since".cyan(), since);
    }

    let rates = &report.rates;
    println!("\n  {}", "Rates:".bold());
    rate_row("Messages/session", rates.messages_per_session, false);
    rate_row("Tools/message", rates.tool_calls_per_message, false);
    rate_row("Cache hit rate", rates.cache_hit_rate, true);
    rate_row("Output/input", rates.output_input_ratio, false);

    if !report.models.is_empty() {
        println!("\n  {}", "Models:".bold());
        for share in report.models.iter().take(10) {
            println!(
                "    {} {:>8} {}",
                format!("{:>28}", share.model).bright_blue(),
                format_tokens(share.total_tokens),
                format!("{:.1}%", share.share * 100.0).dimmed()
            );
        }
    }

    println!();
    Ok(())
}

fn comparison_row(label: &str, metric: &MetricComparison) {
    let change = format_change(metric.percent_change);
    let change = match metric.percent_change {
        Some(pct) if pct > 0.0 => change.green(),
        Some(pct) if pct < 0.0 => change.red(),
        _ => change.dimmed(),
    };
    println!(
        "    {} {:>10} {} {}",
        format!("{:>20}", label).cyan(),
        metric.current,
        format!("(prev {})", metric.previous).dimmed(),
        change
    );
}

fn rate_row(label: &str, value: Option<f64>, percent: bool) {
    let text = match value {
        Some(v) if percent => format!("{:.1}%", v * 100.0),
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    };
    println!("    {} {}", format!("{:>20}", label).cyan(), text);
}
