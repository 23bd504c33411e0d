use rust_decimal::{Decimal, RoundingStrategy};

fn round_half_up(cost: Decimal, dp: u32) -> Decimal {
    cost.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Compact cost for a status line: two decimals from one dollar up, three below
pub fn format_cost_short(cost: Decimal) -> String {
    let mills = round_half_up(cost, 3);
    if mills >= Decimal::ONE {
        format!("${:.2}", round_half_up(cost, 2))
    } else {
        format!("${:.3}", mills)
    }
}

/// 1234 → "1.2K", 2_500_000 → "2.5M"
pub fn format_tokens(tokens: u64) -> String {
    let value = tokens as f64;
    if tokens >= 1_000_000_000 {
        format!("{:.1}B", value / 1e9)
    } else if tokens >= 1_000_000 {
        format!("{:.1}M", value / 1e6)
    } else if tokens >= 1_000 {
        format!("{:.1}K", value / 1e3)
    } else {
        tokens.to_string()
    }
}

/// Seconds as "1h 05m", "12m 30s" or "45s"
pub fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h {:02}m", h, m)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 B".to_string();
    }
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// "+12.5%", "-3.0%", or "n/a" when undefined
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(pct) => format!("{:+.1}%", pct),
        None => "n/a".to_string(),
    }
}

/// Unicode sparkline for a short series
pub fn sparkline(values: &[f64]) -> String {
    const TICKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let max = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    values
        .iter()
        .map(|v| {
            if max <= 0.0 || !v.is_finite() || *v <= 0.0 {
                TICKS[0]
            } else {
                let idx = ((v / max) * (TICKS.len() - 1) as f64).round() as usize;
                TICKS[idx.min(TICKS.len() - 1)]
            }
        })
        .collect()
}
