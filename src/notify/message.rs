use crate::types::{ScanSummary, Snapshot, Trend};

pub const UNIVERSE_FAILURE_TEXT: &str = "❌ Failed to fetch the ticker universe.";

/// Human label for a market cap: "2.95B", "450.00M", raw integer, or "N/A".
pub fn market_cap_label(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v >= 1_000_000_000.0 => format!("{:.2}B", v / 1_000_000_000.0),
        Some(v) if v.is_finite() && v >= 1_000_000.0 => format!("{:.2}M", v / 1_000_000.0),
        Some(v) if v.is_finite() && v >= 0.0 => format!("{}", v.round() as u64),
        _ => "N/A".to_string(),
    }
}

/// Markdown caption sent with the chart.
pub fn alert_caption(
    symbol: &str,
    snapshot: &Snapshot,
    distance_pct: f64,
    trend: Trend,
    market_cap_label: &str,
    sma_window: usize,
) -> String {
    let current = &snapshot.current;
    format!(
        "🔔 *Stock Alert: {symbol}*\n\
         Price: ${:.2}\n\
         SMA {sma_window}: ${:.2} (Dist: {:.1}%)\n\
         Trend: {}\n\
         RSI: {:.1}\n\
         Cap: {market_cap_label}\n\
         ATR: {:.2}",
        current.bar.close,
        current.sma_long,
        distance_pct * 100.0,
        trend.label(),
        current.rsi,
        current.atr,
    )
}

pub fn summary_text(summary: &ScanSummary) -> String {
    format!(
        "✅ Scan finished. Scanned {} symbols, found {} alerts.",
        summary.symbols_scanned, summary.alerts_found
    )
}
