use std::time::Duration;

use crate::error::{AppError, Result};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const YAHOO_API_URL: &str = "https://query1.finance.yahoo.com";
/// Visited once to obtain the session cookie the quote endpoint requires.
pub const YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";
pub const YAHOO_REFERER: &str = "https://finance.yahoo.com/";
pub const UNIVERSE_URL: &str =
    "https://raw.githubusercontent.com/datasets/s-and-p-500-companies/main/data/constituents.csv";

/// Browser-like User-Agent; the data hosts reject obvious bot clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Timeouts for the notification channel (seconds).
pub const TEXT_SEND_TIMEOUT_SECS: u64 = 10;
pub const IMAGE_SEND_TIMEOUT_SECS: u64 = 15;

/// Timeout for the universe download (seconds).
pub const UNIVERSE_TIMEOUT_SECS: u64 = 10;

/// Lower bound on the spacing between two dispatched messages.
pub const MIN_DISPATCH_DELAY_MS: u64 = 1_000;

/// Log a progress line every this many completed symbols.
pub const PROGRESS_EVERY: usize = 10;

/// Indicator windows, thresholds and scheduling knobs for one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub window_long: usize,
    pub window_atr: usize,
    pub window_rsi: usize,
    /// Max |close - sma| / sma for an alert.
    pub proximity_threshold: f64,
    /// RSI must be strictly below this value.
    pub rsi_ceiling: f64,
    /// Max analyzer invocations in flight.
    pub concurrency: usize,
    /// Spacing enforced after every dispatched message.
    pub dispatch_delay: Duration,
    /// Valid rows between the current row and the trend reference row.
    pub trend_lookback: usize,
    /// Relative SMA move that counts as a trend (0.005 = 0.5%).
    pub trend_band: f64,
    /// Valid rows handed to the chart renderer.
    pub chart_bars: usize,
    /// Calendar days of daily history requested per symbol.
    pub history_days: i64,
    /// Per-call timeout on history, market cap and chart rendering.
    pub request_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            window_long: 150,
            window_atr: 14,
            window_rsi: 14,
            proximity_threshold: 0.025,
            rsi_ceiling: 50.0,
            concurrency: 20,
            dispatch_delay: Duration::from_millis(1_500),
            trend_lookback: 5,
            trend_band: 0.005,
            chart_bars: 100,
            history_days: 730,
            request_timeout: Duration::from_secs(12),
        }
    }
}

impl ScanConfig {
    /// Bars needed before every indicator column is defined.
    pub fn warm_up(&self) -> usize {
        self.window_long.max(self.window_atr).max(self.window_rsi)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub telegram_token: String,
    pub chat_id: String,
    pub telegram_api_url: String,
    pub yahoo_api_url: String,
    pub universe_url: String,
    /// Explicit symbol list (SCAN_SYMBOLS, comma-separated). Replaces the
    /// downloaded universe when non-empty.
    pub symbols: Vec<String>,
    /// Only scan the first N symbols (SCAN_MAX_SYMBOLS, 0 = all).
    pub max_symbols: usize,
    pub scan: ScanConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::Config(format!("{key} must be set")))
        };
        let telegram_token = required("TELEGRAM_TOKEN")?;
        let chat_id = required("CHAT_ID")?;

        let defaults = ScanConfig::default();
        let scan = ScanConfig {
            window_long: parse_or(&var, "SMA_WINDOW", defaults.window_long)?,
            window_atr: parse_or(&var, "ATR_WINDOW", defaults.window_atr)?,
            window_rsi: parse_or(&var, "RSI_WINDOW", defaults.window_rsi)?,
            proximity_threshold: parse_or(&var, "PROXIMITY_THRESHOLD", defaults.proximity_threshold)?,
            rsi_ceiling: parse_or(&var, "RSI_CEILING", defaults.rsi_ceiling)?,
            concurrency: parse_or(&var, "SCAN_CONCURRENCY", defaults.concurrency)?,
            dispatch_delay: Duration::from_millis(parse_or(
                &var,
                "DISPATCH_DELAY_MS",
                defaults.dispatch_delay.as_millis() as u64,
            )?),
            history_days: parse_or(&var, "HISTORY_DAYS", defaults.history_days)?,
            request_timeout: Duration::from_secs(parse_or(
                &var,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            ..defaults
        };

        if scan.window_long == 0 || scan.window_atr == 0 || scan.window_rsi == 0 {
            return Err(AppError::Config("indicator windows must be positive".to_string()));
        }
        if scan.concurrency == 0 {
            return Err(AppError::Config("SCAN_CONCURRENCY must be at least 1".to_string()));
        }
        if scan.history_days <= 0 {
            return Err(AppError::Config("HISTORY_DAYS must be positive".to_string()));
        }
        if scan.request_timeout.is_zero() {
            return Err(AppError::Config("REQUEST_TIMEOUT_SECS must be at least 1".to_string()));
        }
        if scan.dispatch_delay < Duration::from_millis(MIN_DISPATCH_DELAY_MS) {
            return Err(AppError::Config(format!(
                "DISPATCH_DELAY_MS must be at least {MIN_DISPATCH_DELAY_MS}"
            )));
        }

        Ok(Self {
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            telegram_token,
            chat_id,
            telegram_api_url: var("TELEGRAM_API_URL").unwrap_or_else(|| TELEGRAM_API_URL.to_string()),
            yahoo_api_url: var("YAHOO_API_URL").unwrap_or_else(|| YAHOO_API_URL.to_string()),
            universe_url: var("UNIVERSE_URL").unwrap_or_else(|| UNIVERSE_URL.to_string()),
            symbols: var("SCAN_SYMBOLS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            max_symbols: parse_or(&var, "SCAN_MAX_SYMBOLS", 0)?,
            scan,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match var(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}
