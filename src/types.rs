use chrono::NaiveDate;

use crate::error::ProviderError;

// ---------------------------------------------------------------------------
// Price history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Daily bars for one symbol, strictly increasing by date. Gaps are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// `symbol` only labels validation errors.
    pub fn new(symbol: &str, bars: Vec<Bar>) -> Result<Self, ProviderError> {
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ProviderError::Malformed(format!(
                    "{symbol}: dates not strictly increasing at {}",
                    pair[1].date
                )));
            }
        }
        if let Some(bad) = bars.iter().find(|b| {
            ![b.open, b.high, b.low, b.close].iter().all(|v| v.is_finite())
        }) {
            return Err(ProviderError::Malformed(format!(
                "{symbol}: non-finite price on {}",
                bad.date
            )));
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

/// A bar with every derived column defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub bar: Bar,
    pub sma_long: f64,
    pub atr: f64,
    pub rsi: f64,
}

/// Latest valid row plus the trend reference row a fixed number of valid rows earlier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub current: IndicatorPoint,
    pub prior: IndicatorPoint,
}

// ---------------------------------------------------------------------------
// Trend classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn name(&self) -> &'static str {
        match self {
            Trend::Up => "Up",
            Trend::Down => "Down",
            Trend::Flat => "Flat",
        }
    }

    /// Name with a colour marker, used in captions.
    pub fn label(&self) -> &'static str {
        match self {
            Trend::Up => "Up 🟢",
            Trend::Down => "Down 🔴",
            Trend::Flat => "Flat ⚪",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Rendered chart bytes plus what the channel needs to upload them.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub file_name: String,
}

impl ChartImage {
    pub fn is_raster(&self) -> bool {
        matches!(self.media_type, "image/png" | "image/jpeg")
    }
}

#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub symbol: String,
    pub snapshot: Snapshot,
    pub trend: Trend,
    pub distance_pct: f64,
    pub market_cap_label: String,
    pub chart: ChartImage,
    pub message_text: String,
    /// Sort key for dispatch; the current RSI.
    pub rank_key: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub symbols_scanned: usize,
    pub alerts_found: usize,
    pub alerts_delivered: usize,
    pub symbols_skipped: usize,
}
