use crate::types::Trend;

/// Classify the long SMA's direction against its value `lookback` valid rows ago.
/// `band` is the relative move needed to leave `Flat` (0.005 = 0.5%).
pub fn classify_trend(current: f64, prior: f64, band: f64) -> Trend {
    if current > prior * (1.0 + band) {
        Trend::Up
    } else if current < prior * (1.0 - band) {
        Trend::Down
    } else {
        Trend::Flat
    }
}
