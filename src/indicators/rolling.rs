// Column builders for the indicator frame. Every function returns a vector
// aligned one-to-one with its input; `None` marks a row without enough
// trailing history.

use crate::types::Bar;

/// Arithmetic mean over the trailing `window` entries ending at each index.
/// Defined only where all `window` entries are themselves defined.
pub fn trailing_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let sum = slice.iter().try_fold(0.0, |acc, v| v.map(|v| acc + v))?;
            Some(sum / window as f64)
        })
        .collect()
}

/// Simple moving average of closes.
pub fn sma(bars: &[Bar], window: usize) -> Vec<Option<f64>> {
    let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
    trailing_mean(&closes, window)
}

/// TR = max(H - L, |H - prevClose|, |L - prevClose|). Undefined for the first bar.
pub fn true_range(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            out.push(None);
            continue;
        }
        let prev_close = bars[i - 1].close;
        let hl = bar.high - bar.low;
        let hc = (bar.high - prev_close).abs();
        let lc = (bar.low - prev_close).abs();
        out.push(Some(hl.max(hc).max(lc)));
    }
    out
}

/// Simple (non-Wilder) average true range.
pub fn atr(bars: &[Bar], window: usize) -> Vec<Option<f64>> {
    trailing_mean(&true_range(bars), window)
}

/// RSI from simple trailing means of gains and losses.
///
/// `avg_loss == 0` with a positive average gain is full strength (100).
/// Both averages zero means the window saw no movement; that row stays
/// undefined.
pub fn rsi(bars: &[Bar], window: usize) -> Vec<Option<f64>> {
    let diffs: Vec<Option<f64>> = (0..bars.len())
        .map(|i| (i > 0).then(|| bars[i].close - bars[i - 1].close))
        .collect();
    let gains: Vec<Option<f64>> = diffs.iter().map(|d| d.map(|d| d.max(0.0))).collect();
    let losses: Vec<Option<f64>> = diffs.iter().map(|d| d.map(|d| (-d).max(0.0))).collect();

    trailing_mean(&gains, window)
        .into_iter()
        .zip(trailing_mean(&losses, window))
        .map(|(gain, loss)| rsi_from_averages(gain?, loss?))
        .collect()
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        return (avg_gain > 0.0).then_some(100.0);
    }
    let rs = avg_gain / avg_loss;
    let value = 100.0 - 100.0 / (1.0 + rs);
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                date: start + Duration::days(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
            })
            .collect()
    }

    #[test]
    fn trailing_mean_warm_up() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0].iter().map(|v| Some(*v)).collect();
        let out = trailing_mean(&values, 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn trailing_mean_skips_windows_with_gaps() {
        let out = trailing_mean(&[None, Some(2.0), Some(4.0)], 2);
        assert_eq!(out, vec![None, None, Some(3.0)]);
    }

    #[test]
    fn trailing_mean_zero_window() {
        assert_eq!(trailing_mean(&[Some(1.0)], 0), vec![None]);
    }

    #[test]
    fn true_range_uses_prev_close_on_gap() {
        let mut bars = bars_from_closes(&[95.0, 112.0]);
        bars[1].high = 115.0;
        bars[1].low = 108.0;
        let tr = true_range(&bars);
        assert_eq!(tr[0], None);
        // |115 - 95| = 20 beats 115 - 108 = 7
        assert_eq!(tr[1], Some(20.0));
    }

    #[test]
    fn atr_of_constant_range() {
        // Flat closes, H - L = 2 on every bar.
        let bars = bars_from_closes(&[100.0; 20]);
        let out = atr(&bars, 14);
        assert!(out[..14].iter().all(|v| v.is_none()));
        assert!(out[14..].iter().all(|v| (v.unwrap() - 2.0).abs() < 1e-12));
    }

    #[test]
    fn rsi_all_gains_is_exactly_100() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let out = rsi(&bars_from_closes(&closes), 14);
        assert!(out[..14].iter().all(|v| v.is_none()));
        assert!(out[14..].iter().all(|v| *v == Some(100.0)));
    }

    #[test]
    fn rsi_gains_with_flat_steps_is_100() {
        // Non-decreasing with at least one rise per window.
        let closes: Vec<f64> = (0..30).map(|x| (x / 2) as f64).collect();
        let out = rsi(&bars_from_closes(&closes), 14);
        assert!(out[14..].iter().all(|v| *v == Some(100.0)));
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let out = rsi(&bars_from_closes(&closes), 14);
        assert!(out[14..].iter().all(|v| v.unwrap().abs() < 1e-12));
    }

    #[test]
    fn rsi_flat_prices_undefined() {
        let out = rsi(&bars_from_closes(&[100.0; 30]), 14);
        assert!(out.iter().all(|v| v.is_none()));
    }

    #[test]
    fn rsi_balanced_swings() {
        // Alternating +1 / -3: avg_gain = 0.5, avg_loss = 1.5 over 14 diffs.
        let mut closes = vec![100.0];
        for i in 1..30 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 1 { last + 1.0 } else { last - 3.0 });
        }
        let out = rsi(&bars_from_closes(&closes), 14);
        let v = out[29].unwrap();
        assert!((v - 25.0).abs() < 1e-9, "rsi={v}");
    }

    #[test]
    fn sma_matches_hand_computation() {
        let out = sma(&bars_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]), 5);
        assert_eq!(out[4], Some(3.0));
    }
}
