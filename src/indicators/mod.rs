pub mod rolling;

use crate::config::ScanConfig;
use crate::types::{Bar, IndicatorPoint, PriceSeries, Snapshot};

/// One row of the frame. Derived columns are `None` until their window is full.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorRow {
    pub bar: Bar,
    pub sma_long: Option<f64>,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
}

impl IndicatorRow {
    fn valid(&self) -> Option<IndicatorPoint> {
        Some(IndicatorPoint {
            bar: self.bar,
            sma_long: self.sma_long?,
            atr: self.atr?,
            rsi: self.rsi?,
        })
    }
}

/// Price series with derived columns, aligned row for row.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    rows: Vec<IndicatorRow>,
}

impl IndicatorFrame {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    /// Rows with every column defined, oldest first. Can be called repeatedly.
    pub fn valid_rows(&self) -> impl DoubleEndedIterator<Item = IndicatorPoint> + '_ {
        self.rows.iter().filter_map(IndicatorRow::valid)
    }

    pub fn valid_count(&self) -> usize {
        self.valid_rows().count()
    }

    /// The newest `n` valid rows, oldest first.
    pub fn tail(&self, n: usize) -> Vec<IndicatorPoint> {
        let mut tail: Vec<IndicatorPoint> = self.valid_rows().rev().take(n).collect();
        tail.reverse();
        tail
    }

    /// Latest valid row and the valid row `lookback` positions before it.
    pub fn snapshot(&self, lookback: usize) -> Option<Snapshot> {
        let mut newest_first = self.valid_rows().rev();
        let current = newest_first.next()?;
        let prior = if lookback == 0 {
            current
        } else {
            newest_first.nth(lookback - 1)?
        };
        Some(Snapshot { current, prior })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorEngine {
    pub window_long: usize,
    pub window_atr: usize,
    pub window_rsi: usize,
}

impl IndicatorEngine {
    pub fn new(cfg: &ScanConfig) -> Self {
        Self {
            window_long: cfg.window_long,
            window_atr: cfg.window_atr,
            window_rsi: cfg.window_rsi,
        }
    }

    /// Build the frame. Undersized input just yields zero valid rows.
    pub fn compute(&self, series: &PriceSeries) -> IndicatorFrame {
        let bars = series.bars();
        let sma = rolling::sma(bars, self.window_long);
        let atr = rolling::atr(bars, self.window_atr);
        let rsi = rolling::rsi(bars, self.window_rsi);

        let rows = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| IndicatorRow {
                bar: *bar,
                sma_long: sma[i],
                atr: atr[i],
                rsi: rsi[i],
            })
            .collect();
        IndicatorFrame { rows }
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    /// Daily series from a close path; each bar spans ±0.5 around the close.
    pub(crate) fn series(symbol: &str, closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                date: start + Duration::days(i as i64),
                open: c,
                high: c + 0.5,
                low: c - 0.5,
                close: c,
            })
            .collect();
        PriceSeries::new(symbol, bars).unwrap()
    }

    /// Closes oscillating ±0.2 around 100, finishing with 14 diffs that
    /// alternate `+up` / `-down`, so the final 14-bar RSI is
    /// `100 * up / (up + down)`.
    pub(crate) fn pullback_closes(len: usize, up: f64, down: f64) -> Vec<f64> {
        let mut closes = vec![100.0];
        for i in 1..len {
            let last = closes[i - 1];
            let next = if i + 14 >= len {
                if i % 2 == 0 { last + up } else { last - down }
            } else if i % 2 == 0 {
                last + 0.2
            } else {
                last - 0.2
            };
            closes.push(next);
        }
        closes
    }

    /// `pullback_closes(len, 0.2, 0.3)` lifted by 20 everywhere except the
    /// last 150 bars. The long SMA is still digesting the step down, so it
    /// falls more than 0.5% over the last five valid rows while the final
    /// close sits within 1% of it with RSI 40.
    pub(crate) fn downtrend_pullback_closes(len: usize) -> Vec<f64> {
        let mut closes = pullback_closes(len, 0.2, 0.3);
        let step_at = len.saturating_sub(150);
        for c in &mut closes[..step_at] {
            *c += 20.0;
        }
        closes
    }

    #[test]
    fn downtrend_fixture_shape() {
        let frame = IndicatorEngine::default().compute(&series("X", &downtrend_pullback_closes(300)));
        let snap = frame.snapshot(5).unwrap();
        assert!(snap.current.sma_long < snap.prior.sma_long * (1.0 - 0.006));
        let distance = (snap.current.bar.close - snap.current.sma_long).abs() / snap.current.sma_long;
        assert!(distance < 0.01, "distance={distance}");
        assert!((snap.current.rsi - 40.0).abs() < 1e-6);
    }

    #[test]
    fn shorter_than_warm_up_has_no_valid_rows() {
        let engine = IndicatorEngine::default();
        for len in [0, 1, 14, 100, 149] {
            let frame = engine.compute(&series("X", &pullback_closes(len.max(1), 0.2, 0.2)[..len]));
            assert_eq!(frame.len(), len);
            assert_eq!(frame.valid_count(), 0, "len={len}");
        }
    }

    #[test]
    fn first_valid_row_at_warm_up() {
        let engine = IndicatorEngine::default();
        let frame = engine.compute(&series("X", &pullback_closes(150, 0.2, 0.2)));
        assert_eq!(frame.valid_count(), 1);
        let first = frame.valid_rows().next().unwrap();
        assert_eq!(first.bar, frame.rows()[149].bar);
    }

    #[test]
    fn valid_rows_are_a_restartable_suffix() {
        let engine = IndicatorEngine::default();
        let frame = engine.compute(&series("X", &pullback_closes(200, 0.2, 0.3)));
        assert_eq!(frame.valid_count(), 51);
        let a: Vec<_> = frame.valid_rows().map(|p| p.bar.date).collect();
        let b: Vec<_> = frame.valid_rows().map(|p| p.bar.date).collect();
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(frame.rows()[..149].iter().all(|r| r.sma_long.is_none()));
    }

    #[test]
    fn flat_rows_are_excluded_not_zero_filled() {
        let engine = IndicatorEngine::default();
        let frame = engine.compute(&series("X", &[50.0; 200]));
        assert_eq!(frame.valid_count(), 0);
        assert!(frame.rows()[150].sma_long.is_some());
        assert!(frame.rows()[150].rsi.is_none());
    }

    #[test]
    fn snapshot_uses_valid_row_offsets() {
        let engine = IndicatorEngine::default();
        let frame = engine.compute(&series("X", &pullback_closes(160, 0.2, 0.3)));
        let snap = frame.snapshot(5).unwrap();
        let rows = frame.rows();
        assert_eq!(snap.current.bar, rows[159].bar);
        assert_eq!(snap.prior.bar, rows[154].bar);
    }

    #[test]
    fn snapshot_needs_lookback_rows() {
        let engine = IndicatorEngine::default();
        let frame = engine.compute(&series("X", &pullback_closes(154, 0.2, 0.3)));
        assert_eq!(frame.valid_count(), 5);
        assert!(frame.snapshot(5).is_none());
        assert!(frame.snapshot(4).is_some());
    }

    #[test]
    fn tail_returns_newest_rows_in_order() {
        let engine = IndicatorEngine::default();
        let frame = engine.compute(&series("X", &pullback_closes(300, 0.2, 0.3)));
        let tail = frame.tail(100);
        assert_eq!(tail.len(), 100);
        assert_eq!(tail.last().unwrap().bar, frame.rows()[299].bar);
        assert_eq!(tail[0].bar, frame.rows()[200].bar);
    }

    #[test]
    fn pullback_fixture_rsi() {
        let engine = IndicatorEngine::default();
        let frame = engine.compute(&series("X", &pullback_closes(200, 0.2, 0.3)));
        let last = frame.snapshot(5).unwrap().current;
        assert!((last.rsi - 40.0).abs() < 1e-6, "rsi={}", last.rsi);
    }
}
