use crate::config::ScanConfig;
use crate::detector::classifier::classify_trend;
use crate::types::{Snapshot, Trend};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Qualification {
    pub qualifies: bool,
    pub trend: Trend,
    pub distance_pct: f64,
}

/// Pullback-to-SMA rule: close within `proximity_threshold` of the long SMA
/// while RSI sits below `rsi_ceiling`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PullbackRule {
    pub proximity_threshold: f64,
    pub rsi_ceiling: f64,
    pub trend_band: f64,
}

impl PullbackRule {
    pub fn new(cfg: &ScanConfig) -> Self {
        Self {
            proximity_threshold: cfg.proximity_threshold,
            rsi_ceiling: cfg.rsi_ceiling,
            trend_band: cfg.trend_band,
        }
    }

    pub fn evaluate(&self, snapshot: &Snapshot) -> Qualification {
        let current = &snapshot.current;
        let trend = classify_trend(current.sma_long, snapshot.prior.sma_long, self.trend_band);
        let distance_pct = (current.bar.close - current.sma_long).abs() / current.sma_long;
        let momentum_ok = current.rsi < self.rsi_ceiling;
        // NaN distance (zero SMA) compares false and never qualifies.
        let qualifies = distance_pct <= self.proximity_threshold && momentum_ok;
        Qualification {
            qualifies,
            trend,
            distance_pct,
        }
    }
}

impl Default for PullbackRule {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Bar, IndicatorPoint};
    use chrono::NaiveDate;

    pub(crate) fn point(day: u32, close: f64, sma_long: f64, rsi: f64) -> IndicatorPoint {
        IndicatorPoint {
            bar: Bar {
                date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
            },
            sma_long,
            atr: 2.0,
            rsi,
        }
    }

    fn snap(close: f64, sma: f64, rsi: f64, prior_sma: f64) -> Snapshot {
        Snapshot {
            current: point(20, close, sma, rsi),
            prior: point(13, close, prior_sma, rsi),
        }
    }

    #[test]
    fn on_the_sma_with_weak_rsi_in_downtrend() {
        let q = PullbackRule::default().evaluate(&snap(100.0, 100.0, 40.0, 100.6));
        assert_eq!(q.trend, Trend::Down);
        assert_eq!(q.distance_pct, 0.0);
        assert!(q.qualifies);
    }

    #[test]
    fn strong_rsi_fails_momentum_filter() {
        let q = PullbackRule::default().evaluate(&snap(100.0, 100.0, 60.0, 100.0));
        assert!(!q.qualifies);
        assert_eq!(q.trend, Trend::Flat);
    }

    #[test]
    fn rsi_at_ceiling_fails() {
        assert!(!PullbackRule::default().evaluate(&snap(100.0, 100.0, 50.0, 100.0)).qualifies);
    }

    #[test]
    fn threshold_is_inclusive() {
        let rule = PullbackRule::default();
        // 102.5 / 100 lands a hair off 0.025 in binary, so probe just inside.
        assert!(rule.evaluate(&snap(102.49, 100.0, 30.0, 100.0)).qualifies);
        assert!(rule.evaluate(&snap(97.51, 100.0, 30.0, 100.0)).qualifies);
        let exact = PullbackRule { proximity_threshold: 0.5, ..rule };
        assert!(exact.evaluate(&snap(150.0, 100.0, 30.0, 100.0)).qualifies);
    }

    #[test]
    fn inside_threshold_with_low_rsi_always_qualifies() {
        let rule = PullbackRule::default();
        for step in 0..=24 {
            let close = 100.0 + step as f64 * 0.1;
            for rsi in [0.0, 10.0, 35.0, 49.99] {
                let q = rule.evaluate(&snap(close, 100.0, rsi, 100.0));
                assert!(q.qualifies, "close={close} rsi={rsi}");
            }
        }
    }

    #[test]
    fn outside_threshold_never_qualifies() {
        let rule = PullbackRule::default();
        for step in 26..200 {
            let above = 100.0 + step as f64 * 0.1;
            let below = 100.0 - step as f64 * 0.1;
            for rsi in [0.0, 20.0, 49.0, 50.0, 80.0, 100.0] {
                assert!(!rule.evaluate(&snap(above, 100.0, rsi, 100.0)).qualifies);
                assert!(!rule.evaluate(&snap(below, 100.0, rsi, 100.0)).qualifies);
            }
        }
    }

    #[test]
    fn zero_sma_never_qualifies() {
        let q = PullbackRule::default().evaluate(&snap(0.0, 0.0, 10.0, 1.0));
        assert!(!q.qualifies);
    }
}
