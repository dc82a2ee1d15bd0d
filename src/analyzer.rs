use std::future::Future;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use tracing::debug;

use crate::chart::{ChartRenderer, ChartRequest};
use crate::config::ScanConfig;
use crate::detector::PullbackRule;
use crate::error::{AnalysisError, ProviderError};
use crate::fetcher::{HistorySource, MarketCapSource};
use crate::indicators::IndicatorEngine;
use crate::notify::message::{alert_caption, market_cap_label};
use crate::types::AlertRecord;

/// Result of analyzing one symbol. Every branch is an ordinary value; the
/// coordinator decides what to do with each.
#[derive(Debug)]
pub enum SymbolOutcome {
    Alert(Box<AlertRecord>),
    NoSetup,
    Skipped(AnalysisError),
}

/// Fetch → compute → qualify → render for a single symbol.
pub struct SymbolAnalyzer {
    history: Arc<dyn HistorySource>,
    market_cap: Arc<dyn MarketCapSource>,
    renderer: Arc<dyn ChartRenderer>,
    engine: IndicatorEngine,
    rule: PullbackRule,
    cfg: ScanConfig,
}

impl SymbolAnalyzer {
    pub fn new(
        history: Arc<dyn HistorySource>,
        market_cap: Arc<dyn MarketCapSource>,
        renderer: Arc<dyn ChartRenderer>,
        cfg: ScanConfig,
    ) -> Self {
        Self {
            history,
            market_cap,
            renderer,
            engine: IndicatorEngine::new(&cfg),
            rule: PullbackRule::new(&cfg),
            cfg,
        }
    }

    pub async fn analyze(&self, symbol: &str) -> SymbolOutcome {
        let today = Utc::now().date_naive();
        self.analyze_as_of(symbol, today).await
    }

    pub async fn analyze_as_of(&self, symbol: &str, end: NaiveDate) -> SymbolOutcome {
        match self.try_analyze(symbol, end).await {
            Ok(Some(alert)) => SymbolOutcome::Alert(Box::new(alert)),
            Ok(None) => SymbolOutcome::NoSetup,
            Err(e) => {
                debug!(symbol, "skipped: {e}");
                SymbolOutcome::Skipped(e)
            }
        }
    }

    async fn try_analyze(
        &self,
        symbol: &str,
        end: NaiveDate,
    ) -> Result<Option<AlertRecord>, AnalysisError> {
        let start = end - ChronoDuration::days(self.cfg.history_days);
        let series = self
            .with_timeout("history fetch", self.history.daily_history(symbol, start, end))
            .await??;
        if series.is_empty() {
            return Err(ProviderError::NoData(format!("{symbol}: empty history")).into());
        }

        let frame = self.engine.compute(&series);
        let required = self.cfg.trend_lookback + 1;
        let Some(snapshot) = frame.snapshot(self.cfg.trend_lookback) else {
            return Err(AnalysisError::InsufficientHistory {
                valid: frame.valid_count(),
                required,
            });
        };

        let verdict = self.rule.evaluate(&snapshot);
        debug!(
            symbol,
            bars = series.len(),
            valid_rows = frame.valid_count(),
            trend = %verdict.trend,
            distance_pct = verdict.distance_pct,
            rsi = snapshot.current.rsi,
            qualifies = verdict.qualifies,
            "evaluated"
        );
        if !verdict.qualifies {
            return Ok(None);
        }

        let cap = self
            .with_timeout("market cap lookup", self.market_cap.market_cap(symbol))
            .await
            .unwrap_or_else(|e| {
                debug!(symbol, "{e}; rendering cap as N/A");
                None
            });
        let cap_label = market_cap_label(cap);

        let request = ChartRequest {
            symbol: symbol.to_string(),
            rows: frame.tail(self.cfg.chart_bars),
            trend: verdict.trend,
            market_cap_label: cap_label.clone(),
            atr: snapshot.current.atr,
            rsi: snapshot.current.rsi,
        };
        let chart = self
            .with_timeout("chart render", self.renderer.render(&request))
            .await??;

        let message_text = alert_caption(
            symbol,
            &snapshot,
            verdict.distance_pct,
            verdict.trend,
            &cap_label,
            self.cfg.window_long,
        );

        Ok(Some(AlertRecord {
            symbol: symbol.to_string(),
            snapshot,
            trend: verdict.trend,
            distance_pct: verdict.distance_pct,
            market_cap_label: cap_label,
            chart,
            message_text,
            rank_key: snapshot.current.rsi,
        }))
    }

    async fn with_timeout<T>(
        &self,
        stage: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, AnalysisError> {
        tokio::time::timeout(self.cfg.request_timeout, fut)
            .await
            .map_err(|_| AnalysisError::Timeout(stage))
    }
}
