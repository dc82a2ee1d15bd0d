use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::analyzer::{SymbolAnalyzer, SymbolOutcome};
use crate::config::{ScanConfig, PROGRESS_EVERY};
use crate::error::{AppError, ProviderError, Result};
use crate::notify::message::{summary_text, UNIVERSE_FAILURE_TEXT};
use crate::notify::NotificationSink;
use crate::types::{AlertRecord, ScanSummary};
use crate::universe::UniverseSource;

/// Alerts gathered behind the barrier, tagged with their scan position.
#[derive(Debug, Default)]
struct Collected {
    alerts: Vec<(usize, AlertRecord)>,
    skipped: usize,
}

/// Runs one scan: universe → bounded fan-out → barrier → rank → paced dispatch → summary.
pub struct ScanCoordinator {
    universe: Arc<dyn UniverseSource>,
    analyzer: Arc<SymbolAnalyzer>,
    sink: Arc<dyn NotificationSink>,
    cfg: ScanConfig,
    max_symbols: usize,
}

impl ScanCoordinator {
    pub fn new(
        universe: Arc<dyn UniverseSource>,
        analyzer: Arc<SymbolAnalyzer>,
        sink: Arc<dyn NotificationSink>,
        cfg: ScanConfig,
    ) -> Self {
        Self {
            universe,
            analyzer,
            sink,
            cfg,
            max_symbols: 0,
        }
    }

    /// Only scan the first `n` symbols of the universe (0 = all).
    pub fn with_max_symbols(mut self, n: usize) -> Self {
        self.max_symbols = n;
        self
    }

    pub async fn run(&self) -> Result<ScanSummary> {
        let mut symbols = match self.universe.symbols().await {
            Ok(s) if !s.is_empty() => s,
            Ok(_) => {
                return self
                    .universe_failed(ProviderError::NoData("empty universe".to_string()))
                    .await;
            }
            Err(e) => return self.universe_failed(e).await,
        };
        if self.max_symbols > 0 {
            symbols.truncate(self.max_symbols);
        }

        info!(
            symbols = symbols.len(),
            concurrency = self.cfg.concurrency,
            warm_up = self.cfg.warm_up(),
            "Starting scan for {} symbols...",
            symbols.len()
        );

        let collected = self.collect(symbols.clone()).await;
        let alerts_found = collected.alerts.len();
        info!(
            alerts = alerts_found,
            skipped = collected.skipped,
            "Analysis complete: {alerts_found} alerts, {} symbols skipped",
            collected.skipped
        );

        let ranked = rank(collected.alerts);
        let delivered = self.dispatch(&ranked).await;

        let summary = ScanSummary {
            symbols_scanned: symbols.len(),
            alerts_found,
            alerts_delivered: delivered,
            symbols_skipped: collected.skipped,
        };
        let text = summary_text(&summary);
        if let Err(e) = self.sink.send_text(&text).await {
            warn!("Summary delivery failed: {e}");
        }
        info!(
            scanned = summary.symbols_scanned,
            alerts = summary.alerts_found,
            delivered = summary.alerts_delivered,
            "{text}"
        );
        Ok(summary)
    }

    async fn universe_failed(&self, e: ProviderError) -> Result<ScanSummary> {
        error!("Universe fetch failed: {e}");
        if let Err(send_err) = self.sink.send_text(UNIVERSE_FAILURE_TEXT).await {
            warn!("Failure notice delivery failed: {send_err}");
        }
        Err(AppError::Universe(e))
    }

    /// Analyze every symbol with at most `concurrency` tasks in flight and
    /// wait for all of them. A panicking task counts as a skipped symbol.
    async fn collect(&self, symbols: Vec<String>) -> Collected {
        let total = symbols.len();
        let mut results = stream::iter(symbols.into_iter().enumerate())
            .map(|(idx, symbol)| {
                let analyzer = Arc::clone(&self.analyzer);
                let handle = tokio::spawn(async move { analyzer.analyze(&symbol).await });
                async move { (idx, handle.await) }
            })
            .buffer_unordered(self.cfg.concurrency.max(1));

        let mut collected = Collected::default();
        let mut done = 0usize;
        while let Some((idx, joined)) = results.next().await {
            done += 1;
            if done % PROGRESS_EVERY == 0 {
                info!("Scanning... {done}/{total}");
            }
            match joined {
                Ok(SymbolOutcome::Alert(alert)) => {
                    info!(
                        symbol = %alert.symbol,
                        close = alert.snapshot.current.bar.close,
                        sma = alert.snapshot.current.sma_long,
                        distance_pct = alert.distance_pct,
                        rsi = alert.rank_key,
                        trend = %alert.trend,
                        cap = %alert.market_cap_label,
                        "Setup found"
                    );
                    collected.alerts.push((idx, *alert));
                }
                Ok(SymbolOutcome::NoSetup) => {}
                Ok(SymbolOutcome::Skipped(_)) => collected.skipped += 1,
                Err(join_err) => {
                    warn!("Analyzer task for symbol #{idx} failed: {join_err}");
                    collected.skipped += 1;
                }
            }
        }
        collected
    }

    /// Send alerts one at a time, pausing `dispatch_delay` after each.
    /// Returns how many the channel accepted.
    async fn dispatch(&self, alerts: &[AlertRecord]) -> usize {
        let mut delivered = 0;
        for alert in alerts {
            match self.sink.send_image(&alert.chart, &alert.message_text).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(symbol = %alert.symbol, "Alert delivery failed: {e}"),
            }
            tokio::time::sleep(self.cfg.dispatch_delay).await;
        }
        delivered
    }
}

/// Ascending by rank key; equal keys keep scan order.
fn rank(mut alerts: Vec<(usize, AlertRecord)>) -> Vec<AlertRecord> {
    alerts.sort_by(|(ia, a), (ib, b)| a.rank_key.total_cmp(&b.rank_key).then(ia.cmp(ib)));
    alerts.into_iter().map(|(_, alert)| alert).collect()
}
