mod analyzer;
mod chart;
mod config;
mod coordinator;
mod detector;
mod error;
mod fetcher;
mod indicators;
mod notify;
mod types;
mod universe;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::analyzer::SymbolAnalyzer;
use crate::chart::PngChartRenderer;
use crate::config::Config;
use crate::coordinator::ScanCoordinator;
use crate::error::{AppError, Result};
use crate::fetcher::YahooClient;
use crate::notify::TelegramSink;
use crate::universe::select_universe;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let universe = select_universe(&cfg.symbols, &cfg.universe_url)?;

    let yahoo = Arc::new(
        YahooClient::new(&cfg.yahoo_api_url, cfg.scan.request_timeout)
            .map_err(|e| AppError::Config(format!("HTTP client setup failed: {e}")))?,
    );
    let sink = Arc::new(
        TelegramSink::new(&cfg.telegram_api_url, &cfg.telegram_token, &cfg.chat_id)
            .map_err(|e| AppError::Config(format!("Telegram client setup failed: {e}")))?,
    );

    let analyzer = SymbolAnalyzer::new(
        yahoo.clone(),
        yahoo,
        Arc::new(PngChartRenderer),
        cfg.scan.clone(),
    );
    let coordinator = ScanCoordinator::new(universe, Arc::new(analyzer), sink, cfg.scan.clone())
        .with_max_symbols(cfg.max_symbols);

    let summary = coordinator.run().await?;
    info!(
        scanned = summary.symbols_scanned,
        alerts = summary.alerts_found,
        delivered = summary.alerts_delivered,
        skipped = summary.symbols_skipped,
        "Run complete"
    );
    Ok(())
}
