use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::{UNIVERSE_TIMEOUT_SECS, USER_AGENT};
use crate::error::{AppError, ProviderError};

/// Ordered symbol universe. An empty list is reported as `NoData`, never `Ok`.
#[async_trait]
pub trait UniverseSource: Send + Sync {
    async fn symbols(&self) -> Result<Vec<String>, ProviderError>;
}

/// Vendor symbols use "." for share classes (BRK.B); the history API wants "-".
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_ascii_uppercase().replace('.', "-")
}

/// Constituents list downloaded as CSV with a `Symbol` or `Ticker` column.
pub struct CsvUniverse {
    client: reqwest::Client,
    url: String,
}

impl CsvUniverse {
    pub fn new(url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(UNIVERSE_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl UniverseSource for CsvUniverse {
    async fn symbols(&self) -> Result<Vec<String>, ProviderError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let symbols = parse_constituents_csv(&body)?;
        info!("Universe loaded: {} symbols from {}", symbols.len(), self.url);
        Ok(symbols)
    }
}

/// Read the `Symbol` (or `Ticker`) column of a constituents CSV, in file order.
pub fn parse_constituents_csv(body: &str) -> Result<Vec<String>, ProviderError> {
    if body.trim().is_empty() {
        return Err(ProviderError::NoData("universe CSV is empty".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    let headers = reader.headers()?.clone();
    let column = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("symbol") || h.eq_ignore_ascii_case("ticker"))
        .ok_or_else(|| {
            ProviderError::Malformed(format!(
                "universe CSV has no Symbol/Ticker column: {}",
                headers.iter().collect::<Vec<_>>().join(",")
            ))
        })?;

    let mut symbols = Vec::new();
    for record in reader.records() {
        let record = record?;
        match record.get(column) {
            Some(cell) if !cell.is_empty() => symbols.push(normalize_symbol(cell)),
            _ => {}
        }
    }

    if symbols.is_empty() {
        return Err(ProviderError::NoData("universe CSV has no symbols".to_string()));
    }
    Ok(symbols)
}

/// An explicit symbol list wins over the download. Failing to build the HTTP
/// client is a setup error, not a universe fetch failure.
pub fn select_universe(symbols: &[String], url: &str) -> Result<Arc<dyn UniverseSource>, AppError> {
    if !symbols.is_empty() {
        info!("Using {} symbols from SCAN_SYMBOLS", symbols.len());
        return Ok(Arc::new(StaticUniverse::new(symbols)));
    }
    let csv = CsvUniverse::new(url)
        .map_err(|e| AppError::Config(format!("universe client setup failed: {e}")))?;
    Ok(Arc::new(csv))
}

/// Fixed list, e.g. from SCAN_SYMBOLS.
pub struct StaticUniverse {
    symbols: Vec<String>,
}

impl StaticUniverse {
    pub fn new(symbols: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| normalize_symbol(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl UniverseSource for StaticUniverse {
    async fn symbols(&self) -> Result<Vec<String>, ProviderError> {
        if self.symbols.is_empty() {
            return Err(ProviderError::NoData("static universe is empty".to_string()));
        }
        Ok(self.symbols.clone())
    }
}
