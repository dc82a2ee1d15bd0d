use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::header::REFERER;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{USER_AGENT, YAHOO_COOKIE_URL, YAHOO_REFERER};
use crate::error::ProviderError;
use crate::types::{Bar, PriceSeries};

/// Daily OHLC history for one symbol.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError>;
}

/// Market capitalization lookup. `None` means unavailable, never an error.
#[async_trait]
pub trait MarketCapSource: Send + Sync {
    async fn market_cap(&self, symbol: &str) -> Option<f64>;
}

/// Yahoo Finance chart + quote endpoints.
///
/// The quote endpoint needs a session cookie plus a matching crumb. Both are
/// fetched on first use; the cookie lives in the client's jar and the crumb
/// is cached until the endpoint rejects it.
pub struct YahooClient {
    client: reqwest::Client,
    base_url: String,
    cookie_url: String,
    crumb: Mutex<Option<String>>,
}

impl YahooClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookie_url: YAHOO_COOKIE_URL.to_string(),
            crumb: Mutex::new(None),
        })
    }

    async fn crumb(&self) -> Result<String, ProviderError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // fc.yahoo.com answers 404 but still sets the session cookie.
        if let Err(e) = self
            .client
            .get(&self.cookie_url)
            .header(REFERER, YAHOO_REFERER)
            .send()
            .await
        {
            debug!("Yahoo cookie request failed: {e}");
        }

        let body = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .header(REFERER, YAHOO_REFERER)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let crumb = parse_crumb(&body)?;
        debug!("Yahoo crumb acquired");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn forget_crumb(&self) {
        *self.crumb.lock().await = None;
    }

    fn quote_request(&self, symbol: &str, crumb: &str) -> reqwest::Result<reqwest::Request> {
        self.client
            .get(format!("{}/v7/finance/quote", self.base_url))
            .query(&[("symbols", symbol), ("crumb", crumb)])
            .header(REFERER, YAHOO_REFERER)
            .build()
    }

    async fn fetch_market_cap(&self, symbol: &str) -> Result<Option<f64>, ProviderError> {
        let crumb = self.crumb().await?;
        let resp = self.client.execute(self.quote_request(symbol, &crumb)?).await?;
        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            self.forget_crumb().await;
        }
        let body = resp.error_for_status()?.text().await?;
        Ok(parse_market_cap(&body))
    }
}

#[async_trait]
impl HistorySource for YahooClient {
    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        let period1 = start.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp()).unwrap_or(0);
        let period2 = end.and_hms_opt(23, 59, 59).map(|t| t.and_utc().timestamp()).unwrap_or(0);
        let url = format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url, symbol, period1, period2
        );

        let body = self.client.get(&url).send().await?.text().await?;
        parse_chart_response(symbol, &body)
    }
}

#[async_trait]
impl MarketCapSource for YahooClient {
    async fn market_cap(&self, symbol: &str) -> Option<f64> {
        match self.fetch_market_cap(symbol).await {
            Ok(cap) => cap,
            Err(e) => {
                debug!(symbol, "market cap lookup failed: {e}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Parse a `/v8/finance/chart` body into a daily series.
/// Bars with any missing field are dropped; a repeated date keeps the later bar.
pub fn parse_chart_response(symbol: &str, body: &str) -> Result<PriceSeries, ProviderError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;

    if let Some(err) = envelope.chart.error {
        return Err(ProviderError::NoData(format!(
            "{symbol}: {} ({})",
            err.description.unwrap_or_default(),
            err.code.unwrap_or_default()
        )));
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::NoData(format!("{symbol}: empty chart result")))?;
    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars: Vec<Bar> = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let field = |col: &[Option<f64>]| col.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            field(&quote.open),
            field(&quote.high),
            field(&quote.low),
            field(&quote.close),
        ) else {
            continue;
        };
        let Some(date) = DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()) else {
            return Err(ProviderError::Malformed(format!("{symbol}: bad timestamp {ts}")));
        };
        let bar = Bar { date, open, high, low, close };
        match bars.last_mut() {
            Some(last) if last.date == date => *last = bar,
            _ => bars.push(bar),
        }
    }

    if bars.is_empty() {
        return Err(ProviderError::NoData(format!("{symbol}: no complete bars")));
    }
    PriceSeries::new(symbol, bars)
}

/// Validate a `/v1/test/getcrumb` body. Error pages and throttling notices
/// come back as text too.
pub fn parse_crumb(body: &str) -> Result<String, ProviderError> {
    let crumb = body.trim();
    if crumb.is_empty() {
        return Err(ProviderError::NoData("empty Yahoo crumb".to_string()));
    }
    if crumb.to_ascii_lowercase().contains("too many requests") {
        return Err(ProviderError::Malformed("Yahoo rate limited the crumb request".to_string()));
    }
    if crumb.len() >= 100 || crumb.contains(char::is_whitespace) || crumb.contains('<') {
        return Err(ProviderError::Malformed("Yahoo crumb response is not a crumb".to_string()));
    }
    Ok(crumb.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteBody,
}

#[derive(Debug, Deserialize)]
struct QuoteBody {
    #[serde(default)]
    result: Vec<QuoteItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteItem {
    market_cap: Option<f64>,
}

/// Market cap from a `/v7/finance/quote` body, if present.
pub fn parse_market_cap(body: &str) -> Option<f64> {
    let envelope: QuoteEnvelope = serde_json::from_str(body).ok()?;
    envelope
        .quote_response
        .result
        .into_iter()
        .next()?
        .market_cap
        .filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chart_and_drops_incomplete_bars() {
        // 2024-01-02, 2024-01-03, 2024-01-04 at 14:30 UTC
        let body = r#"{"chart":{"result":[{"meta":{},"timestamp":[1704205800,1704292200,1704378600],
            "indicators":{"quote":[{"open":[1.0,2.0,3.0],"high":[1.5,2.5,null],
            "low":[0.5,1.5,2.5],"close":[1.2,2.2,3.2],"volume":[10,20,30]}]}}],"error":null}}"#;
        let series = parse_chart_response("AAPL", body).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(series.bars()[1].close, 2.2);
    }

    #[test]
    fn duplicate_trailing_date_keeps_latest() {
        let body = r#"{"chart":{"result":[{"timestamp":[1704205800,1704292200,1704310000],
            "indicators":{"quote":[{"open":[1,2,2],"high":[1,2,3],"low":[1,2,1],"close":[1,2,2.5]}]}}],"error":null}}"#;
        let series = parse_chart_response("AAPL", body).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[1].close, 2.5);
    }

    #[test]
    fn chart_error_is_no_data() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart_response("ZZZZ", body).unwrap_err();
        assert!(matches!(err, ProviderError::NoData(ref m) if m.contains("delisted")));
    }

    #[test]
    fn chart_without_timestamps_is_no_data() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(matches!(parse_chart_response("X", body), Err(ProviderError::NoData(_))));
    }

    #[test]
    fn garbage_body_is_json_error() {
        assert!(matches!(parse_chart_response("X", "<html>"), Err(ProviderError::Json(_))));
    }

    #[test]
    fn crumb_validation() {
        assert_eq!(parse_crumb("  aBc9/x.Yz\n").unwrap(), "aBc9/x.Yz");
        assert!(matches!(parse_crumb(""), Err(ProviderError::NoData(_))));
        assert!(matches!(parse_crumb("Too Many Requests"), Err(ProviderError::Malformed(_))));
        assert!(matches!(
            parse_crumb("<!DOCTYPE html><html></html>"),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn quote_request_carries_crumb() {
        let client = YahooClient::new("https://query1.finance.yahoo.com/", Duration::from_secs(5)).unwrap();
        let request = client.quote_request("BRK-B", "aBc9/x.Yz").unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://query1.finance.yahoo.com/v7/finance/quote?symbols=BRK-B&crumb=aBc9%2Fx.Yz"
        );
        assert_eq!(request.headers()[REFERER], YAHOO_REFERER);
    }

    #[tokio::test]
    async fn cached_crumb_is_reused_until_forgotten() {
        let client = YahooClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        *client.crumb.lock().await = Some("cached".to_string());
        assert_eq!(client.crumb().await.unwrap(), "cached");
        client.forget_crumb().await;
        assert!(client.crumb.lock().await.is_none());
    }

    #[test]
    fn market_cap_parsing() {
        let body = r#"{"quoteResponse":{"result":[{"symbol":"AAPL","marketCap":2950000000000}],"error":null}}"#;
        assert_eq!(parse_market_cap(body), Some(2.95e12));
        let missing = r#"{"quoteResponse":{"result":[{"symbol":"AAPL"}],"error":null}}"#;
        assert_eq!(parse_market_cap(missing), None);
        assert_eq!(parse_market_cap(r#"{"finance":{"error":{}}}"#), None);
    }
}
