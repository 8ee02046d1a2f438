use crate::errors::{PricerError, PricerResult};
use crate::models::volatility;
use reqwest::Client;
use std::time::Duration;

/// Chart endpoint is rejected without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) mc_option_pricer/0.1";

const MAX_TICKER_LEN: usize = 16;

/// Latest close and trailing annualized volatility (percent) for a ticker.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Quote {
    pub price: f64,
    /// `None` when the window holds too few closes for a sample std dev.
    pub volatility: Option<f64>,
}

/// Market-data REST client (Yahoo-style v8 chart API).
/// One daily-bar request over a one-month window gives both the latest
/// close and the 30-day volatility.
#[derive(Debug, Clone)]
pub struct QuoteClient {
    client: Client,
    base_url: String,
}

impl QuoteClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_quote(&self, ticker: &str) -> PricerResult<Quote> {
        let symbol = normalize_ticker(ticker)?;
        let url = format!(
            "{}/v8/finance/chart/{symbol}?range=1mo&interval=1d",
            self.base_url
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PricerError::MarketData(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PricerError::MarketData(format!("HTTP {status}: {body}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| PricerError::MarketData(format!("read body: {e}")))?;
        let data: ChartResponse = serde_json::from_str(&body)?;

        let quote = quote_from_chart(data)?;
        tracing::debug!(
            ticker = %symbol,
            price = quote.price,
            volatility = ?quote.volatility,
            "quote fetched"
        );
        Ok(quote)
    }
}

/// Trim and upper-case a ticker; reject anything outside `[A-Z0-9.^=-]`.
pub fn normalize_ticker(raw: &str) -> PricerResult<String> {
    let symbol = raw.trim().to_ascii_uppercase();
    let valid_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-');

    if symbol.is_empty() || symbol.len() > MAX_TICKER_LEN || !symbol.chars().all(valid_char) {
        return Err(PricerError::InvalidInput(format!("invalid ticker: {raw:?}")));
    }
    Ok(symbol)
}

// Chart API response format (fields we use):
// {
//   "chart": {
//     "result": [
//       {
//         "meta": { "symbol": "AAPL", "regularMarketPrice": 227.5 },
//         "timestamp": [1726493400, ...],
//         "indicators": { "quote": [ { "close": [216.3, null, 222.5, ...] } ] }
//       }
//     ],
//     "error": null
//   }
// }

#[derive(serde::Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartBody,
}

#[derive(serde::Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(serde::Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(serde::Deserialize)]
struct Indicators {
    quote: Vec<QuoteBars>,
}

#[derive(serde::Deserialize)]
struct QuoteBars {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(serde::Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

pub(crate) fn quote_from_chart(data: ChartResponse) -> PricerResult<Quote> {
    if let Some(err) = data.chart.error {
        return Err(PricerError::MarketData(format!(
            "{}: {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        )));
    }

    let closes: Vec<f64> = data
        .chart
        .result
        .as_ref()
        .and_then(|r| r.first())
        .and_then(|r| r.indicators.quote.first())
        .map(|q| {
            q.close
                .iter()
                .flatten()
                .copied()
                .filter(|c| c.is_finite() && *c > 0.0)
                .collect()
        })
        .unwrap_or_default();

    let price = *closes
        .last()
        .ok_or_else(|| PricerError::MarketData("empty history".into()))?;

    Ok(Quote {
        price,
        volatility: volatility::historical_volatility_pct(&closes),
    })
}
