use crate::errors::{PricerError, PricerResult};
use crate::models::diagnostics::ChartData;
use crate::models::request::{
    PricingInputs, DEFAULT_DAYS_TO_EXPIRY, DEFAULT_ITERATIONS, DEFAULT_RISK_FREE_RATE_PCT,
    DEFAULT_SPOT_PRICE, DEFAULT_STRIKE_PRICE, DEFAULT_VOLATILITY_PCT,
};
use crate::models::PathCapture;

/// POST /option-pricing body. Every field is optional; missing fields take
/// the documented defaults. Units follow the form: days and percent.
#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionPricingPayload {
    pub ticker: Option<String>,
    pub stock_price: Option<f64>,
    pub strike_price: Option<f64>,
    pub time_to_expiry: Option<f64>,
    pub volatility: Option<f64>,
    pub risk_free_rate: Option<f64>,
    /// Any JSON number; the fractional part is dropped.
    pub iterations: Option<f64>,
    pub seed: Option<u64>,
    /// `"all"` or a decimal count of terminal prices to return.
    pub path_capture: Option<String>,
}

impl OptionPricingPayload {
    /// Ticker to look up, if one was actually given (the form sends `""`).
    pub fn ticker(&self) -> Option<&str> {
        self.ticker
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Fill missing fields with defaults. `spot` comes from `resolve_spot`.
    pub fn to_inputs(&self, spot: f64) -> PricerResult<PricingInputs> {
        let iterations = match self.iterations {
            None => DEFAULT_ITERATIONS,
            Some(n) if n.is_finite() && n.trunc() >= 1.0 => n.trunc() as u64,
            Some(n) => {
                return Err(PricerError::InvalidInput(format!(
                    "iteration count must be >= 1, got {n}"
                )))
            }
        };

        Ok(PricingInputs {
            spot_price: spot,
            strike_price: self.strike_price.unwrap_or(DEFAULT_STRIKE_PRICE),
            days_to_expiry: self.time_to_expiry.unwrap_or(DEFAULT_DAYS_TO_EXPIRY),
            volatility_pct: self.volatility.unwrap_or(DEFAULT_VOLATILITY_PCT),
            risk_free_rate_pct: self.risk_free_rate.unwrap_or(DEFAULT_RISK_FREE_RATE_PCT),
            iterations,
        })
    }

    pub fn path_capture(&self, default: PathCapture) -> PricerResult<PathCapture> {
        match self.path_capture.as_deref() {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| PricerError::InvalidInput(format!("pathCapture: {e}"))),
        }
    }
}

/// Where the spot price used for a pricing call came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotSource {
    Ticker,
    Supplied,
    Default,
}

/// Spot price decision chain: ticker quote, then caller value, then default.
///
/// `quoted` is `None` when no ticker was given or the lookup failed; a failed
/// lookup never fails the pricing call.
pub fn resolve_spot(quoted: Option<f64>, supplied: Option<f64>) -> (f64, SpotSource) {
    [
        (quoted, SpotSource::Ticker),
        (supplied, SpotSource::Supplied),
    ]
    .into_iter()
    .find_map(|(value, source)| value.map(|v| (v, source)))
    .unwrap_or((DEFAULT_SPOT_PRICE, SpotSource::Default))
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionPricingResponse {
    pub request_id: String,
    pub option_price: f64,
    /// `null` when only one path was simulated.
    pub standard_error: Option<f64>,
    pub black_scholes_price: f64,
    pub spot_price: f64,
    pub spot_source: SpotSource,
    pub iterations: u64,
    pub terminal_prices: Vec<f64>,
    pub chart: ChartData,
}

/// GET /stock-data/{ticker} body. Lookup failures are reported in-band.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StockDataResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StockDataResponse {
    pub fn found(price: f64, volatility: f64) -> Self {
        Self {
            success: true,
            price: Some(price),
            volatility: Some(volatility),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            price: None,
            volatility: None,
            error: Some(error.into()),
        }
    }
}

#[inline]
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
