use crate::config::AppConfig;
use crate::errors::{PricerError, PricerResult};
use crate::feeds::quote_api::Quote;
use crate::models::{
    black_scholes, diagnostics, CancelToken, MonteCarloEngine, PathCapture, PricingRequest,
    PricingResult, SeededNormals,
};
use crate::server::payload::{
    resolve_spot, round2, OptionPricingPayload, OptionPricingResponse, StockDataResponse,
};
use crate::state::{AppState, Counters, CountersSnapshot};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

impl IntoResponse for PricerError {
    fn into_response(self) -> Response {
        let status = match &self {
            PricerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PricerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            PricerError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// GET / -- liveness
pub async fn status() -> &'static str {
    "Option Pricer API is running!"
}

/// GET /stock-data/{ticker} -- latest close and 30-day volatility
pub async fn stock_data(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Json<StockDataResponse> {
    Counters::incr(&state.counters.quote_lookups);

    match state.quotes.fetch_quote(&ticker).await {
        Ok(Quote {
            price,
            volatility: Some(vol),
        }) => Json(StockDataResponse::found(price, vol)),
        Ok(Quote {
            volatility: None, ..
        }) => Json(StockDataResponse::failed(
            "insufficient history for volatility",
        )),
        Err(e) => {
            tracing::warn!(ticker = %ticker, error = %e, "stock data lookup failed");
            Json(StockDataResponse::failed(e.to_string()))
        }
    }
}

/// POST /option-pricing -- Monte Carlo price, standard error and chart data
pub async fn option_pricing(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OptionPricingPayload>, JsonRejection>,
) -> Result<Json<OptionPricingResponse>, PricerError> {
    Counters::incr(&state.counters.pricing_requests);

    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("option_pricing", request_id = %request_id);

    let result = price_payload(&state, payload, request_id)
        .instrument(span)
        .await;

    match &result {
        Err(e @ PricerError::InvalidInput(_)) => {
            Counters::incr(&state.counters.rejected_requests);
            tracing::info!(error = %e, "pricing request rejected");
        }
        Err(e @ PricerError::Timeout(_)) => {
            Counters::incr(&state.counters.timeouts);
            tracing::warn!(error = %e, "pricing request timed out");
        }
        Err(e) => tracing::error!(error = %e, "pricing request failed"),
        Ok(_) => {}
    }

    result.map(Json)
}

/// GET /api/counters -- service counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<CountersSnapshot> {
    Json(state.counters.snapshot())
}

async fn price_payload(
    state: &AppState,
    payload: Result<Json<OptionPricingPayload>, JsonRejection>,
    request_id: String,
) -> PricerResult<OptionPricingResponse> {
    let Json(payload) = payload.map_err(|e| PricerError::InvalidInput(e.body_text()))?;

    let quoted = match payload.ticker() {
        Some(ticker) => lookup_spot(state, ticker).await,
        None => None,
    };
    let (spot, spot_source) = resolve_spot(quoted, payload.stock_price);

    let inputs = payload.to_inputs(spot)?;
    if inputs.iterations > state.config.max_iterations {
        return Err(PricerError::InvalidInput(format!(
            "iteration count {} exceeds limit {}",
            inputs.iterations, state.config.max_iterations
        )));
    }
    let capture = payload.path_capture(state.config.path_capture)?;
    let req = PricingRequest::from_inputs(&inputs)?;

    let result = simulate(&state.config, req, capture, payload.seed).await?;
    let bs_price = black_scholes::call_price(
        req.spot(),
        req.strike(),
        req.ttl_years(),
        req.sigma(),
        req.rate(),
    );

    tracing::info!(
        spot,
        spot_source = ?spot_source,
        strike = req.strike(),
        iterations = req.iterations(),
        price = result.option_price,
        stderr = ?result.standard_error,
        bs_price,
        "option priced"
    );

    let chart = diagnostics::chart_data(&result);
    Ok(OptionPricingResponse {
        request_id,
        option_price: round2(result.option_price),
        standard_error: result.standard_error.map(round2),
        black_scholes_price: round2(bs_price),
        spot_price: spot,
        spot_source,
        iterations: result.iterations,
        terminal_prices: result.terminal_prices,
        chart,
    })
}

/// Ticker lookup for the spot decision chain. Failure falls back, never errors.
async fn lookup_spot(state: &AppState, ticker: &str) -> Option<f64> {
    Counters::incr(&state.counters.quote_lookups);

    match state.quotes.fetch_quote(ticker).await {
        Ok(quote) => Some(quote.price),
        Err(e) => {
            Counters::incr(&state.counters.quote_fallbacks);
            tracing::warn!(
                ticker = %ticker,
                error = %e,
                "quote lookup failed, falling back to supplied spot"
            );
            None
        }
    }
}

/// Run the simulation off the async runtime under the configured time budget.
///
/// Large runs go to the chunked parallel engine. On timeout the cancel token
/// is set and the partial sums are dropped with the worker.
pub async fn simulate(
    config: &AppConfig,
    req: PricingRequest,
    capture: PathCapture,
    seed: Option<u64>,
) -> PricerResult<PricingResult> {
    let engine = MonteCarloEngine::new(capture);
    let parallel = req.iterations() >= config.parallel_threshold;
    let seed = seed.unwrap_or_else(rand::random::<u64>);
    tracing::debug!(seed, parallel, "simulation started");

    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let handle = tokio::task::spawn_blocking(move || {
        if parallel {
            engine.price_parallel(&req, seed, &worker_cancel)
        } else {
            engine.price_cancellable(&req, &mut SeededNormals::from_seed(seed), &worker_cancel)
        }
    });

    let budget = config.pricing_timeout_secs;
    match tokio::time::timeout(Duration::from_secs(budget), handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(PricerError::Internal(format!("simulation task failed: {e}"))),
        Err(_) => {
            cancel.cancel();
            Err(PricerError::Timeout(budget))
        }
    }
}
