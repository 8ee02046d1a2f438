/// Domain-specific error types for the pricing service.
/// Invalid input is rejected before any simulation draw.
/// Market-data failures are recovered by the caller via fallback defaults.
#[derive(Debug, thiserror::Error)]
pub enum PricerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("market data unavailable: {0}")]
    MarketData(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("simulation cancelled")]
    Cancelled,

    #[error("simulation exceeded {0}s budget")]
    Timeout(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for PricerError {
    fn from(e: serde_json::Error) -> Self {
        PricerError::Parse(e.to_string())
    }
}

pub type PricerResult<T> = Result<T, PricerError>;
