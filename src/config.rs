use crate::errors::{PricerError, PricerResult};
use crate::models::monte_carlo::PathCapture;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub quote_api_base_url: String,
    pub quote_timeout_secs: u64,
    pub path_capture: PathCapture,
    pub parallel_threshold: u64,
    pub max_iterations: u64,
    pub pricing_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> PricerResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "5000")
            .parse::<u16>()
            .map_err(|e| PricerError::Config(format!("SERVER_PORT: {e}")))?;

        let quote_timeout_secs = env_var_or("QUOTE_TIMEOUT_SECS", "5")
            .parse::<u64>()
            .map_err(|e| PricerError::Config(format!("QUOTE_TIMEOUT_SECS: {e}")))?;

        let path_capture = env_var_or("PATH_CAPTURE", "100")
            .parse::<PathCapture>()
            .map_err(|e| PricerError::Config(format!("PATH_CAPTURE: {e}")))?;

        let parallel_threshold = env_var_or("PARALLEL_THRESHOLD", "200000")
            .parse::<u64>()
            .map_err(|e| PricerError::Config(format!("PARALLEL_THRESHOLD: {e}")))?;

        let max_iterations = env_var_or("MAX_ITERATIONS", "10000000")
            .parse::<u64>()
            .map_err(|e| PricerError::Config(format!("MAX_ITERATIONS: {e}")))?;

        let pricing_timeout_secs = env_var_or("PRICING_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| PricerError::Config(format!("PRICING_TIMEOUT_SECS: {e}")))?;

        if max_iterations == 0 {
            return Err(PricerError::Config("MAX_ITERATIONS must be >= 1".into()));
        }

        Ok(Self {
            server_port,
            quote_api_base_url: env_var_or(
                "QUOTE_API_BASE_URL",
                "https://query1.finance.yahoo.com",
            ),
            quote_timeout_secs,
            path_capture,
            parallel_threshold,
            max_iterations,
            pricing_timeout_secs,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 5000,
            quote_api_base_url: "https://query1.finance.yahoo.com".to_string(),
            quote_timeout_secs: 5,
            path_capture: PathCapture::default(),
            parallel_threshold: 200_000,
            max_iterations: 10_000_000,
            pricing_timeout_secs: 30,
        }
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
