use crate::errors::{PricerError, PricerResult};

pub const DEFAULT_SPOT_PRICE: f64 = 100.0;
pub const DEFAULT_STRIKE_PRICE: f64 = 100.0;
pub const DEFAULT_DAYS_TO_EXPIRY: f64 = 40.0;
pub const DEFAULT_VOLATILITY_PCT: f64 = 20.0;
pub const DEFAULT_RISK_FREE_RATE_PCT: f64 = 2.5;
pub const DEFAULT_ITERATIONS: u64 = 1000;

const DAYS_PER_YEAR: f64 = 365.0;

/// Caller-facing inputs in market units (days, percent).
/// Missing fields are replaced by the documented defaults; present-but-invalid
/// fields are rejected by `PricingRequest::from_inputs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingInputs {
    pub spot_price: f64,
    pub strike_price: f64,
    pub days_to_expiry: f64,
    pub volatility_pct: f64,
    pub risk_free_rate_pct: f64,
    pub iterations: u64,
}

impl Default for PricingInputs {
    fn default() -> Self {
        Self {
            spot_price: DEFAULT_SPOT_PRICE,
            strike_price: DEFAULT_STRIKE_PRICE,
            days_to_expiry: DEFAULT_DAYS_TO_EXPIRY,
            volatility_pct: DEFAULT_VOLATILITY_PCT,
            risk_free_rate_pct: DEFAULT_RISK_FREE_RATE_PCT,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Validated pricing parameters in model units (years, fractions).
/// Fields are private so an invalid request cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingRequest {
    spot: f64,
    strike: f64,
    ttl_years: f64,
    sigma: f64,
    rate: f64,
    iterations: u64,
}

impl PricingRequest {
    pub fn new(
        spot: f64,
        strike: f64,
        ttl_years: f64,
        sigma: f64,
        rate: f64,
        iterations: u64,
    ) -> PricerResult<Self> {
        require_positive("spot price", spot)?;
        require_positive("strike price", strike)?;
        require_positive("time to expiry", ttl_years)?;

        if !sigma.is_finite() || sigma < 0.0 {
            return Err(PricerError::InvalidInput(format!(
                "volatility must be finite and >= 0, got {sigma}"
            )));
        }
        if !rate.is_finite() {
            return Err(PricerError::InvalidInput(format!(
                "risk-free rate must be finite, got {rate}"
            )));
        }
        if iterations == 0 {
            return Err(PricerError::InvalidInput(
                "iteration count must be >= 1".into(),
            ));
        }

        Ok(Self {
            spot,
            strike,
            ttl_years,
            sigma,
            rate,
            iterations,
        })
    }

    /// Convert days/percent inputs: T = days / 365, sigma = pct / 100, r = pct / 100.
    pub fn from_inputs(inputs: &PricingInputs) -> PricerResult<Self> {
        Self::new(
            inputs.spot_price,
            inputs.strike_price,
            inputs.days_to_expiry / DAYS_PER_YEAR,
            inputs.volatility_pct / 100.0,
            inputs.risk_free_rate_pct / 100.0,
            inputs.iterations,
        )
    }

    #[inline]
    pub fn spot(&self) -> f64 {
        self.spot
    }

    #[inline]
    pub fn strike(&self) -> f64 {
        self.strike
    }

    #[inline]
    pub fn ttl_years(&self) -> f64 {
        self.ttl_years
    }

    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[inline]
    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

fn require_positive(name: &str, value: f64) -> PricerResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PricerError::InvalidInput(format!(
            "{name} must be finite and > 0, got {value}"
        )))
    }
}
