use statrs::distribution::{ContinuousCDF, Normal};

/// Black-Scholes European call.
///
/// C = S * Phi(d1) - K * e^{-rT} * Phi(d2)
///
/// where d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// and   d2 = d1 - sigma * sqrt(T)
///
/// Reference value for the Monte Carlo estimate. Degenerate inputs
/// (zero vol or zero time) collapse to discounted intrinsic value.
pub fn call_price(spot: f64, strike: f64, ttl_years: f64, sigma: f64, rate: f64) -> f64 {
    let discount = (-rate * ttl_years).exp();
    let sigma_sqrt_t = sigma * ttl_years.sqrt();

    if sigma_sqrt_t < 1e-12 || ttl_years <= 0.0 {
        return (spot - strike * discount).max(0.0);
    }

    // Normal::new(0, 1) only fails if std_dev <= 0.
    let normal = Normal::new(0.0, 1.0).unwrap_or(Normal::standard());

    let d1 = ((spot / strike).ln() + (rate + 0.5 * sigma * sigma) * ttl_years) / sigma_sqrt_t;
    let d2 = d1 - sigma_sqrt_t;

    spot * normal.cdf(d1) - strike * discount * normal.cdf(d2)
}
