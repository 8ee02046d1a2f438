use statrs::statistics::Statistics;

/// Trading days used to annualize daily return volatility.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Minimum closes for a sample std dev of returns (two returns, n - 1 = 1).
pub const MIN_CLOSES: usize = 3;

/// Annualized historical volatility in percent from a daily close series.
///
/// vol = stdev(daily pct returns) * sqrt(252) * 100, sample (n - 1) stdev.
///
/// Non-finite or non-positive closes are skipped. Returns `None` when fewer
/// than `MIN_CLOSES` usable closes remain.
pub fn historical_volatility_pct(closes: &[f64]) -> Option<f64> {
    let clean: Vec<f64> = closes
        .iter()
        .copied()
        .filter(|c| c.is_finite() && *c > 0.0)
        .collect();

    if clean.len() < MIN_CLOSES {
        return None;
    }

    let returns: Vec<f64> = clean.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    let daily = returns.iter().std_dev();

    if !daily.is_finite() {
        return None;
    }

    Some(daily * TRADING_DAYS_PER_YEAR.sqrt() * 100.0)
}
