use crate::errors::{PricerError, PricerResult};
use crate::models::request::PricingRequest;
use crate::models::rng::{NormalSource, SeededNormals};
use portable_atomic::{AtomicBool, Ordering};
use rayon::prelude::*;
use std::str::FromStr;
use std::sync::Arc;

/// Draws per parallel chunk. Fixed so a seeded run gives the same answer on any thread count.
pub const CHUNK_PATHS: u64 = 65_536;

/// Draws between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Which simulated terminal prices are kept in the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCapture {
    /// Keep the first `n` draws.
    Prefix(usize),
    /// Keep every draw (memory grows with M).
    All,
}

impl Default for PathCapture {
    fn default() -> Self {
        PathCapture::Prefix(100)
    }
}

impl PathCapture {
    #[inline]
    fn retains(&self, index: u64) -> bool {
        match *self {
            PathCapture::Prefix(n) => index < n as u64,
            PathCapture::All => true,
        }
    }

    /// Number of prices retained from the draw range `[start, start + len)`.
    fn retained_in(&self, start: u64, len: u64) -> usize {
        let end = match *self {
            PathCapture::Prefix(n) => (n as u64).min(start + len),
            PathCapture::All => start + len,
        };
        end.saturating_sub(start) as usize
    }
}

impl FromStr for PathCapture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(PathCapture::All);
        }
        s.parse::<usize>()
            .map(PathCapture::Prefix)
            .map_err(|_| format!("expected \"all\" or a path count, got {s:?}"))
    }
}

/// Cooperative cancellation flag shared between the caller and a running simulation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Output of one pricing call.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResult {
    pub option_price: f64,
    /// `None` when M = 1 (no degrees of freedom) or the variance is not finite.
    pub standard_error: Option<f64>,
    pub terminal_prices: Vec<f64>,
    pub iterations: u64,
}

/// Per-call constants of the terminal price distribution.
#[derive(Debug, Clone, Copy)]
struct PathModel {
    ln_s0: f64,
    drift: f64,
    diffusion: f64,
    strike: f64,
    /// Payoffs are accumulated in units of max(S, K) so payoff^2 cannot overflow.
    scale: f64,
}

impl PathModel {
    fn new(req: &PricingRequest) -> Self {
        let t = req.ttl_years();
        let sigma = req.sigma();
        Self {
            ln_s0: req.spot().ln(),
            drift: (req.rate() - 0.5 * sigma * sigma) * t,
            diffusion: sigma * t.sqrt(),
            strike: req.strike(),
            scale: req.spot().max(req.strike()),
        }
    }

    #[inline]
    fn terminal_price(&self, z: f64) -> f64 {
        (self.ln_s0 + self.drift + self.diffusion * z).exp()
    }

    /// Payoff in units of `scale`.
    #[inline]
    fn scaled_payoff(&self, terminal: f64) -> f64 {
        (terminal - self.strike).max(0.0) / self.scale
    }
}

/// Running sums of scaled payoffs for a contiguous range of draws.
#[derive(Debug, Default)]
struct Accumulator {
    sum: f64,
    sum_sq: f64,
    count: u64,
    terminal_prices: Vec<f64>,
}

impl Accumulator {
    fn merge(&mut self, other: Accumulator) {
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.count += other.count;
        self.terminal_prices.extend(other.terminal_prices);
    }
}

/// Monte Carlo pricing of a European call under risk-neutral GBM.
///
/// One-step exact simulation of the terminal price:
///
///   ln S_T = ln S_0 + (r - sigma^2/2) * T + sigma * sqrt(T) * Z,   Z ~ N(0, 1)
///
/// price = e^{-rT} * mean(max(S_T - K, 0))
/// stderr = sqrt(sample variance of discounted payoff) / sqrt(M)
#[derive(Debug, Clone, Copy, Default)]
pub struct MonteCarloEngine {
    capture: PathCapture,
}

impl MonteCarloEngine {
    pub fn new(capture: PathCapture) -> Self {
        Self { capture }
    }

    /// Single-threaded pricing with a caller-owned random source.
    pub fn price<R: NormalSource>(&self, req: &PricingRequest, rng: &mut R) -> PricingResult {
        let model = PathModel::new(req);
        // Without a cancel token the range always completes.
        let acc = simulate_range(&model, 0, req.iterations(), self.capture, rng, None)
            .unwrap_or_default();
        finish(req, &model, acc)
    }

    /// Single-threaded pricing that aborts with `Cancelled` once `cancel` is set.
    pub fn price_cancellable<R: NormalSource>(
        &self,
        req: &PricingRequest,
        rng: &mut R,
        cancel: &CancelToken,
    ) -> PricerResult<PricingResult> {
        let model = PathModel::new(req);
        let acc = simulate_range(&model, 0, req.iterations(), self.capture, rng, Some(cancel))?;
        Ok(finish(req, &model, acc))
    }

    /// Chunked parallel pricing on the rayon pool.
    ///
    /// Chunk `i` draws from its own stream `SeededNormals::for_chunk(base_seed, i)`.
    /// Partial sums are combined in chunk order after every chunk has finished,
    /// so a given seed reproduces the same result on any thread count. Not
    /// bit-identical to `price` (different streams and summation order).
    pub fn price_parallel(
        &self,
        req: &PricingRequest,
        base_seed: u64,
        cancel: &CancelToken,
    ) -> PricerResult<PricingResult> {
        let model = PathModel::new(req);
        let m = req.iterations();
        let n_chunks = m.div_ceil(CHUNK_PATHS) as usize;
        let capture = self.capture;

        let partials: Vec<Accumulator> = (0..n_chunks)
            .into_par_iter()
            .map(|i| {
                let i = i as u64;
                let start = i * CHUNK_PATHS;
                let len = CHUNK_PATHS.min(m - start);
                let mut rng = SeededNormals::for_chunk(base_seed, i);
                simulate_range(&model, start, len, capture, &mut rng, Some(cancel))
            })
            .collect::<PricerResult<Vec<_>>>()?;

        let mut total = Accumulator::default();
        for partial in partials {
            total.merge(partial);
        }

        tracing::debug!(
            iterations = m,
            chunks = n_chunks,
            threads = rayon::current_num_threads(),
            "parallel simulation complete"
        );

        Ok(finish(req, &model, total))
    }
}

/// Simulate draws `[start, start + len)`. `start` is the global draw index, used for capture.
fn simulate_range<R: NormalSource>(
    model: &PathModel,
    start: u64,
    len: u64,
    capture: PathCapture,
    rng: &mut R,
    cancel: Option<&CancelToken>,
) -> PricerResult<Accumulator> {
    let mut acc = Accumulator {
        terminal_prices: Vec::with_capacity(capture.retained_in(start, len)),
        ..Accumulator::default()
    };

    for i in 0..len {
        if i % CANCEL_CHECK_INTERVAL == 0 && cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(PricerError::Cancelled);
        }

        let z = rng.next_normal();
        let terminal = model.terminal_price(z);
        let payoff = model.scaled_payoff(terminal);

        acc.sum += payoff;
        acc.sum_sq += payoff * payoff;

        if capture.retains(start + i) {
            acc.terminal_prices.push(terminal);
        }
    }
    acc.count = len;

    Ok(acc)
}

fn finish(req: &PricingRequest, model: &PathModel, acc: Accumulator) -> PricingResult {
    let r = req.rate();
    let t = req.ttl_years();
    let m = acc.count as f64;

    let option_price = (-r * t).exp() * (acc.sum / m) * model.scale;

    let standard_error = if acc.count < 2 {
        None
    } else {
        let raw = (acc.sum_sq - acc.sum * acc.sum / m) * (-2.0 * r * t).exp() / (m - 1.0);
        // Cancellation can dip just below zero for near-constant payoffs. NaN stays NaN.
        let variance = if raw < 0.0 { 0.0 } else { raw };
        let se = variance.sqrt() / m.sqrt() * model.scale;
        se.is_finite().then_some(se)
    };

    PricingResult {
        option_price,
        standard_error,
        terminal_prices: acc.terminal_prices,
        iterations: acc.count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::black_scholes;
    use crate::models::rng::FixedNormals;

    fn scenario(iterations: u64) -> PricingRequest {
        PricingRequest::new(100.0, 100.0, 40.0 / 365.0, 0.20, 0.025, iterations).unwrap()
    }

    #[test]
    fn test_scenario_near_black_scholes() {
        let req = scenario(100_000);
        let engine = MonteCarloEngine::default();
        let result = engine.price(&req, &mut SeededNormals::from_seed(42));

        let bs = black_scholes::call_price(100.0, 100.0, 40.0 / 365.0, 0.20, 0.025);
        let se = result.standard_error.unwrap();

        assert!(
            (result.option_price - bs).abs() < 0.08,
            "MC price {} should be within a few cents of BS {bs}",
            result.option_price
        );
        assert!(se > 0.005 && se < 0.03, "stderr={se} out of expected range");
        assert_eq!(result.terminal_prices.len(), 100);
        assert_eq!(result.iterations, 100_000);
    }

    #[test]
    fn test_stderr_scales_with_sqrt_m() {
        let engine = MonteCarloEngine::new(PathCapture::Prefix(0));
        let small = engine.price(&scenario(100_000), &mut SeededNormals::from_seed(1));
        let large = engine.price(&scenario(400_000), &mut SeededNormals::from_seed(2));

        let ratio = small.standard_error.unwrap() / large.standard_error.unwrap();
        assert!(
            (1.8..2.2).contains(&ratio),
            "4x draws should halve stderr, ratio={ratio}"
        );
    }

    #[test]
    fn test_deterministic_under_fixed_draws() {
        let req = PricingRequest::new(100.0, 95.0, 0.5, 0.3, 0.05, 4).unwrap();
        let draws = vec![0.0, 1.0, -1.0, 0.25];
        let engine = MonteCarloEngine::new(PathCapture::All);

        let a = engine.price(&req, &mut FixedNormals::new(draws.clone()));
        let b = engine.price(&req, &mut FixedNormals::new(draws.clone()));
        assert_eq!(a.option_price.to_bits(), b.option_price.to_bits());
        assert_eq!(
            a.standard_error.map(f64::to_bits),
            b.standard_error.map(f64::to_bits)
        );

        // Recompute by hand.
        let t: f64 = 0.5;
        let drift = (0.05 - 0.5 * 0.3 * 0.3) * t;
        let diffusion = 0.3 * t.sqrt();
        let payoffs: Vec<f64> = draws
            .iter()
            .map(|z| ((100.0f64.ln() + drift + diffusion * z).exp() - 95.0).max(0.0))
            .collect();
        let mean = payoffs.iter().sum::<f64>() / 4.0;
        let expected_price = (-0.05 * t).exp() * mean;
        let var = payoffs.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / 3.0
            * (-2.0 * 0.05 * t).exp();
        let expected_se = var.sqrt() / 2.0;

        assert!((a.option_price - expected_price).abs() < 1e-12);
        assert!((a.standard_error.unwrap() - expected_se).abs() < 1e-9);
        assert_eq!(a.terminal_prices.len(), 4);
    }

    #[test]
    fn test_zero_vol_is_deterministic_forward() {
        let (s, k, t, r) = (100.0, 95.0, 0.25, 0.04);
        let req = PricingRequest::new(s, k, t, 0.0, r, 500).unwrap();
        let engine = MonteCarloEngine::new(PathCapture::All);
        let result = engine.price(&req, &mut SeededNormals::from_seed(9));

        let forward = s * (r * t).exp();
        for &st in &result.terminal_prices {
            assert!((st - forward).abs() < 1e-9, "S_T={st} should equal forward {forward}");
        }
        let expected = (-r * t).exp() * (forward - k).max(0.0);
        assert!((result.option_price - expected).abs() < 1e-9);
        assert!(result.standard_error.unwrap() < 1e-6);
    }

    #[test]
    fn test_zero_vol_otm_is_worthless() {
        let req = PricingRequest::new(100.0, 150.0, 0.25, 0.0, 0.01, 50).unwrap();
        let result = MonteCarloEngine::default().price(&req, &mut SeededNormals::from_seed(3));
        assert_eq!(result.option_price, 0.0);
        assert_eq!(result.standard_error, Some(0.0));
    }

    #[test]
    fn test_huge_spot_keeps_real_stderr() {
        let req = PricingRequest::new(1e200, 1.0, 1.0, 0.2, 0.0, 3).unwrap();
        let mut draws = FixedNormals::new(vec![-1.0, 0.0, 1.0]);
        let result = MonteCarloEngine::new(PathCapture::All).price(&req, &mut draws);

        // Sample stderr of the payoffs, computed in units of 1e200.
        let x: Vec<f64> = result
            .terminal_prices
            .iter()
            .map(|st| (st - 1.0) / 1e200)
            .collect();
        let mean = x.iter().sum::<f64>() / 3.0;
        let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 2.0;
        let expected = var.sqrt() / 3f64.sqrt() * 1e200;

        let se = result.standard_error.unwrap();
        assert!(result.option_price.is_finite());
        assert!(se > 0.0, "distinct payoffs must not report zero stderr");
        assert!(((se - expected) / expected).abs() < 1e-9, "se={se} expected={expected}");
    }

    #[test]
    fn test_non_finite_variance_has_no_stderr() {
        let req = scenario(3);
        let model = PathModel::new(&req);
        let acc = Accumulator {
            sum: f64::INFINITY,
            sum_sq: f64::INFINITY,
            count: 3,
            terminal_prices: Vec::new(),
        };
        assert!(finish(&req, &model, acc).standard_error.is_none());
    }

    #[test]
    fn test_single_draw_has_no_stderr() {
        let req = scenario(1);
        let result = MonteCarloEngine::default().price(&req, &mut SeededNormals::from_seed(5));
        assert!(result.standard_error.is_none());
        assert!(result.option_price >= 0.0);
        assert_eq!(result.terminal_prices.len(), 1);
    }

    #[test]
    fn test_payoff_floor_and_positive_terminals() {
        // Deep OTM with huge negative draws: payoffs clamp at zero.
        let req = PricingRequest::new(50.0, 100.0, 1.0, 0.5, 0.0, 3).unwrap();
        let mut draws = FixedNormals::new(vec![-8.0, -3.0, 0.0]);
        let result = MonteCarloEngine::new(PathCapture::All).price(&req, &mut draws);
        assert_eq!(result.option_price, 0.0);
        assert!(result.terminal_prices.iter().all(|&st| st > 0.0));

        let req = scenario(10_000);
        let result =
            MonteCarloEngine::new(PathCapture::All).price(&req, &mut SeededNormals::from_seed(11));
        assert!(result.option_price >= 0.0);
        assert!(result.terminal_prices.iter().all(|&st| st > 0.0 && st.is_finite()));
    }

    #[test]
    fn test_capture_policy() {
        let req = scenario(1000);
        let run = |capture| {
            MonteCarloEngine::new(capture)
                .price(&req, &mut SeededNormals::from_seed(8))
                .terminal_prices
        };
        assert_eq!(run(PathCapture::Prefix(100)).len(), 100);
        assert_eq!(run(PathCapture::Prefix(0)).len(), 0);
        assert_eq!(run(PathCapture::Prefix(5000)).len(), 1000);
        assert_eq!(run(PathCapture::All).len(), 1000);

        // Capture choice does not change the draws.
        assert_eq!(run(PathCapture::Prefix(100))[..], run(PathCapture::All)[..100]);
    }

    #[test]
    fn test_path_capture_parse() {
        assert_eq!("all".parse::<PathCapture>(), Ok(PathCapture::All));
        assert_eq!(" ALL ".parse::<PathCapture>(), Ok(PathCapture::All));
        assert_eq!("250".parse::<PathCapture>(), Ok(PathCapture::Prefix(250)));
        assert!("-1".parse::<PathCapture>().is_err());
        assert!("some".parse::<PathCapture>().is_err());
    }

    #[test]
    fn test_parallel_reproducible_and_accurate() {
        let req = scenario(300_000);
        let engine = MonteCarloEngine::default();
        let cancel = CancelToken::new();

        let a = engine.price_parallel(&req, 77, &cancel).unwrap();
        let b = engine.price_parallel(&req, 77, &cancel).unwrap();
        assert_eq!(a.option_price.to_bits(), b.option_price.to_bits());
        assert_eq!(a.iterations, 300_000);
        assert_eq!(a.terminal_prices.len(), 100);

        let bs = black_scholes::call_price(100.0, 100.0, 40.0 / 365.0, 0.20, 0.025);
        assert!(
            (a.option_price - bs).abs() < 0.06,
            "parallel MC {} vs BS {bs}",
            a.option_price
        );
    }

    #[test]
    fn test_parallel_first_chunk_matches_sequential_stream() {
        let req = scenario(CHUNK_PATHS * 2 + 17);
        let engine = MonteCarloEngine::new(PathCapture::Prefix(100));
        let par = engine.price_parallel(&req, 123, &CancelToken::new()).unwrap();
        let seq = engine.price(&req, &mut SeededNormals::for_chunk(123, 0));
        assert_eq!(par.terminal_prices, seq.terminal_prices);
    }

    #[test]
    fn test_parallel_capture_all_spans_chunks() {
        let m = CHUNK_PATHS + 10;
        let req = scenario(m);
        let result = MonteCarloEngine::new(PathCapture::All)
            .price_parallel(&req, 5, &CancelToken::new())
            .unwrap();
        assert_eq!(result.terminal_prices.len() as u64, m);
    }

    #[test]
    fn test_cancelled_run_discards_partial_sums() {
        let req = scenario(500_000);
        let cancel = CancelToken::new();
        cancel.cancel();

        let engine = MonteCarloEngine::default();
        assert!(matches!(
            engine.price_parallel(&req, 1, &cancel),
            Err(PricerError::Cancelled)
        ));
        assert!(matches!(
            engine.price_cancellable(&req, &mut SeededNormals::from_seed(1), &cancel),
            Err(PricerError::Cancelled)
        ));
    }
}
