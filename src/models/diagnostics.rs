use crate::models::monte_carlo::PricingResult;
use statrs::distribution::{Continuous, Normal};

/// Points per band.
const BAND_POINTS: usize = 100;

/// Marker height above the density peak.
const PEAK_HEADROOM: f64 = 1.1;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceBand {
    pub estimate: f64,
    pub standard_error: Option<f64>,
    /// [C - 3SE, C - SE]
    pub lower_tail: Vec<Point>,
    /// [C - SE, C + SE]
    pub one_stderr: Vec<Point>,
    /// [C + SE, C + 3SE]
    pub upper_tail: Vec<Point>,
    /// Height of the vertical estimate marker.
    pub peak: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub paths: Vec<Point>,
    pub convergence: ConvergenceBand,
}

/// Chart-ready diagnostics for a pricing result.
///
/// Rendering is left to the client; this only produces the series:
/// - terminal prices against simulation number
/// - a normal density N(price, stderr) split into the outer and 1-stderr bands
pub fn chart_data(result: &PricingResult) -> ChartData {
    ChartData {
        paths: path_series(&result.terminal_prices),
        convergence: convergence_band(result.option_price, result.standard_error),
    }
}

pub fn path_series(terminal_prices: &[f64]) -> Vec<Point> {
    terminal_prices
        .iter()
        .enumerate()
        .map(|(i, &st)| Point { x: i as f64, y: st })
        .collect()
}

/// Density of the estimator around `estimate`. Collapses to a single point
/// when the standard error is missing or zero.
pub fn convergence_band(estimate: f64, standard_error: Option<f64>) -> ConvergenceBand {
    let se = standard_error.filter(|se| se.is_finite() && *se > 0.0);
    let normal = se.and_then(|se| Normal::new(estimate, se).ok());

    let (Some(se), Some(normal)) = (se, normal) else {
        return ConvergenceBand {
            estimate,
            standard_error,
            lower_tail: Vec::new(),
            one_stderr: vec![Point { x: estimate, y: 1.0 }],
            upper_tail: Vec::new(),
            peak: PEAK_HEADROOM,
        };
    };

    let band = |lo: f64, hi: f64| -> Vec<Point> {
        linspace(lo, hi, BAND_POINTS)
            .map(|x| Point { x, y: normal.pdf(x) })
            .collect()
    };

    let lower_tail = band(estimate - 3.0 * se, estimate - se);
    let one_stderr = band(estimate - se, estimate + se);
    let upper_tail = band(estimate + se, estimate + 3.0 * se);

    let peak = one_stderr.iter().map(|p| p.y).fold(0.0, f64::max) * PEAK_HEADROOM;

    ConvergenceBand {
        estimate,
        standard_error,
        lower_tail,
        one_stderr,
        upper_tail,
        peak,
    }
}

/// `n` evenly spaced values over [lo, hi], endpoints included.
fn linspace(lo: f64, hi: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = if n > 1 { (hi - lo) / (n - 1) as f64 } else { 0.0 };
    (0..n).map(move |i| if i + 1 == n { hi } else { lo + step * i as f64 })
}
