pub mod black_scholes;
pub mod diagnostics;
pub mod monte_carlo;
pub mod request;
pub mod rng;
pub mod volatility;

pub use monte_carlo::{CancelToken, MonteCarloEngine, PathCapture, PricingResult};
pub use request::PricingRequest;
pub use rng::SeededNormals;
