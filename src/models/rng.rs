use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

/// Source of independent standard-normal draws for one pricing call.
///
/// The engine never touches process-wide random state: every call owns its
/// source, so concurrent requests and deterministic tests cannot interfere.
pub trait NormalSource {
    fn next_normal(&mut self) -> f64;
}

/// Seeded PRNG stream (StdRng + Ziggurat standard normal).
pub struct SeededNormals {
    inner: StdRng,
}

impl SeededNormals {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Independent stream for chunk `index` of a parallel run.
    pub fn for_chunk(base_seed: u64, index: u64) -> Self {
        Self::from_seed(mix_seed(base_seed, index))
    }
}

impl NormalSource for SeededNormals {
    #[inline]
    fn next_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.inner)
    }
}

/// Replays a fixed sequence of draws, wrapping around when exhausted.
pub struct FixedNormals {
    values: Vec<f64>,
    pos: usize,
}

impl FixedNormals {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, pos: 0 }
    }
}

impl NormalSource for FixedNormals {
    #[inline]
    fn next_normal(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let z = self.values[self.pos % self.values.len()];
        self.pos += 1;
        z
    }
}

/// SplitMix64 finaliser over (base, index) so adjacent chunk seeds decorrelate.
#[inline]
fn mix_seed(base: u64, index: u64) -> u64 {
    let mut z = base.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
