use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of monthly returns for buckets that are simulated rather than compounded
/// at a fixed rate.
pub trait ReturnSource {
    /// Returns a monthly return in `[min, max)`.
    fn next_monthly_return(&mut self, min: f64, max: f64) -> f64;
}

impl<T: ReturnSource + ?Sized> ReturnSource for &mut T {
    fn next_monthly_return(&mut self, min: f64, max: f64) -> f64 {
        (**self).next_monthly_return(min, max)
    }
}

/// Uniform draws from any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngReturns<R> {
    rng: R,
}

impl<R: Rng> RngReturns<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngReturns<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> ReturnSource for RngReturns<R> {
    fn next_monthly_return(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        self.rng.random_range(min..max)
    }
}

/// Replays a fixed sequence of returns, wrapping at the end. The requested range is
/// ignored, and an empty sequence yields 0.
#[derive(Debug, Clone)]
pub struct FixedReturns {
    values: Vec<f64>,
    cursor: usize,
}

impl FixedReturns {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }

    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl ReturnSource for FixedReturns {
    fn next_monthly_return(&mut self, _min: f64, _max: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}
