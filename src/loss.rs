//! Simulated packet loss for data responses

use rand::Rng;

/// Independent per-call drop decision with a fixed probability.
///
/// Each handler owns its own instance; there is no memory between calls.
#[derive(Debug, Clone)]
pub struct LossSimulator {
    probability: f64,
}

impl LossSimulator {
    /// Create a simulator with the given drop probability.
    ///
    /// The probability is expected to be validated upstream by
    /// [`SimConfig::validate`](crate::config::SimConfig::validate).
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }

    /// Configured drop probability
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Decide whether to drop the next data response.
    ///
    /// The sample is drawn from [0, 1), so 0.0 never drops and 1.0 always
    /// drops; the boundaries are exact, not probabilistic.
    pub fn should_drop(&self) -> bool {
        rand::thread_rng().gen::<f64>() < self.probability
    }
}
