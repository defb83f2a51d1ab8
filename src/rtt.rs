//! Round-trip time accounting for one client session

/// Accumulates RTT samples and attempt counts for one session.
///
/// Owned exclusively by the session that feeds it; samples are recorded only
/// for exchanges that were acknowledged within the retry bound.
#[derive(Debug, Default)]
pub struct RttTracker {
    samples: Vec<f64>,
    attempts: u64,
}

impl RttTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully acknowledged exchange
    pub fn record(&mut self, rtt_ms: f64) {
        self.attempts += 1;
        self.samples.push(rtt_ms);
    }

    /// Record an exchange that exhausted its retries without a reply
    pub fn record_lost(&mut self) {
        self.attempts += 1;
    }

    /// Number of acknowledged exchanges
    pub fn received_count(&self) -> usize {
        self.samples.len()
    }

    /// Number of attempted exchanges
    pub fn attempt_count(&self) -> u64 {
        self.attempts
    }

    /// Recorded samples, in arrival order
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Summary statistics over the recorded samples.
    ///
    /// With fewer than 2 samples, min/max/mean/stddev all report zero; this
    /// is the defined fallback, not an error.
    pub fn summary(&self) -> RttSummary {
        let count = self.samples.len();
        let loss_rate = if self.attempts == 0 {
            0.0
        } else {
            (self.attempts - count as u64) as f64 / self.attempts as f64
        };

        if count < 2 {
            return RttSummary {
                count,
                loss_rate,
                min_ms: 0.0,
                max_ms: 0.0,
                mean_ms: 0.0,
                stddev_ms: 0.0,
            };
        }

        let min_ms = self.samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = self
            .samples
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let mean_ms = self.samples.iter().sum::<f64>() / count as f64;
        // Sample standard deviation (n - 1 denominator)
        let variance = self
            .samples
            .iter()
            .map(|&s| (s - mean_ms).powi(2))
            .sum::<f64>()
            / (count - 1) as f64;

        RttSummary {
            count,
            loss_rate,
            min_ms,
            max_ms,
            mean_ms,
            stddev_ms: variance.sqrt(),
        }
    }
}

/// Snapshot of RTT statistics for one session
#[derive(Debug, Clone, PartialEq)]
pub struct RttSummary {
    pub count: usize,
    pub loss_rate: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub stddev_ms: f64,
}
