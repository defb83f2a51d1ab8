//! Configuration for sessions and handlers

use crate::error::{Result, SimError};
use bytes::Bytes;
use std::time::Duration;

/// Protocol version stamped on every data request/response
pub const DEFAULT_PROTOCOL_VERSION: u8 = 2;

/// Session configuration builder
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Protocol version carried on data messages
    pub protocol_version: u8,
    /// Data exchanges performed by one client run
    pub total_exchanges: u32,
    /// Probability that the server drops a data response
    pub loss_probability: f64,
    /// Per-attempt receive timeout
    pub recv_timeout: Duration,
    /// Total send attempts per exchange
    pub max_attempts: u32,
    /// Server-side wait for the handshake ACK
    pub handshake_timeout: Duration,
    /// Opaque blob carried on each data request
    pub payload: Bytes,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            total_exchanges: 12,
            loss_probability: 0.3,
            recv_timeout: Duration::from_millis(100),
            max_attempts: 3,
            handshake_timeout: Duration::from_secs(5),
            payload: Bytes::from_static(b"udpsim-probe"),
        }
    }
}

impl SimConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the protocol version
    pub fn protocol_version(mut self, version: u8) -> Self {
        self.protocol_version = version;
        self
    }

    /// Set the number of data exchanges per run
    pub fn total_exchanges(mut self, total: u32) -> Self {
        self.total_exchanges = total;
        self
    }

    /// Set the server-side drop probability
    pub fn loss_probability(mut self, p: f64) -> Self {
        self.loss_probability = p;
        self
    }

    /// Set the per-attempt receive timeout
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Set the total attempts per exchange
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the server-side handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the data request payload
    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Configuration with loss injection disabled
    pub fn lossless() -> Self {
        Self::default().loss_probability(0.0)
    }

    /// Configuration with a forced drop probability, for tests
    pub fn lossy(p: f64) -> Self {
        Self::default().loss_probability(p)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.loss_probability) {
            return Err(SimError::config(
                "loss probability must be within [0.0, 1.0]",
            ));
        }

        if self.max_attempts == 0 {
            return Err(SimError::config("max attempts must be greater than 0"));
        }

        if self.recv_timeout.is_zero() {
            return Err(SimError::config("receive timeout must be greater than 0"));
        }

        Ok(())
    }
}
