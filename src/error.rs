//! Error types for the UDP connection simulator

use thiserror::Error;

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Error types for the simulated protocol
#[derive(Error, Debug)]
pub enum SimError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Datagram whose length is inconsistent with the layout its kind implies
    #[error("malformed message: {reason}")]
    Malformed { reason: String },

    /// No SYN_ACK within the retry bound; fatal to the session
    #[error("handshake failed after {attempts} attempts")]
    Handshake { attempts: u32 },

    /// Per-exchange retry exhaustion
    #[error("exchange timed out after {attempts} attempts of {timeout_ms}ms")]
    Timeout { attempts: u32, timeout_ms: u64 },

    /// FIN_ACK not received; reported but not fatal
    #[error("teardown failed: no FIN_ACK after {attempts} attempts")]
    Teardown { attempts: u32 },

    /// Operation requires an established session
    #[error("session not connected")]
    NotConnected,

    /// Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl SimError {
    /// Create a malformed-message error
    pub fn malformed(reason: impl Into<String>) -> Self {
        SimError::Malformed {
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        SimError::Config {
            message: message.into(),
        }
    }

    /// Errors the session recovers from locally; only handshake failure
    /// aborts a client run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SimError::Malformed { .. } | SimError::Timeout { .. } | SimError::Teardown { .. } => {
                true
            }
            SimError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
