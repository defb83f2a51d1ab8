//! Client-side session state machine
//!
//! One [`ClientSession`] drives a full lifecycle against a server: three-way
//! handshake, a fixed number of sequenced data exchanges with RTT timing,
//! then best-effort four-way teardown. The client is single-threaded; each
//! exchange is a blocking send followed by a timed receive, retried up to the
//! configured bound.

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::message::{timestamp_str, Message};
use crate::rtt::{RttSummary, RttTracker};
use crate::transport::{Transport, UdpTransport};

use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, trace, warn};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Exchanging,
    Disconnecting,
    Closed,
    Failed,
}

/// Result of one data exchange
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    /// The request was acknowledged within the retry bound
    Reply {
        seq: u16,
        server_time: String,
        rtt_ms: f64,
    },
    /// Every attempt timed out; the exchange is recorded as a loss
    TimedOut { seq: u16 },
}

/// End-of-run report for one session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub received: usize,
    pub attempted: u64,
    pub rtt: RttSummary,
    pub elapsed: Duration,
    pub clean_shutdown: bool,
}

/// One client session: `connect → [data exchange]* → disconnect`.
///
/// Owns its sequence counter and RTT tracker exclusively; nothing is shared
/// across sessions. Generic over [`Transport`] so tests can script the peer.
pub struct ClientSession<T: Transport = UdpTransport> {
    transport: T,
    server_addr: SocketAddr,
    config: SimConfig,
    state: SessionState,
    seq: u16,
    tracker: RttTracker,
}

impl ClientSession<UdpTransport> {
    /// Bind an ephemeral UDP socket targeting `server_addr`.
    ///
    /// No traffic is sent until [`connect`](Self::connect) or
    /// [`run`](Self::run).
    pub async fn bind(server_addr: SocketAddr, config: SimConfig) -> Result<Self> {
        let transport = UdpTransport::bind_ephemeral().await?;
        Self::with_transport(transport, server_addr, config)
    }
}

impl<T: Transport> ClientSession<T> {
    /// Create a session over an existing transport.
    pub fn with_transport(transport: T, server_addr: SocketAddr, config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            server_addr,
            config,
            state: SessionState::Idle,
            seq: 1,
            tracker: RttTracker::new(),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sequence number the next data request will carry
    pub fn sequence_number(&self) -> u16 {
        self.seq
    }

    /// RTT accounting for this session
    pub fn tracker(&self) -> &RttTracker {
        &self.tracker
    }

    /// Address of the targeted server
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Establish the session with a three-way handshake.
    ///
    /// Sends SYN under the bounded-retry policy and, on SYN_ACK, answers
    /// with a fire-and-forget ACK. Retry exhaustion (or any reply that is
    /// not a SYN_ACK) is fatal to the session: the state becomes `Failed`
    /// and no data exchange is attempted.
    pub async fn connect(&mut self) -> Result<()> {
        self.state = SessionState::Connecting;

        match self.exchange(&Message::Syn).await? {
            Some((Message::SynAck, _)) => {
                self.transport
                    .send_to(&Message::Ack.encode(), self.server_addr)
                    .await?;
                self.state = SessionState::Connected;
                info!(peer = %self.server_addr, "connection established");
                Ok(())
            }
            other => {
                if let Some((reply, _)) = other {
                    debug!(kind = reply.kind_str(), "unexpected handshake reply");
                }
                self.state = SessionState::Failed;
                Err(SimError::Handshake {
                    attempts: self.config.max_attempts,
                })
            }
        }
    }

    /// Send one data request and wait for its response.
    ///
    /// The sequence number advances exactly once per call, whether or not a
    /// response arrived. RTT is recorded only when the reply is a data
    /// response; a timed-out or mismatched exchange counts as a loss and the
    /// session continues.
    pub async fn send_data_request(&mut self, payload: Bytes) -> Result<ExchangeOutcome> {
        if !matches!(
            self.state,
            SessionState::Connected | SessionState::Exchanging
        ) {
            return Err(SimError::NotConnected);
        }
        self.state = SessionState::Exchanging;

        let seq = self.seq;
        let request = Message::DataRequest {
            seq,
            version: self.config.protocol_version,
            payload,
        };

        let outcome = self.exchange(&request).await?;
        self.seq = self.seq.wrapping_add(1);

        match outcome {
            Some((
                Message::DataResponse {
                    seq: reply_seq,
                    timestamp,
                    ..
                },
                rtt_ms,
            )) => {
                if reply_seq != seq {
                    trace!(sent = seq, replied = reply_seq, "sequence mismatch in reply");
                }
                self.tracker.record(rtt_ms);
                Ok(ExchangeOutcome::Reply {
                    seq,
                    server_time: timestamp_str(&timestamp),
                    rtt_ms,
                })
            }
            Some((reply, _)) => {
                debug!(seq, kind = reply.kind_str(), "non-data reply to data request");
                self.tracker.record_lost();
                Ok(ExchangeOutcome::TimedOut { seq })
            }
            None => {
                self.tracker.record_lost();
                Ok(ExchangeOutcome::TimedOut { seq })
            }
        }
    }

    /// Tear the session down with a best-effort four-way exchange.
    ///
    /// Sends FIN under the bounded-retry policy; after FIN_ACK, waits one
    /// timed receive (no retry) for the peer's closing datagram and then
    /// fires the final FIN_ACK2. If FIN_ACK never arrives the teardown is
    /// reported as failed, but the session was otherwise complete.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.state = SessionState::Disconnecting;

        match self.exchange(&Message::Fin).await? {
            Some((Message::FinAck, _)) => {
                let mut buf = vec![0u8; 1024];
                let _ = timeout(self.config.recv_timeout, self.transport.recv_from(&mut buf)).await;
                self.transport
                    .send_to(&Message::FinAck2.encode(), self.server_addr)
                    .await?;
                self.state = SessionState::Closed;
                info!(peer = %self.server_addr, "connection closed");
                Ok(())
            }
            _ => {
                self.state = SessionState::Failed;
                Err(SimError::Teardown {
                    attempts: self.config.max_attempts,
                })
            }
        }
    }

    /// Drive a full session lifecycle and return the end-of-run report.
    ///
    /// Only handshake failure aborts the run; timed-out exchanges and a
    /// failed teardown are recorded and the report is still produced.
    pub async fn run(&mut self) -> Result<SessionReport> {
        self.connect().await?;

        let started = Instant::now();
        for _ in 0..self.config.total_exchanges {
            let payload = self.config.payload.clone();
            match self.send_data_request(payload).await? {
                ExchangeOutcome::Reply {
                    seq,
                    server_time,
                    rtt_ms,
                } => {
                    info!(
                        seq,
                        peer = %self.server_addr,
                        rtt_ms,
                        server_time = %server_time,
                        "exchange acknowledged"
                    );
                }
                ExchangeOutcome::TimedOut { seq } => {
                    warn!(seq, peer = %self.server_addr, "request timed out");
                }
            }
        }
        let elapsed = started.elapsed();

        let clean_shutdown = match self.disconnect().await {
            Ok(()) => true,
            Err(e) if e.is_recoverable() => {
                warn!(peer = %self.server_addr, error = %e, "teardown failed");
                false
            }
            Err(e) => return Err(e),
        };

        Ok(SessionReport {
            received: self.tracker.received_count(),
            attempted: self.tracker.attempt_count(),
            rtt: self.tracker.summary(),
            elapsed,
            clean_shutdown,
        })
    }

    /// Bounded-retry send/receive cycle shared by connect, data requests and
    /// teardown: send, await any reply up to the configured timeout, resend
    /// on timeout, up to `max_attempts` total sends. A malformed datagram
    /// counts as no reply for that attempt; a well-formed reply of any kind
    /// ends the loop (the caller validates it). `None` means exhaustion.
    async fn exchange(&self, message: &Message) -> Result<Option<(Message, f64)>> {
        let wire = message.encode();
        let mut buf = vec![0u8; 1024];

        for attempt in 1..=self.config.max_attempts {
            self.transport.send_to(&wire, self.server_addr).await?;
            let sent_at = Instant::now();

            let received =
                timeout(self.config.recv_timeout, self.transport.recv_from(&mut buf)).await;
            match received {
                Ok(Ok((n, _from))) => {
                    let rtt_ms = sent_at.elapsed().as_secs_f64() * 1000.0;
                    match Message::decode(Bytes::copy_from_slice(&buf[..n])) {
                        Ok(reply) => {
                            trace!(kind = reply.kind_str(), attempt, rtt_ms, "reply received");
                            return Ok(Some((reply, rtt_ms)));
                        }
                        Err(e) => {
                            debug!(attempt, error = %e, "discarding malformed reply");
                        }
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_elapsed) => {
                    trace!(
                        kind = message.kind_str(),
                        attempt,
                        "no reply within timeout"
                    );
                }
            }
        }

        Ok(None)
    }
}
