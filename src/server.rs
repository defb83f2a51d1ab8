//! Server dispatcher and per-connection handlers
//!
//! One [`ServerDispatcher`] owns the shared socket and demultiplexes inbound
//! datagrams by source address: each decoded message is routed through an
//! address-keyed registry to its handler's inbox. A SYN from an unknown peer
//! spawns a new [`ConnectionHandler`] task; every handler owns its own state
//! (including its loss simulator) and removes its registry entry on exit.

use crate::config::SimConfig;
use crate::error::Result;
use crate::loss::LossSimulator;
use crate::message::{timestamp_str, Message, TIMESTAMP_LEN};
use crate::transport::{Transport, UdpTransport};

use bytes::Bytes;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

/// Registry of active handlers, keyed by client address
type HandlerRegistry = Arc<DashMap<SocketAddr, mpsc::Sender<Message>>>;

/// Depth of each handler's inbox
const INBOX_DEPTH: usize = 64;

/// Shared-socket dispatch loop with explicit per-address demultiplexing
pub struct ServerDispatcher<T: Transport = UdpTransport> {
    transport: Arc<T>,
    config: SimConfig,
    handlers: HandlerRegistry,
    local_addr: SocketAddr,
}

impl ServerDispatcher<UdpTransport> {
    /// Bind the shared UDP socket to `addr`.
    pub async fn bind(addr: SocketAddr, config: SimConfig) -> Result<Self> {
        let transport = UdpTransport::bind(addr).await?;
        Self::with_transport(Arc::new(transport), config)
    }
}

impl<T: Transport> ServerDispatcher<T> {
    /// Create a dispatcher over an existing transport.
    pub fn with_transport(transport: Arc<T>, config: SimConfig) -> Result<Self> {
        config.validate()?;
        let local_addr = transport.local_addr()?;
        Ok(Self {
            transport,
            config,
            handlers: Arc::new(DashMap::new()),
            local_addr,
        })
    }

    /// Address the shared socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently registered handlers
    pub fn active_connections(&self) -> usize {
        self.handlers.len()
    }

    /// Receive datagrams and route them until the socket fails.
    ///
    /// Malformed datagrams are logged and dropped; non-SYN traffic from an
    /// unknown peer is discarded. Handlers never block the dispatch loop: a
    /// full inbox drops the message instead.
    pub async fn run(&self) -> Result<()> {
        info!(addr = %self.local_addr, "server dispatcher started");
        let mut buf = vec![0u8; 2048];

        loop {
            let (n, peer) = match self.transport.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    error!(error = %e, "UDP receive failed");
                    return Err(e.into());
                }
            };

            let message = match Message::decode(Bytes::copy_from_slice(&buf[..n])) {
                Ok(message) => message,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "dropping malformed datagram");
                    continue;
                }
            };

            if let Some(inbox) = self.handlers.get(&peer) {
                if inbox.try_send(message).is_err() {
                    trace!(peer = %peer, "handler inbox unavailable, message dropped");
                }
                continue;
            }

            match message {
                Message::Syn => self.spawn_handler(peer),
                other => {
                    trace!(
                        peer = %peer,
                        kind = other.kind_str(),
                        "no session for peer, message discarded"
                    );
                }
            }
        }
    }

    /// Register and spawn a handler for a new peer.
    fn spawn_handler(&self, peer: SocketAddr) {
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_DEPTH);
        self.handlers.insert(peer, inbox_tx);
        debug!(peer = %peer, "handshake attempt, handler spawned");

        let handler = ConnectionHandler {
            transport: self.transport.clone(),
            peer,
            config: self.config.clone(),
            loss: LossSimulator::new(self.config.loss_probability),
            registry: self.handlers.clone(),
        };
        tokio::spawn(handler.run(inbox_rx));
    }
}

/// Per-client handler task.
///
/// Completes the three-way handshake, answers data requests (subject to the
/// simulated loss decision) and terminates on FIN. All state is handler-local;
/// only the transport is shared, for sending.
struct ConnectionHandler<T: Transport> {
    transport: Arc<T>,
    peer: SocketAddr,
    config: SimConfig,
    loss: LossSimulator,
    registry: HandlerRegistry,
}

impl<T: Transport> ConnectionHandler<T> {
    async fn run(self, inbox: mpsc::Receiver<Message>) {
        self.serve(inbox).await;
        self.registry.remove(&self.peer);
        debug!(peer = %self.peer, "handler deregistered");
    }

    async fn serve(&self, mut inbox: mpsc::Receiver<Message>) {
        // Second leg of the handshake: SYN_ACK out, then the peer's ACK must
        // be the next thing it sends, within the handshake timeout.
        if let Err(e) = self.send(&Message::SynAck).await {
            warn!(peer = %self.peer, error = %e, "failed to send SYN_ACK");
            return;
        }

        loop {
            match timeout(self.config.handshake_timeout, inbox.recv()).await {
                Ok(Some(Message::Ack)) => {
                    info!(peer = %self.peer, "connection established");
                    break;
                }
                Ok(Some(Message::Syn)) => {
                    // Retransmitted SYN: the peer has not seen our SYN_ACK yet.
                    trace!(peer = %self.peer, "duplicate SYN, resending SYN_ACK");
                    if let Err(e) = self.send(&Message::SynAck).await {
                        warn!(peer = %self.peer, error = %e, "failed to resend SYN_ACK");
                        return;
                    }
                }
                Ok(Some(other)) => {
                    debug!(
                        peer = %self.peer,
                        kind = other.kind_str(),
                        "expected ACK, connection rejected"
                    );
                    return;
                }
                Ok(None) | Err(_) => {
                    debug!(peer = %self.peer, "no ACK within handshake timeout");
                    return;
                }
            }
        }

        while let Some(message) = inbox.recv().await {
            match message {
                Message::DataRequest {
                    seq,
                    version,
                    payload,
                } => self.answer_data_request(seq, version, &payload).await,
                Message::Fin => {
                    if let Err(e) = self.send(&Message::FinAck).await {
                        warn!(peer = %self.peer, error = %e, "failed to send FIN_ACK");
                    }
                    info!(peer = %self.peer, "connection closed");
                    return;
                }
                other => {
                    trace!(
                        peer = %self.peer,
                        kind = other.kind_str(),
                        "ignoring unexpected message"
                    );
                }
            }
        }
    }

    /// Reply to one data request, unless the loss simulator drops it.
    async fn answer_data_request(&self, seq: u16, version: u8, payload: &[u8]) {
        info!(
            peer = %self.peer,
            seq,
            version,
            payload = %String::from_utf8_lossy(payload),
            "data request received"
        );

        if self.loss.should_drop() {
            info!(peer = %self.peer, seq, "simulated loss, response withheld");
            return;
        }

        let timestamp = wall_clock_hms();
        let response = Message::DataResponse {
            seq,
            version,
            timestamp,
        };
        match self.send(&response).await {
            Ok(()) => {
                info!(
                    peer = %self.peer,
                    seq,
                    server_time = %timestamp_str(&timestamp),
                    "response sent"
                );
            }
            Err(e) => warn!(peer = %self.peer, seq, error = %e, "failed to send response"),
        }
    }

    async fn send(&self, message: &Message) -> std::io::Result<()> {
        self.transport
            .send_to(&message.encode(), self.peer)
            .await
            .map(|_| ())
    }
}

/// Current UTC wall clock as the fixed 8-byte `HH-MM-SS` response field.
fn wall_clock_hms() -> [u8; TIMESTAMP_LEN] {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let (h, m, s) = ((secs / 3600) % 24, (secs / 60) % 60, secs % 60);

    let text = format!("{h:02}-{m:02}-{s:02}");
    let mut field = [b' '; TIMESTAMP_LEN];
    field.copy_from_slice(text.as_bytes());
    field
}
