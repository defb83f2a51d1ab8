//! # udpsim — connection semantics over a connectionless transport
//!
//! Simulates TCP-style connection handling on top of UDP: a three-way
//! handshake, sequenced data exchanges with round-trip timing, and a
//! four-way teardown, with server-side probabilistic packet loss for testing
//! client resilience.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use udpsim::{ClientSession, ServerDispatcher, SimConfig};
//! use std::net::SocketAddr;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let addr: SocketAddr = "127.0.0.1:9999".parse()?;
//!
//!     let server = ServerDispatcher::bind(addr, SimConfig::default()).await?;
//!     tokio::spawn(async move { server.run().await });
//!
//!     let mut session = ClientSession::bind(addr, SimConfig::default()).await?;
//!     let report = session.run().await?;
//!     println!("received {} of {}", report.received, report.attempted);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │   ClientSession      │  handshake / data / teardown state machine
//! ├──────────────────────┤
//! │   ServerDispatcher   │  shared socket, address-keyed demultiplexing
//! │   ConnectionHandler  │  one task per client, loss injection point
//! ├──────────────────────┤
//! │   Message codec      │  fixed big-endian layouts per kind
//! ├──────────────────────┤
//! │   Transport          │  UDP socket, swappable for tests
//! └──────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod loss;
pub mod message;
pub mod rtt;
pub mod server;
pub mod transport;

pub use client::{ClientSession, ExchangeOutcome, SessionReport, SessionState};
pub use config::SimConfig;
pub use error::{Result, SimError};
pub use loss::LossSimulator;
pub use message::Message;
pub use rtt::{RttSummary, RttTracker};
pub use server::ServerDispatcher;
pub use transport::{Transport, UdpTransport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
