//! Abstract datagram transport
//!
//! The [`Transport`] trait lets the client session and the server dispatcher
//! run over any async datagram source. The built-in [`UdpTransport`] is
//! backed by `tokio::net::UdpSocket`; tests substitute scripted transports to
//! drive the state machines without a network.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

/// Boxed future returned by [`Transport::send_to`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = io::Result<usize>> + Send + 'a>>;

/// Boxed future returned by [`Transport::recv_from`].
pub type RecvFuture<'a> =
    Pin<Box<dyn Future<Output = io::Result<(usize, SocketAddr)>> + Send + 'a>>;

/// Async datagram transport addressed by `SocketAddr`.
///
/// Object-safe so it can be shared as `Arc<dyn Transport>` between the
/// dispatcher and its handlers.
pub trait Transport: Send + Sync + 'static {
    /// Send `buf` to `target`, returning the number of bytes written.
    fn send_to<'a>(&'a self, buf: &'a [u8], target: SocketAddr) -> SendFuture<'a>;

    /// Receive a datagram into `buf`, returning `(bytes_read, source_address)`.
    fn recv_from<'a>(&'a self, buf: &'a mut [u8]) -> RecvFuture<'a>;

    /// Return the local address this transport is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

// ---------------------------------------------------------------------------
// UdpTransport — default implementation backed by tokio::net::UdpSocket
// ---------------------------------------------------------------------------

mod udp {
    use super::*;
    use tokio::net::UdpSocket;

    /// Default [`Transport`] implementation wrapping a `tokio::net::UdpSocket`.
    pub struct UdpTransport {
        socket: UdpSocket,
    }

    impl UdpTransport {
        /// Bind a new UDP socket to `addr`.
        pub async fn bind(addr: impl tokio::net::ToSocketAddrs) -> io::Result<Self> {
            let socket = UdpSocket::bind(addr).await?;
            Ok(Self { socket })
        }

        /// Bind to an ephemeral local port, for client use.
        pub async fn bind_ephemeral() -> io::Result<Self> {
            Self::bind("0.0.0.0:0").await
        }

        /// Wrap an existing `UdpSocket`.
        pub fn new(socket: UdpSocket) -> Self {
            Self { socket }
        }
    }

    impl Transport for UdpTransport {
        fn send_to<'a>(&'a self, buf: &'a [u8], target: SocketAddr) -> SendFuture<'a> {
            Box::pin(self.socket.send_to(buf, target))
        }

        fn recv_from<'a>(&'a self, buf: &'a mut [u8]) -> RecvFuture<'a> {
            Box::pin(self.socket.recv_from(buf))
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            self.socket.local_addr()
        }
    }
}

pub use udp::UdpTransport;
