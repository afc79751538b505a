//! UDP transport for FINS communication.
//!
//! One datagram socket per client, bound to an ephemeral local port and
//! connected to a single controller endpoint. The transport only moves
//! bytes; framing, correlation, and the response timeout live a layer up.
//! A send confirms local buffering, not controller receipt.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::error::Result;

/// Default FINS UDP port.
pub const DEFAULT_FINS_PORT: u16 = 9600;

/// Default response timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum FINS datagram size.
pub const MAX_PACKET_SIZE: usize = 2048;

/// Connected UDP socket to one controller.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Binds an ephemeral local socket and connects it to the controller.
    ///
    /// Connecting filters inbound datagrams to the controller's address;
    /// there is no handshake and no reachability check.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket cannot be bound or connected.
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(peer).await?;
        tracing::debug!(local = %socket.local_addr()?, remote = %peer, "UDP socket connected");
        Ok(Self { socket, peer })
    }

    /// Sends one frame to the controller.
    pub async fn send(&self, frame: &[u8]) -> Result<()> {
        tracing::trace!(remote = %self.peer, bytes = frame.len(), "sending datagram");
        self.socket.send(frame).await?;
        Ok(())
    }

    /// Receives one datagram from the controller.
    ///
    /// Waits indefinitely; the caller multiplexes this against its own
    /// timeout and command sources.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let n = self.socket.recv(buf).await?;
        tracing::trace!(remote = %self.peer, bytes = n, "received datagram");
        Ok(n)
    }

    /// The controller's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}
