//! The link capability interface.
//!
//! Link drivers implement one small async trait instead of the session
//! layer matching on a protocol enum. Adding a new transport (a new
//! serial port flavor, a test loopback, a future QUIC link) means
//! writing one more impl, not touching the session state machine.

use async_trait::async_trait;

use crate::error::TransportError;

/// A bidirectional, message-boundary-preserving-or-not transport.
#[async_trait]
pub trait Link: Send + Sync {
    /// Write one already-framed message buffer to the link.
    async fn write(&self, buf: &[u8]) -> Result<(), TransportError>;

    /// Read the next framed message buffer from the link. For a
    /// streamed link this means consuming the length prefix and the
    /// body it describes; for a datagram link, one `recv`.
    async fn read(&self) -> Result<Vec<u8>, TransportError>;

    /// Maximum transmission unit this link can carry in one frame.
    fn mtu(&self) -> u16;

    /// Whether reads/writes need the streamed (length-prefixed) codec
    /// rather than the datagram codec.
    fn is_streamed(&self) -> bool;

    /// Whether the underlying medium already guarantees delivery and
    /// ordering (TCP) or not (UDP, serial) — informs whether the
    /// reliable channel's SN bookkeeping can trust the link or must
    /// detect gaps itself.
    fn is_reliable(&self) -> bool;

    async fn close(&self) -> Result<(), TransportError>;
}

pub mod tcp {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::Mutex;

    use super::Link;
    use crate::error::TransportError;
    use zenoh_protocol::codec::{peek_streamed_len, MAX_STREAMED_LEN};

    /// A TCP link: streamed, reliable, framed with the 2-byte length
    /// prefix codec.
    pub struct TcpLink {
        stream: Mutex<TcpStream>,
        mtu: u16,
    }

    impl TcpLink {
        pub fn new(stream: TcpStream, mtu: u16) -> Self {
            Self {
                stream: Mutex::new(stream),
                mtu,
            }
        }

        pub fn into_arc(self) -> Arc<Self> {
            Arc::new(self)
        }
    }

    #[async_trait::async_trait]
    impl Link for TcpLink {
        async fn write(&self, buf: &[u8]) -> Result<(), TransportError> {
            let mut stream = self.stream.lock().await;
            stream.write_all(buf).await?;
            Ok(())
        }

        async fn read(&self) -> Result<Vec<u8>, TransportError> {
            let mut stream = self.stream.lock().await;
            let mut prefix = [0u8; 2];
            stream.read_exact(&mut prefix).await?;
            let len = peek_streamed_len(&prefix)?;
            if len > MAX_STREAMED_LEN {
                return Err(TransportError::HandshakeFailed("streamed frame too large"));
            }
            let mut body = vec![0u8; len];
            stream.read_exact(&mut body).await?;
            Ok(body)
        }

        fn mtu(&self) -> u16 {
            self.mtu
        }

        fn is_streamed(&self) -> bool {
            true
        }

        fn is_reliable(&self) -> bool {
            true
        }

        async fn close(&self) -> Result<(), TransportError> {
            let mut stream = self.stream.lock().await;
            stream.shutdown().await?;
            Ok(())
        }
    }
}

pub mod udp {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use tokio::net::UdpSocket;

    use super::Link;
    use crate::error::TransportError;

    /// A UDP link bound to a single peer address: best-effort, datagram,
    /// one message per `recv_from`.
    pub struct UdpLink {
        socket: UdpSocket,
        peer: SocketAddr,
        mtu: u16,
    }

    impl UdpLink {
        pub fn new(socket: UdpSocket, peer: SocketAddr, mtu: u16) -> Self {
            Self { socket, peer, mtu }
        }

        pub fn into_arc(self) -> Arc<Self> {
            Arc::new(self)
        }
    }

    #[async_trait::async_trait]
    impl Link for UdpLink {
        async fn write(&self, buf: &[u8]) -> Result<(), TransportError> {
            self.socket.send_to(buf, self.peer).await?;
            Ok(())
        }

        async fn read(&self) -> Result<Vec<u8>, TransportError> {
            let mut buf = vec![0u8; self.mtu as usize];
            let (n, _from) = self.socket.recv_from(&mut buf).await?;
            buf.truncate(n);
            Ok(buf)
        }

        fn mtu(&self) -> u16 {
            self.mtu
        }

        fn is_streamed(&self) -> bool {
            false
        }

        fn is_reliable(&self) -> bool {
            false
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }
}
