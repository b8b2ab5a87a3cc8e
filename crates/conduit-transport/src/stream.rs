use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// How the transport secures the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    /// Plain TCP, no encryption.
    #[default]
    Plain,
    /// TLS, peer certificate verified against the platform trust store.
    SystemRoots,
    /// TLS, any peer certificate accepted.
    ///
    /// Only meant for private testbed peers with self-signed certificates.
    AcceptAnyCertificate,
}

impl TlsPolicy {
    /// Whether this policy wraps the stream in TLS.
    pub fn uses_tls(self) -> bool {
        !matches!(self, TlsPolicy::Plain)
    }
}

/// A connected stream; implements `AsyncRead + AsyncWrite`.
///
/// This is the I/O type returned by [`connect`](crate::connect).
pub struct ConduitStream {
    inner: ConduitStreamInner,
}

enum ConduitStreamInner {
    Tcp(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl ConduitStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: ConduitStreamInner::Tcp(stream),
        }
    }

    #[cfg(feature = "tls")]
    pub(crate) fn from_tls(stream: tokio_rustls::client::TlsStream<TcpStream>) -> Self {
        Self {
            inner: ConduitStreamInner::Tls(Box::new(stream)),
        }
    }

    /// Whether the stream is encrypted.
    pub fn is_tls(&self) -> bool {
        match &self.inner {
            ConduitStreamInner::Tcp(_) => false,
            #[cfg(feature = "tls")]
            ConduitStreamInner::Tls(_) => true,
        }
    }

    /// Remote address of the underlying TCP connection.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.tcp().peer_addr()
    }

    /// Local address of the underlying TCP connection.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.tcp().local_addr()
    }

    fn tcp(&self) -> &TcpStream {
        match &self.inner {
            ConduitStreamInner::Tcp(stream) => stream,
            #[cfg(feature = "tls")]
            ConduitStreamInner::Tls(stream) => stream.get_ref().0,
        }
    }
}

impl AsyncRead for ConduitStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            ConduitStreamInner::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(feature = "tls")]
            ConduitStreamInner::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ConduitStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            ConduitStreamInner::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(feature = "tls")]
            ConduitStreamInner::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            ConduitStreamInner::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(feature = "tls")]
            ConduitStreamInner::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            ConduitStreamInner::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(feature = "tls")]
            ConduitStreamInner::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for ConduitStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_tls() { "tls" } else { "tcp" };
        f.debug_struct("ConduitStream")
            .field("type", &kind)
            .field("peer", &self.peer_addr().ok())
            .finish()
    }
}
