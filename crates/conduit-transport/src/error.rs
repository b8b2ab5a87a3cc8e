/// Errors that can occur while establishing or using a transport stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Host name resolution failed or produced no addresses.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The host cannot be used as a TLS server name.
    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    /// The TLS handshake or client configuration failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A TLS policy was requested but the crate was built without `tls`.
    #[error("TLS support not compiled in (enable the `tls` feature)")]
    TlsUnavailable,

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
