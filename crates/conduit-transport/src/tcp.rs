use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::{ConduitStream, TlsPolicy};

/// Connect to `host:port` and apply the TLS policy.
///
/// Every resolved address is tried in order; the error of the last failed
/// attempt is reported when none accepts the connection.
pub async fn connect(host: &str, port: u16, policy: TlsPolicy) -> Result<ConduitStream> {
    let addrs: Vec<_> = lookup_host((host, port))
        .await
        .map_err(|source| TransportError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .collect();

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(tcp) => {
                tcp.set_nodelay(true)?;
                let stream = wrap(tcp, host, policy).await?;
                info!(host, port, %addr, tls = stream.is_tls(), "transport connected");
                return Ok(stream);
            }
            Err(err) => {
                debug!(%addr, error = %err, "connect attempt failed");
                last_err = Some(TransportError::Connect {
                    addr: addr.to_string(),
                    source: err,
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| TransportError::Resolve {
        host: host.to_string(),
        port,
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses for host"),
    }))
}

#[cfg(feature = "tls")]
async fn wrap(tcp: TcpStream, host: &str, policy: TlsPolicy) -> Result<ConduitStream> {
    if !policy.uses_tls() {
        return Ok(ConduitStream::from_tcp(tcp));
    }
    crate::tls::handshake(tcp, host, policy).await
}

#[cfg(not(feature = "tls"))]
async fn wrap(tcp: TcpStream, _host: &str, policy: TlsPolicy) -> Result<ConduitStream> {
    if policy.uses_tls() {
        return Err(TransportError::TlsUnavailable);
    }
    Ok(ConduitStream::from_tcp(tcp))
}
