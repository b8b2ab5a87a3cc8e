//! TLS client setup on top of an established TCP connection.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::stream::{ConduitStream, TlsPolicy};

/// Run the TLS client handshake over `tcp` using `policy`.
pub(crate) async fn handshake(
    tcp: TcpStream,
    host: &str,
    policy: TlsPolicy,
) -> Result<ConduitStream> {
    let config = match client_config(policy)? {
        Some(config) => config,
        None => return Ok(ConduitStream::from_tcp(tcp)),
    };

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| TransportError::InvalidServerName(host.to_string()))?;

    let connector = TlsConnector::from(Arc::new(config));
    let stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(|err| TransportError::Tls(err.to_string()))?;

    debug!(host, ?policy, "TLS handshake complete");
    Ok(ConduitStream::from_tls(stream))
}

/// Build the rustls client configuration for a policy.
///
/// Returns `None` for [`TlsPolicy::Plain`].
pub fn client_config(policy: TlsPolicy) -> Result<Option<ClientConfig>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|err| TransportError::Tls(err.to_string()))?;

    let config = match policy {
        TlsPolicy::Plain => return Ok(None),
        TlsPolicy::AcceptAnyCertificate => {
            warn!("TLS peer certificate verification disabled - testbed use only");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
                .with_no_client_auth()
        }
        TlsPolicy::SystemRoots => {
            let mut roots = RootCertStore::empty();
            let loaded = rustls_native_certs::load_native_certs();
            for err in &loaded.errors {
                debug!("certificate loading error: {}", err);
            }
            let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
            debug!(added, ignored, "loaded platform trust roots");
            if roots.is_empty() {
                return Err(TransportError::Tls(
                    "no usable certificates in the platform trust store".to_string(),
                ));
            }
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };

    Ok(Some(config))
}

/// Certificate verifier that accepts whatever the peer presents.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
