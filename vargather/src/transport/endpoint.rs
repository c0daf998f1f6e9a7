//! QUIC endpoints for the hub group.
//!
//! The hub mints a throwaway self-signed certificate each time it binds.
//! Spokes have nothing to pin it against, so they accept whichever
//! certificate the hub presents, but still check the handshake signatures
//! made with its key.

use crate::error::{GatherError, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

const ALPN: &[u8] = b"vargather/1";

/// Name the hub certificate is issued for and spokes dial.
pub(crate) const HUB_SERVER_NAME: &str = "vargather-hub";

/// A rank may sit in a rendezvous for a long time waiting on a slow peer.
const KEEP_ALIVE: Duration = Duration::from_secs(5);

fn tls_error(e: impl std::fmt::Display) -> GatherError {
    GatherError::Tls(e.to_string())
}

fn transport_config() -> Arc<quinn::TransportConfig> {
    let mut transport = quinn::TransportConfig::default();
    transport.keep_alive_interval(Some(KEEP_ALIVE));
    Arc::new(transport)
}

/// Bind the hub's server endpoint on `addr`.
pub(crate) fn hub_endpoint(addr: SocketAddr) -> Result<quinn::Endpoint> {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec![HUB_SERVER_NAME.to_string()]).map_err(tls_error)?;
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let mut tls = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .map_err(tls_error)?;
    tls.alpn_protocols = vec![ALPN.to_vec()];

    let crypto =
        quinn::crypto::rustls::QuicServerConfig::try_from(Arc::new(tls)).map_err(tls_error)?;
    let mut config = quinn::ServerConfig::with_crypto(Arc::new(crypto));
    config.transport_config(transport_config());

    quinn::Endpoint::server(config, addr)
        .map_err(|e| GatherError::transport_with_source(format!("bind {addr}"), e))
}

/// A client endpoint on an ephemeral port, in the same address family as
/// `hub`.
pub(crate) fn spoke_endpoint(hub: SocketAddr) -> Result<quinn::Endpoint> {
    let bind: SocketAddr = if hub.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let verifier = AcceptSelfSigned {
        algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
    };
    let mut tls = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    tls.alpn_protocols = vec![ALPN.to_vec()];

    let crypto =
        quinn::crypto::rustls::QuicClientConfig::try_from(Arc::new(tls)).map_err(tls_error)?;
    let mut config = quinn::ClientConfig::new(Arc::new(crypto));
    config.transport_config(transport_config());

    let mut endpoint = quinn::Endpoint::client(bind)
        .map_err(|e| GatherError::transport_with_source("bind client", e))?;
    endpoint.set_default_client_config(config);
    Ok(endpoint)
}

/// Trusts any certificate chain, but requires the handshake to be signed by
/// the key of the certificate that was presented.
#[derive(Debug)]
struct AcceptSelfSigned {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptSelfSigned {
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
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
