//! TLS client configuration for secure (FTPES) transfers.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use super::error::TlsSetupError;
use crate::config::TrustPolicy;

/// Build the client configuration for `policy`.
///
/// `Strict` trusts the platform certificate store. `AcceptAll` accepts any
/// certificate chain for any host name and offers no protection against an
/// active attacker.
pub fn build_tls_config(policy: TrustPolicy) -> Result<Arc<ClientConfig>, TlsSetupError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?;

    let config = match policy {
        TrustPolicy::Strict => builder
            .with_root_certificates(platform_roots()?)
            .with_no_client_auth(),
        TrustPolicy::AcceptAll => {
            log::warn!("TLS certificate validation disabled for this transfer");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAllVerifier { provider }))
                .with_no_client_auth()
        }
    };

    Ok(Arc::new(config))
}

fn platform_roots() -> Result<RootCertStore, TlsSetupError> {
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        log::warn!("Problem loading platform certificates: {}", err);
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    log::debug!(
        "Loaded {} platform root certificates ({} ignored)",
        added,
        ignored
    );

    if roots.is_empty() {
        let detail = loaded
            .errors
            .first()
            .map(|e| format!(": {}", e))
            .unwrap_or_default();
        return Err(TlsSetupError::NoRootCertificates(detail));
    }
    Ok(roots)
}

/// Accepts every server certificate. Handshake signatures are still checked
/// so the session keys belong to whoever presented the certificate.
#[derive(Debug)]
struct AcceptAllVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAllVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
