//! Chain trust decisions: platform anchors composed with the local store.

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{verify_server_cert_signed_by_trust_anchor, verify_server_name};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{CertificateError, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::fmt;
use std::sync::Arc;

use crate::cert::Certificate;
use crate::error::TrustError;
use crate::store::TrustSnapshot;

/// Public web PKI roots bundled via webpki-roots.
pub fn platform_roots() -> RootCertStore {
    RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    }
}

/// Process default provider, or aws-lc-rs when none is installed yet.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Which source accepted a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainAcceptance {
    /// Chains to one of the platform anchors.
    PlatformAnchor,
    /// Chains to an operator-accepted certificate used as an anchor.
    LocalAnchor,
    /// Is itself an operator-accepted certificate.
    AcceptedLeaf,
}

/// Accepts a chain if the platform anchors or the local store accept it.
///
/// Local entries are additive: they act as extra trust anchors and as exact
/// leaf exceptions, never as a way to reject something the platform trusts.
pub struct TrustManager {
    platform: Arc<RootCertStore>,
    local: RootCertStore,
    accepted: Vec<Certificate>,
    provider: Arc<CryptoProvider>,
}

impl fmt::Debug for TrustManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustManager")
            .field("platform_anchors", &self.platform.len())
            .field("local_anchors", &self.local.len())
            .field("accepted", &self.accepted.len())
            .finish()
    }
}

impl TrustManager {
    pub fn new(
        platform: Arc<RootCertStore>,
        snapshot: &TrustSnapshot,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        let accepted: Vec<Certificate> = snapshot.entries().map(|e| e.certificate.clone()).collect();
        let mut local = RootCertStore::empty();
        let (added, ignored) =
            local.add_parsable_certificates(accepted.iter().map(|c| c.der().clone()));
        if ignored > 0 {
            tracing::debug!(added, ignored, "some accepted certificates are not usable as anchors");
        }
        Self {
            platform,
            local,
            accepted,
            provider,
        }
    }

    /// Number of operator-accepted certificates this manager was built from.
    pub fn accepted_len(&self) -> usize {
        self.accepted.len()
    }

    /// Whether this exact certificate is one of the accepted entries.
    pub fn accepts_leaf(&self, der: &[u8]) -> bool {
        self.accepted.iter().any(|c| c.der().as_ref() == der)
    }

    /// Decide whether the chain is trusted, independent of host name.
    pub fn check_chain(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<ChainAcceptance, TrustError> {
        let parsed = ParsedCertificate::try_from(end_entity)
            .map_err(|e| TrustError::CertificateParse(e.to_string()))?;
        let algs = self.provider.signature_verification_algorithms.all;

        let sources = [
            (self.platform.as_ref(), ChainAcceptance::PlatformAnchor),
            (&self.local, ChainAcceptance::LocalAnchor),
        ];
        for (roots, acceptance) in sources {
            if roots.is_empty() {
                continue;
            }
            if verify_server_cert_signed_by_trust_anchor(&parsed, roots, intermediates, now, algs)
                .is_ok()
            {
                return Ok(acceptance);
            }
        }

        if self.accepts_leaf(end_entity.as_ref()) {
            return Ok(ChainAcceptance::AcceptedLeaf);
        }

        Err(TrustError::ChainNotTrusted)
    }
}

fn host_of(server_name: &ServerName<'_>) -> Option<String> {
    match server_name {
        ServerName::DnsName(name) => Some(name.as_ref().to_string()),
        ServerName::IpAddress(ip) => Some(std::net::IpAddr::from(*ip).to_string()),
        _ => None,
    }
}

impl ServerCertVerifier for TrustManager {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let acceptance = self
            .check_chain(end_entity, intermediates, now)
            .map_err(|e| match e {
                TrustError::ChainNotTrusted => {
                    tracing::warn!(?server_name, "rejected untrusted certificate chain");
                    rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer)
                }
                TrustError::CertificateParse(_) => {
                    rustls::Error::InvalidCertificate(CertificateError::BadEncoding)
                }
                other => rustls::Error::General(other.to_string()),
            })?;

        // Web PKI chains get the standard name check, wildcards included.
        // Anything the operator vouched for must name the host exactly.
        let name_ok = match acceptance {
            ChainAcceptance::PlatformAnchor => ParsedCertificate::try_from(end_entity)
                .map(|parsed| verify_server_name(&parsed, server_name).is_ok())
                .unwrap_or(false),
            ChainAcceptance::LocalAnchor | ChainAcceptance::AcceptedLeaf => {
                match (host_of(server_name), Certificate::from_der(end_entity.to_vec())) {
                    (Some(host), Ok(cert)) => cert.matches_host(&host),
                    _ => false,
                }
            }
        };
        if !name_ok {
            return Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName,
            ));
        }

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
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
        rustls::crypto::verify_tls13_signature(
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
