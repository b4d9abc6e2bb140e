//! Shared test helpers.
#![allow(dead_code)]

use certgate::config::{Settings, TrustPaths};
use certgate::init::BundledSeed;
use certgate::TrustSubsystem;
use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair};
use tempfile::TempDir;

/// Create a temp directory for use as CERTGATE_HOME.
pub fn temp_home() -> TempDir {
    tempfile::Builder::new()
        .prefix("certgate_test_")
        .tempdir()
        .expect("temp dir")
}

/// Self-signed certificate plus its PKCS#8 key.
pub struct TestCert {
    pub der: Vec<u8>,
    pub pem: String,
    pub key_der: Vec<u8>,
}

/// Self-signed leaf with CN `cn` and a SAN for each of `sans`.
pub fn self_signed(cn: &str, sans: &[&str]) -> TestCert {
    let key = KeyPair::generate().expect("key pair");
    let mut params =
        CertificateParams::new(sans.iter().map(|s| s.to_string()).collect::<Vec<_>>())
            .expect("params");
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, DnValue::Utf8String(cn.to_string()));
    let cert = params.self_signed(&key).expect("self-signed cert");
    TestCert {
        der: cert.der().to_vec(),
        pem: cert.pem(),
        key_der: key.serialize_der(),
    }
}

/// Settings for tests: no public roots, generous connect timeout.
pub fn test_settings() -> Settings {
    Settings {
        connect_timeout_ms: 5_000,
        platform_anchors: false,
    }
}

/// Subsystem over `dir`, not yet initialized.
pub fn subsystem(dir: &std::path::Path) -> TrustSubsystem {
    TrustSubsystem::new(TrustPaths::for_test(dir), test_settings())
}

/// Subsystem over `dir`, initialized from the bundled seed.
pub fn ready_subsystem(dir: &std::path::Path) -> TrustSubsystem {
    let s = subsystem(dir);
    s.initialize(&BundledSeed).expect("initialize");
    s
}
