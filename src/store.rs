//! Durable store of operator-accepted certificates.
//!
//! The file on disk is the only source of truth: every query or mutation
//! starts from a fresh [`TrustStore::load`].

use p12_keystore::{KeyStore, KeyStoreEntry};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::cert::Certificate;
use crate::error::{Result, TrustError};

/// Passphrase of the PKCS#12 container. Not a secret: the store is protected
/// by filesystem permissions, the container MAC only catches corruption.
pub const STORE_PASSPHRASE: &str = "certgate-store";

/// PBKDF2 and MAC key-derivation rounds for written containers.
const KDF_ITERATIONS: u64 = 2048;

/// One accepted certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCertificateEntry {
    pub alias: String,
    pub certificate: Certificate,
}

/// In-memory view of the store, ordered by alias.
#[derive(Debug, Clone, Default)]
pub struct TrustSnapshot {
    entries: BTreeMap<String, TrustedCertificateEntry>,
}

impl TrustSnapshot {
    /// Insert under the certificate's alias, replacing any entry with the same subject.
    pub fn insert(&mut self, certificate: Certificate) -> String {
        let alias = certificate.alias();
        self.entries.insert(
            alias.clone(),
            TrustedCertificateEntry {
                alias: alias.clone(),
                certificate,
            },
        );
        alias
    }

    pub fn get(&self, alias: &str) -> Option<&TrustedCertificateEntry> {
        self.entries.get(alias)
    }

    /// Exact DER identity match against any entry.
    pub fn contains_certificate(&self, der: &[u8]) -> bool {
        self.entries
            .values()
            .any(|e| e.certificate.der().as_ref() == der)
    }

    pub fn entries(&self) -> impl Iterator<Item = &TrustedCertificateEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse and verify container bytes.
pub fn decode(path: &Path, bytes: &[u8]) -> Result<TrustSnapshot> {
    let keystore = KeyStore::from_pkcs12(bytes, STORE_PASSPHRASE)
        .map_err(|e| TrustError::corrupt(path, format!("read PKCS#12: {e}")))?;

    let mut snapshot = TrustSnapshot::default();
    for (alias, entry) in keystore.entries() {
        let KeyStoreEntry::Certificate(cert) = entry else {
            tracing::debug!(%alias, "skipping private key entry");
            continue;
        };
        let certificate = Certificate::from_der(cert.as_der().to_vec())
            .map_err(|err| TrustError::corrupt(path, format!("entry {alias}: {err}")))?;
        snapshot.entries.insert(
            alias.clone(),
            TrustedCertificateEntry {
                alias: alias.clone(),
                certificate,
            },
        );
    }
    Ok(snapshot)
}

/// Serialize a snapshot into a PKCS#12 container of trusted certificate entries.
pub fn encode(snapshot: &TrustSnapshot) -> Result<Vec<u8>> {
    let mut keystore = KeyStore::new();
    for e in snapshot.entries() {
        let cert = p12_keystore::Certificate::from_der(e.certificate.der())
            .map_err(|err| TrustError::Security(format!("entry {}: {err}", e.alias)))?;
        keystore.add_entry(&e.alias, KeyStoreEntry::Certificate(cert));
    }
    keystore
        .writer(STORE_PASSPHRASE)
        .encryption_iterations(KDF_ITERATIONS)
        .mac_iterations(KDF_ITERATIONS)
        .write()
        .map_err(|e| TrustError::Security(format!("write PKCS#12: {e}")))
}

/// Handle to the store file. Holds no in-memory entries.
#[derive(Debug, Clone)]
pub struct TrustStore {
    path: PathBuf,
}

impl TrustStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and verify the store file.
    pub fn load(&self) -> Result<TrustSnapshot> {
        let bytes = fs::read(&self.path).map_err(|e| TrustError::unavailable(&self.path, e))?;
        decode(&self.path, &bytes)
    }

    /// Replace the store file with `snapshot`.
    pub fn save(&self, snapshot: &TrustSnapshot) -> Result<()> {
        let bytes = encode(snapshot)?;
        self.write_atomic(&bytes)
    }

    /// Add `certificate`, persist, and confirm the round trip. Returns its alias.
    pub fn add_entry(&self, certificate: Certificate) -> Result<String> {
        let mut snapshot = self.load()?;
        let alias = snapshot.insert(certificate);
        let expected = snapshot.len();
        self.save(&snapshot)?;

        let reloaded = self.load()?;
        if reloaded.len() != expected || reloaded.get(&alias).is_none() {
            return Err(TrustError::corrupt(
                &self.path,
                format!(
                    "round trip mismatch: wrote {expected} entries, read back {}",
                    reloaded.len()
                ),
            ));
        }
        Ok(alias)
    }

    /// Write bytes verbatim through a temp file in the same directory and rename into place.
    pub fn write_atomic(&self, bytes: &[u8]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| TrustError::unavailable(dir, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".trust_store")
            .tempfile_in(dir)
            .map_err(|e| TrustError::unavailable(dir, e))?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        restrict_permissions(tmp.path())?;
        tmp.persist(&self.path)
            .map_err(|e| TrustError::unavailable(&self.path, e.error))?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
