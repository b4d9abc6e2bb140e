//! The trust subsystem: an owned instance handed to callers at startup.
//!
//! Lock order: the init gate is never held while the store lock is taken by
//! the same call, and listeners run after the store lock is released.

use rustls::crypto::CryptoProvider;
use rustls::RootCertStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cert::Certificate;
use crate::config::{Settings, TrustPaths};
use crate::connection::{Connection, Target};
use crate::context::{ContextCache, SecureContext};
use crate::error::{Result, TrustError};
use crate::init::{AbortOnDrop, InitGate, InitializationState, Interrupt, Role, SeedSource};
use crate::notify::{CertChangeListener, ChangeNotifier};
use crate::store::{self, TrustStore, TrustedCertificateEntry};
use crate::trust::{self, TrustManager};

/// Store handle and the context derived from it, guarded together.
struct StoreState {
    store: TrustStore,
    cache: ContextCache,
}

pub struct TrustSubsystem {
    paths: TrustPaths,
    settings: Settings,
    platform: Arc<RootCertStore>,
    gate: InitGate,
    state: Mutex<StoreState>,
    notifier: ChangeNotifier,
}

impl TrustSubsystem {
    pub fn new(paths: TrustPaths, settings: Settings) -> Self {
        let platform = if settings.platform_anchors {
            trust::platform_roots()
        } else {
            RootCertStore::empty()
        };
        let store = TrustStore::new(&paths.store_file);
        Self {
            paths,
            settings,
            platform: Arc::new(platform),
            gate: InitGate::new(),
            state: Mutex::new(StoreState {
                store,
                cache: ContextCache::default(),
            }),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Replace the platform anchors, e.g. with a private test root.
    pub fn with_platform_roots(mut self, roots: RootCertStore) -> Self {
        self.platform = Arc::new(roots);
        self
    }

    pub fn paths(&self) -> &TrustPaths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> InitializationState {
        self.gate.state()
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed the store on first run and open the gate. Safe to call from many
    /// threads: one caller seeds, the others wait for it and return.
    pub fn initialize(&self, seed: &dyn SeedSource) -> Result<()> {
        if self.gate.begin() == Role::AlreadyReady {
            return Ok(());
        }
        let guard = AbortOnDrop::new(&self.gate);
        self.bootstrap(seed)?;
        guard.complete();
        tracing::info!(path = %self.paths.store_file.display(), "trust store ready");
        Ok(())
    }

    fn bootstrap(&self, seed: &dyn SeedSource) -> Result<()> {
        let state = self.lock_state();
        if !state.store.exists() {
            let path = state.store.path().to_path_buf();
            self.paths
                .ensure_dirs()
                .map_err(|e| TrustError::unavailable(&self.paths.data_dir, e))?;
            let bytes = seed
                .bundle()
                .map_err(|e| TrustError::unavailable(&path, e))?;
            store::decode(&path, &bytes)?;
            state.store.write_atomic(&bytes)?;
            tracing::info!(path = %path.display(), "seeded trust store from bundle");
        }

        if CryptoProvider::get_default().is_none() {
            // Lost races are fine: some provider is installed either way.
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        }

        let snapshot = state.store.load()?;
        tracing::debug!(entries = snapshot.len(), "loaded trust store");
        Ok(())
    }

    /// Handle that cancels the interruptible waits it is passed to.
    pub fn interrupt_handle(&self) -> Interrupt {
        self.gate.interrupt_handle()
    }

    fn wait_ready(&self, interrupt: Option<&Interrupt>) -> Result<()> {
        match interrupt {
            Some(interrupt) => self.gate.wait_ready_interruptible(interrupt),
            None => self.gate.wait_ready(),
        }
    }

    /// Persist an operator-approved certificate (PEM or DER). Returns its alias.
    pub fn add_certificate(&self, raw: &[u8]) -> Result<String> {
        if !self.gate.is_ready() {
            return Err(TrustError::NotInitialized);
        }
        let certificate = Certificate::from_bytes(raw)?;
        let subject = certificate.subject().to_string();

        let result = {
            let mut state = self.lock_state();
            let result = state.store.add_entry(certificate);
            // The file may have been rewritten even when the round trip failed.
            state.cache.invalidate();
            result
        };
        let alias = result?;

        tracing::info!(%alias, %subject, "accepted certificate");
        self.notifier.notify(&alias);
        Ok(alias)
    }

    /// Whether this exact certificate was accepted. Blocks until initialized;
    /// malformed bytes are not trusted.
    pub fn is_trusted(&self, raw: &[u8]) -> Result<bool> {
        self.check_trusted(raw, None)
    }

    /// [`Self::is_trusted`], answering not-trusted once `interrupt` fires
    /// before initialization completes.
    pub fn is_trusted_interruptible(&self, raw: &[u8], interrupt: &Interrupt) -> Result<bool> {
        self.check_trusted(raw, Some(interrupt))
    }

    fn check_trusted(&self, raw: &[u8], interrupt: Option<&Interrupt>) -> Result<bool> {
        if let Err(e) = self.wait_ready(interrupt) {
            tracing::debug!("not trusted: {e}");
            return Ok(false);
        }
        let certificate = match Certificate::from_bytes(raw) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("not trusted: {e}");
                return Ok(false);
            }
        };
        let state = self.lock_state();
        let snapshot = state.store.load()?;
        Ok(snapshot.contains_certificate(certificate.der()))
    }

    /// Fresh chain validator over platform anchors and the current store.
    pub fn build_trust_manager(&self) -> Result<TrustManager> {
        self.trust_manager(None)
    }

    pub fn build_trust_manager_interruptible(&self, interrupt: &Interrupt) -> Result<TrustManager> {
        self.trust_manager(Some(interrupt))
    }

    fn trust_manager(&self, interrupt: Option<&Interrupt>) -> Result<TrustManager> {
        self.wait_ready(interrupt)?;
        let state = self.lock_state();
        self.trust_manager_from(&state.store)
    }

    fn trust_manager_from(&self, store: &TrustStore) -> Result<TrustManager> {
        let snapshot = store.load()?;
        Ok(TrustManager::new(
            Arc::clone(&self.platform),
            &snapshot,
            trust::crypto_provider(),
        ))
    }

    /// Current secure context, rebuilt once after each store mutation.
    pub fn get_context(&self) -> Result<SecureContext> {
        self.context(None)
    }

    pub fn get_context_interruptible(&self, interrupt: &Interrupt) -> Result<SecureContext> {
        self.context(Some(interrupt))
    }

    fn context(&self, interrupt: Option<&Interrupt>) -> Result<SecureContext> {
        self.wait_ready(interrupt)?;
        let mut state = self.lock_state();
        let StoreState { store, cache } = &mut *state;
        cache.get_or_build(|| self.trust_manager_from(&*store))
    }

    /// Connection handle for `url`. https before initialization fails fast.
    pub fn open_connection(&self, url: &str) -> Result<Connection> {
        let target = Target::parse(url)?;
        let context = if target.is_secure() {
            if !self.gate.is_ready() {
                return Err(TrustError::NotInitialized);
            }
            Some(self.get_context()?)
        } else {
            None
        };
        Connection::new(target, context, self.settings.connect_timeout())
    }

    /// Accepted certificates ordered by alias.
    pub fn entries(&self) -> Result<Vec<TrustedCertificateEntry>> {
        self.wait_ready(None)?;
        let state = self.lock_state();
        let snapshot = state.store.load()?;
        Ok(snapshot.entries().cloned().collect())
    }

    /// Returns false if the listener was already registered.
    pub fn add_change_listener(&self, listener: Arc<dyn CertChangeListener>) -> bool {
        self.notifier.add(listener)
    }

    /// Returns false if the listener was not registered.
    pub fn remove_change_listener(&self, listener: &Arc<dyn CertChangeListener>) -> bool {
        self.notifier.remove(listener)
    }
}
