//! Memoized TLS client configuration derived from the trust store.

use rustls::ClientConfig;
use std::sync::Arc;

use crate::error::{Result, TrustError};
use crate::trust::TrustManager;

/// Trust manager plus the client configuration built around it.
#[derive(Debug, Clone)]
pub struct SecureContext {
    generation: u64,
    trust_manager: Arc<TrustManager>,
    client_config: Arc<ClientConfig>,
}

impl SecureContext {
    pub fn new(generation: u64, trust_manager: Arc<TrustManager>) -> Result<Self> {
        let provider = crate::trust::crypto_provider();
        let mut config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| TrustError::Security(format!("protocol versions: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(trust_manager.clone())
            .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Ok(Self {
            generation,
            trust_manager,
            client_config: Arc::new(config),
        })
    }

    /// Store generation this context reflects.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn trust_manager(&self) -> &Arc<TrustManager> {
        &self.trust_manager
    }

    pub fn client_config(&self) -> &Arc<ClientConfig> {
        &self.client_config
    }
}

/// Cached context keyed by a generation counter that every store mutation bumps.
#[derive(Debug, Default)]
pub struct ContextCache {
    generation: u64,
    cached: Option<SecureContext>,
}

impl ContextCache {
    /// Mark any cached context stale.
    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// The cached context if it is still current.
    pub fn current(&self) -> Option<&SecureContext> {
        self.cached
            .as_ref()
            .filter(|ctx| ctx.generation == self.generation)
    }

    /// Return the current context or build and cache a new one.
    pub fn get_or_build<F>(&mut self, build: F) -> Result<SecureContext>
    where
        F: FnOnce() -> Result<TrustManager>,
    {
        if let Some(ctx) = self.current() {
            return Ok(ctx.clone());
        }
        tracing::debug!(generation = self.generation, "building secure context");
        let ctx = SecureContext::new(self.generation, Arc::new(build()?))?;
        self.cached = Some(ctx.clone());
        Ok(ctx)
    }
}
