//! One-shot initialization gate and bootstrap seed sources.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, TrustError};

/// Empty container compiled into the binary.
pub const BUNDLED_TRUST_STORE: &[u8] = include_bytes!("../assets/default_trust_store.p12");

/// Source of the default store copied into place on first run.
pub trait SeedSource: Send + Sync {
    fn bundle(&self) -> io::Result<Vec<u8>>;
}

/// The compiled-in default store.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledSeed;

impl SeedSource for BundledSeed {
    fn bundle(&self) -> io::Result<Vec<u8>> {
        Ok(BUNDLED_TRUST_STORE.to_vec())
    }
}

/// A container file on disk, e.g. provisioned alongside the binary.
#[derive(Debug, Clone)]
pub struct FileSeed(pub PathBuf);

impl SeedSource for FileSeed {
    fn bundle(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Outcome of [`InitGate::begin`].
#[derive(Debug, PartialEq, Eq)]
pub enum Role {
    /// The caller must run the bootstrap and then call `complete` or `abort`.
    Initializer,
    /// Another caller already brought the gate to Ready.
    AlreadyReady,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<InitializationState>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, InitializationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cancels the waits of whoever holds it, and only theirs.
///
/// Interruption is sticky: once [`Interrupt::interrupt`] has run, every
/// wait made with this handle fails until the gate is Ready, including
/// waits that start afterwards.
#[derive(Debug, Clone)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    gate: Arc<Shared>,
}

impl Interrupt {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Taking the lock orders the store before any waiter's next check.
        let _state = self.gate.lock();
        self.gate.changed.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Uninitialized → Initializing → Ready, once.
#[derive(Debug)]
pub struct InitGate {
    shared: Arc<Shared>,
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InitGate {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(InitializationState::Uninitialized),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn state(&self) -> InitializationState {
        *self.shared.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == InitializationState::Ready
    }

    /// New handle for cancelling waits on this gate.
    pub fn interrupt_handle(&self) -> Interrupt {
        Interrupt {
            flag: Arc::new(AtomicBool::new(false)),
            gate: Arc::clone(&self.shared),
        }
    }

    /// Claim the initializer role, or wait until the current initializer
    /// finishes. An aborted attempt hands the role to the next caller.
    pub fn begin(&self) -> Role {
        let mut state = self.shared.lock();
        loop {
            match *state {
                InitializationState::Ready => return Role::AlreadyReady,
                InitializationState::Uninitialized => {
                    *state = InitializationState::Initializing;
                    return Role::Initializer;
                }
                InitializationState::Initializing => {
                    state = self
                        .shared
                        .changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Initializing → Ready; wakes every waiter.
    pub fn complete(&self) {
        *self.shared.lock() = InitializationState::Ready;
        self.shared.changed.notify_all();
    }

    /// Initializing → Uninitialized after a failed bootstrap.
    pub fn abort(&self) {
        let mut state = self.shared.lock();
        if *state == InitializationState::Initializing {
            *state = InitializationState::Uninitialized;
        }
        self.shared.changed.notify_all();
    }

    /// Block until Ready.
    pub fn wait_ready(&self) -> Result<()> {
        self.wait(None)
    }

    /// Block until Ready, failing with `Interrupted` once `interrupt` fires.
    pub fn wait_ready_interruptible(&self, interrupt: &Interrupt) -> Result<()> {
        self.wait(Some(interrupt))
    }

    fn wait(&self, interrupt: Option<&Interrupt>) -> Result<()> {
        let mut state = self.shared.lock();
        loop {
            if *state == InitializationState::Ready {
                return Ok(());
            }
            if interrupt.is_some_and(Interrupt::is_interrupted) {
                return Err(TrustError::Interrupted);
            }
            state = self
                .shared
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Aborts the gate unless disarmed, so a failed or panicking bootstrap does
/// not leave it stuck in Initializing.
pub(crate) struct AbortOnDrop<'a> {
    gate: &'a InitGate,
    armed: bool,
}

impl<'a> AbortOnDrop<'a> {
    pub(crate) fn new(gate: &'a InitGate) -> Self {
        Self { gate, armed: true }
    }

    pub(crate) fn complete(mut self) {
        self.armed = false;
        self.gate.complete();
    }
}

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.abort();
        }
    }
}
