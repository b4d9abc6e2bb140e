//! Fan-out of "certificate added" events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Notified after a certificate has been durably added to the store.
pub trait CertChangeListener: Send + Sync {
    fn certificate_added(&self, alias: &str);
}

impl<F> CertChangeListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn certificate_added(&self, alias: &str) {
        self(alias)
    }
}

/// Set of distinct listeners, compared by pointer identity.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Mutex<Vec<Arc<dyn CertChangeListener>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn CertChangeListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener`; returns false if it was already registered.
    pub fn add(&self, listener: Arc<dyn CertChangeListener>) -> bool {
        let mut listeners = self.lock();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregister `listener`; returns false if it was not registered.
    pub fn remove(&self, listener: &Arc<dyn CertChangeListener>) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Call every listener. Runs on a snapshot so listeners may (un)register re-entrantly.
    pub fn notify(&self, alias: &str) {
        let snapshot: Vec<_> = self.lock().clone();
        for listener in snapshot {
            listener.certificate_added(alias);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn duplicates_are_ignored() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let l: Arc<dyn CertChangeListener> = Arc::new(move |_: &str| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(notifier.add(Arc::clone(&l)));
        assert!(!notifier.add(Arc::clone(&l)));
        notifier.notify("00000000");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let l: Arc<dyn CertChangeListener> = Arc::new(move |_: &str| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        notifier.add(Arc::clone(&l));
        assert!(notifier.remove(&l));
        assert!(!notifier.remove(&l));
        notifier.notify("00000000");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(notifier.is_empty());
    }
}
