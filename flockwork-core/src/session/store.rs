//! SessionStore (C1): one coarse-grained mutex guarding session state,
//! with a best-effort versioned persistence hook.

use std::sync::{Arc, Mutex};

use crate::Result;

/// Injected at construction; called after every mutation. Failures are
/// logged by the store and never propagate — persistence is best-effort
/// (§5).
pub trait PersistenceHook<T>: Send + Sync {
    fn save(&self, version: u64, session: &T) -> Result<()>;
}

/// A no-op hook for tests and callers that don't need durability.
pub struct NullPersistence;

impl<T> PersistenceHook<T> for NullPersistence {
    fn save(&self, _version: u64, _session: &T) -> Result<()> {
        Ok(())
    }
}

/// Holds one session behind a single mutex. Every multi-field read or
/// write takes the lock for its whole duration; the store never hands
/// out a reference to its internals, only owned copies via `get`/`with`.
pub struct SessionStore<T> {
    inner: Mutex<T>,
    version: Mutex<u64>,
    persistence: Arc<dyn PersistenceHook<T>>,
}

impl<T: Clone> SessionStore<T> {
    pub fn new(session: T, persistence: Arc<dyn PersistenceHook<T>>) -> Self {
        Self {
            inner: Mutex::new(session),
            version: Mutex::new(0),
            persistence,
        }
    }

    /// Read the whole session under the lock, returning a defensive copy.
    pub fn get(&self) -> T {
        self.inner.lock().expect("session mutex poisoned").clone()
    }

    /// Run `f` with exclusive access to the session, then persist.
    /// Persistence failures are logged and swallowed, per §5.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let (result, snapshot) = {
            let mut guard = self.inner.lock().expect("session mutex poisoned");
            let result = f(&mut guard);
            (result, guard.clone())
        };
        self.persist(&snapshot);
        result
    }

    /// Read-only access under the lock, for reads spanning multiple
    /// fields that must observe a consistent snapshot.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.lock().expect("session mutex poisoned");
        f(&guard)
    }

    fn persist(&self, snapshot: &T) {
        let mut version = self.version.lock().expect("version mutex poisoned");
        *version += 1;
        if let Err(e) = self.persistence.save(*version, snapshot) {
            tracing::warn!(error = %e, "session persistence failed; continuing");
        }
    }

    pub fn version(&self) -> u64 {
        *self.version.lock().expect("version mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, PartialEq)]
    struct Counter(i32);

    struct CountingPersistence {
        calls: AtomicUsize,
    }

    impl PersistenceHook<Counter> for CountingPersistence {
        fn save(&self, _version: u64, _session: &Counter) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_with_mut_persists_after_mutation() {
        let persistence = Arc::new(CountingPersistence { calls: AtomicUsize::new(0) });
        let store = SessionStore::new(Counter(0), persistence.clone());
        store.with_mut(|c| c.0 += 1);
        store.with_mut(|c| c.0 += 1);
        assert_eq!(store.get(), Counter(2));
        assert_eq!(persistence.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_persistence_failure_does_not_panic() {
        struct FailingPersistence;
        impl PersistenceHook<Counter> for FailingPersistence {
            fn save(&self, _version: u64, _session: &Counter) -> Result<()> {
                Err(crate::Error::Other("disk full".to_string()))
            }
        }
        let store = SessionStore::new(Counter(0), Arc::new(FailingPersistence));
        store.with_mut(|c| c.0 += 1);
        assert_eq!(store.get(), Counter(1));
    }

    #[test]
    fn test_null_persistence() {
        let store = SessionStore::new(Counter(5), Arc::new(NullPersistence));
        assert_eq!(store.get(), Counter(5));
    }
}
