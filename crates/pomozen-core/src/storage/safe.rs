//! Write-safe storage front.
//!
//! `SafeStorage` wraps a durable backend and guarantees that no storage
//! failure ever reaches a caller as an error:
//!
//! - construction probes the backend with a throwaway write/delete and falls
//!   back to an in-memory map when the probe fails (private browsing, broken
//!   filesystem, missing home dir), raising [`StorageWarning::Degraded`] once
//! - quota-exceeded writes are dropped and raise
//!   [`StorageWarning::QuotaExceeded`] on every occurrence
//! - any other write failure is dropped and raises
//!   [`StorageWarning::WriteFailed`] exactly once per session
//!
//! Reads degrade to `None`/defaults. Every store in the crate goes through
//! this front; nothing touches a backend directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::error::StorageError;
use crate::storage::backend::{MemoryBackend, StorageBackend};

const PROBE_KEY: &str = "__pomozen_storage_probe__";

/// Degradation signals surfaced to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageWarning {
    /// Durable storage was unavailable; data lives in memory and will not
    /// survive this process.
    Degraded,
    /// A write was dropped because the store is full.
    QuotaExceeded,
    /// A write was dropped for some other backend reason.
    WriteFailed,
}

type WarningHandler = Box<dyn FnMut(StorageWarning) + Send>;

pub struct SafeStorage {
    backend: Mutex<Box<dyn StorageBackend>>,
    degraded: bool,
    degraded_signaled: AtomicBool,
    write_failure_signaled: AtomicBool,
    handler: Mutex<Option<WarningHandler>>,
}

impl SafeStorage {
    /// Wrap `backend`, probing it first. A failed probe substitutes an
    /// in-memory map implementing the same contract.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        let mut backend = backend;
        let degraded = match probe(backend.as_mut()) {
            Ok(()) => false,
            Err(e) => {
                warn!(error = %e, "durable storage unavailable, falling back to memory");
                backend = Box::new(MemoryBackend::new());
                true
            }
        };
        Self {
            backend: Mutex::new(backend),
            degraded,
            degraded_signaled: AtomicBool::new(false),
            write_failure_signaled: AtomicBool::new(false),
            handler: Mutex::new(None),
        }
    }

    /// Purely in-memory storage (tests, or callers that never want disk).
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// In-memory storage flagged as a degradation (durable store never
    /// opened). Used when even constructing a backend fails.
    pub(crate) fn degraded() -> Self {
        Self {
            backend: Mutex::new(Box::new(MemoryBackend::new())),
            degraded: true,
            degraded_signaled: AtomicBool::new(false),
            write_failure_signaled: AtomicBool::new(false),
            handler: Mutex::new(None),
        }
    }

    /// Register the warning handler. If the store already degraded to memory
    /// during construction, the handler is told immediately (the signal is
    /// delivered once per session regardless of when registration happens).
    pub fn set_warning_handler(&self, handler: impl FnMut(StorageWarning) + Send + 'static) {
        {
            let mut slot = self.lock_handler();
            *slot = Some(Box::new(handler));
        }
        if self.degraded && !self.degraded_signaled.swap(true, Ordering::SeqCst) {
            self.signal(StorageWarning::Degraded);
        }
    }

    /// True when operating on the in-memory substitute.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.lock_backend().get_item(key).unwrap_or_default()
    }

    /// Write through to the backend. Never fails; see the module docs for
    /// what happens to writes that cannot land.
    pub fn set_item(&self, key: &str, value: &str) {
        let result = self.lock_backend().set_item(key, value);
        match result {
            Ok(()) => {}
            Err(StorageError::QuotaExceeded) => {
                warn!(key, "storage quota exceeded, dropping write");
                self.signal(StorageWarning::QuotaExceeded);
            }
            Err(e) => {
                if !self.write_failure_signaled.swap(true, Ordering::SeqCst) {
                    warn!(key, error = %e, "storage write failed, dropping write");
                    self.signal(StorageWarning::WriteFailed);
                }
            }
        }
    }

    pub fn remove_item(&self, key: &str) {
        let _ = self.lock_backend().remove_item(key);
    }

    pub fn clear(&self) {
        let _ = self.lock_backend().clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock_backend().keys().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock_backend().len().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn signal(&self, warning: StorageWarning) {
        let mut slot = self.lock_handler();
        if let Some(handler) = slot.as_mut() {
            handler(warning);
        }
    }

    fn lock_backend(&self) -> MutexGuard<'_, Box<dyn StorageBackend>> {
        self.backend.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_handler(&self) -> MutexGuard<'_, Option<WarningHandler>> {
        self.handler.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn probe(backend: &mut dyn StorageBackend) -> Result<(), StorageError> {
    backend.set_item(PROBE_KEY, "1")?;
    backend.remove_item(PROBE_KEY)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    /// Backend whose writes always fail with the given error kind.
    struct FailingBackend {
        quota: bool,
    }

    impl StorageBackend for FailingBackend {
        fn get_item(&mut self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }
        fn set_item(&mut self, key: &str, _value: &str) -> Result<(), StorageError> {
            if key == PROBE_KEY {
                // Survive the probe so we exercise the per-write path.
                return Ok(());
            }
            if self.quota {
                Err(StorageError::QuotaExceeded)
            } else {
                Err(StorageError::Backend("disk detached".into()))
            }
        }
        fn remove_item(&mut self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
        fn clear(&mut self) -> Result<(), StorageError> {
            Ok(())
        }
        fn keys(&mut self) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }
        fn len(&mut self) -> Result<usize, StorageError> {
            Ok(0)
        }
    }

    #[test]
    fn probe_failure_falls_back_to_memory_and_signals_once() {
        struct DeadBackend;
        impl StorageBackend for DeadBackend {
            fn get_item(&mut self, _: &str) -> Result<Option<String>, StorageError> {
                Err(StorageError::Unavailable("nope".into()))
            }
            fn set_item(&mut self, _: &str, _: &str) -> Result<(), StorageError> {
                Err(StorageError::Unavailable("nope".into()))
            }
            fn remove_item(&mut self, _: &str) -> Result<(), StorageError> {
                Err(StorageError::Unavailable("nope".into()))
            }
            fn clear(&mut self) -> Result<(), StorageError> {
                Err(StorageError::Unavailable("nope".into()))
            }
            fn keys(&mut self) -> Result<Vec<String>, StorageError> {
                Err(StorageError::Unavailable("nope".into()))
            }
            fn len(&mut self) -> Result<usize, StorageError> {
                Err(StorageError::Unavailable("nope".into()))
            }
        }

        let storage = SafeStorage::new(Box::new(DeadBackend));
        assert!(storage.is_degraded());

        let degraded_signals = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&degraded_signals);
        storage.set_warning_handler(move |w| {
            if w == StorageWarning::Degraded {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(degraded_signals.load(Ordering::SeqCst), 1);

        // The in-memory substitute still honors the full contract.
        storage.set_item("k", "v");
        assert_eq!(storage.get_item("k").as_deref(), Some("v"));
        assert_eq!(storage.len(), 1);
        assert_eq!(degraded_signals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_quota_write_failure_signals_exactly_once() {
        let storage = SafeStorage::new(Box::new(FailingBackend { quota: false }));
        assert!(!storage.is_degraded());

        let signals = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&signals);
        storage.set_warning_handler(move |w| {
            assert_eq!(w, StorageWarning::WriteFailed);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..5 {
            storage.set_item("k", "v");
        }
        assert_eq!(signals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn quota_failure_signals_every_dropped_write() {
        let storage = SafeStorage::new(Box::new(FailingBackend { quota: true }));

        let signals = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&signals);
        storage.set_warning_handler(move |w| {
            assert_eq!(w, StorageWarning::QuotaExceeded);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        storage.set_item("k", "v");
        storage.set_item("k", "v");
        storage.set_item("k", "v");
        assert_eq!(signals.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn healthy_backend_reads_back_writes() {
        let storage = SafeStorage::in_memory();
        assert!(!storage.is_degraded());
        storage.set_item("a", "1");
        storage.set_item("b", "2");
        assert_eq!(storage.keys(), vec!["a", "b"]);
        storage.remove_item("a");
        assert!(storage.get_item("a").is_none());
        storage.clear();
        assert!(storage.is_empty());
    }
}
