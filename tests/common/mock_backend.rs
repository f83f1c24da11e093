//! In-memory backend for exercising the engine.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use named_lock_core::backend::LockBackend;
use named_lock_core::error::{LockError, LockResult};
use parking_lot::Mutex;

/// Lock names mapped to the id of the backend holding them.
pub type SharedStore = Arc<Mutex<HashMap<String, usize>>>;

/// An atomic insert-if-absent store shared by several backends, with call
/// counters for asserting how often the engine reached the backend.
pub struct MockBackend {
    id: usize,
    store: SharedStore,
    unreachable: bool,
    pub grants: AtomicUsize,
    pub releases: AtomicUsize,
    pub queries: AtomicUsize,
}

impl MockBackend {
    pub fn new(id: usize, store: SharedStore) -> Self {
        Self {
            id,
            store,
            unreachable: false,
            grants: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    /// A backend whose every call fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::new(0, SharedStore::default())
        }
    }

    pub fn grant_count(&self) -> usize {
        self.grants.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check(&self) -> LockResult<()> {
        if self.unreachable {
            return Err(LockError::connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock store unreachable",
            )));
        }
        Ok(())
    }
}

impl LockBackend for MockBackend {
    const NAME: &'static str = "mock";

    async fn attempt_grant(&self, name: &str) -> LockResult<bool> {
        self.grants.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut store = self.store.lock();
        let holder = *store.entry(name.to_string()).or_insert(self.id);
        Ok(holder == self.id)
    }

    async fn release(&self, name: &str) -> LockResult<bool> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut store = self.store.lock();
        match store.get(name) {
            Some(holder) if *holder != self.id => Ok(false),
            _ => {
                store.remove(name);
                Ok(true)
            }
        }
    }

    async fn query(&self, name: &str) -> LockResult<bool> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.store.lock().contains_key(name))
    }
}

/// Engines over one shared store, each acting as a separate holder.
pub fn engines(count: usize) -> Vec<named_lock_core::engine::LockEngine<MockBackend>> {
    let store = SharedStore::default();
    (1..=count)
        .map(|id| named_lock_core::engine::LockEngine::new(MockBackend::new(id, store.clone())))
        .collect()
}
