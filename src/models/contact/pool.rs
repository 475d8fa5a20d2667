//! Per-thread model clones for concurrent objective evaluation.
//!
//! The optimizer may call the objective from any number of worker threads.
//! Each thread gets its own deep clone of the canonical model the first time it
//! asks for one; later requests from the same thread return that clone.
//!
//! Registry contract:
//! - the registry only grows, one entry per thread id, for the life of the pool;
//! - lookups of an existing entry never take the insert lock;
//! - the insert lock is held only while the canonical model is cloned and the
//!   entry inserted, never while the clone runs `init_system()`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use log::debug;
use parking_lot::{Mutex, MutexGuard};

use crate::models::multibody::{ModelError, Multibody};

/// A model clone owned by one worker thread.
#[derive(Debug)]
pub struct WorkerModel<M> {
    owner: ThreadId,
    model: Mutex<M>,
    init: OnceLock<Result<(), ModelError>>,
}

impl<M: Multibody> WorkerModel<M> {
    fn new(owner: ThreadId, model: M) -> Self {
        Self {
            owner,
            model: Mutex::new(model),
            init: OnceLock::new(),
        }
    }

    /// Run the one-time initialization, or return its cached outcome.
    fn ensure_initialized(&self) -> Result<(), ModelError> {
        self.init
            .get_or_init(|| self.model.lock().init_system())
            .clone()
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Exclusive access to the clone. Only the owning thread ever locks it, so
    /// the lock is uncontended.
    pub fn lock(&self) -> MutexGuard<'_, M> {
        debug_assert_eq!(thread::current().id(), self.owner);
        self.model.lock()
    }
}

/// Thread-keyed, growth-only cache of initialized model clones.
#[derive(Debug)]
pub struct ModelPool<M> {
    canonical: M,
    workers: DashMap<ThreadId, Arc<WorkerModel<M>>>,
    insert_lock: Mutex<()>,
    insertions: AtomicUsize,
    detached: AtomicUsize,
}

impl<M: Multibody> ModelPool<M> {
    /// Wrap a canonical model. The canonical model is never mutated again.
    pub fn new(canonical: M) -> Self {
        Self {
            canonical,
            workers: DashMap::new(),
            insert_lock: Mutex::new(()),
            insertions: AtomicUsize::new(0),
            detached: AtomicUsize::new(0),
        }
    }

    pub fn canonical(&self) -> &M {
        &self.canonical
    }

    /// The calling thread's clone, created and initialized on first use.
    pub fn acquire(&self) -> Result<Arc<WorkerModel<M>>, ModelError> {
        let id = thread::current().id();
        if let Some(slot) = self.workers.get(&id) {
            let slot = Arc::clone(slot.value());
            slot.ensure_initialized()?;
            return Ok(slot);
        }

        let slot = {
            let _guard = self.insert_lock.lock();
            match self.workers.get(&id) {
                Some(existing) => Arc::clone(existing.value()),
                None => {
                    let slot = Arc::new(WorkerModel::new(id, self.canonical.clone()));
                    self.workers.insert(id, Arc::clone(&slot));
                    self.insertions.fetch_add(1, Ordering::Relaxed);
                    slot
                }
            }
        };

        debug!("initializing model clone for thread {:?}", id);
        slot.ensure_initialized()?;
        Ok(slot)
    }

    /// A fresh initialized clone that is not registered in the pool. Used when
    /// the caller owns its worker contexts explicitly.
    pub fn detached(&self) -> Result<M, ModelError> {
        self.detached.fetch_add(1, Ordering::Relaxed);
        let mut model = self.canonical.clone();
        model.init_system()?;
        Ok(model)
    }

    /// Number of registered clones.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Number of times the insert path created a clone. Equal to `len()` as
    /// long as every thread inserts at most once.
    pub fn insertions(&self) -> usize {
        self.insertions.load(Ordering::Relaxed)
    }

    /// Number of unregistered clones handed out by [`ModelPool::detached`].
    pub fn detached_builds(&self) -> usize {
        self.detached.load(Ordering::Relaxed)
    }

    /// Thread ids that own a clone.
    pub fn owners(&self) -> Vec<ThreadId> {
        self.workers.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::multibody::PlanarFootModel;
    use std::sync::Barrier;

    fn pool() -> ModelPool<PlanarFootModel> {
        let mut model = PlanarFootModel::foot_with_contacts(3, 70.0, 5e7).unwrap();
        model.init_system().unwrap();
        ModelPool::new(model)
    }

    #[test]
    fn same_thread_gets_same_clone() {
        let pool = pool();
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.insertions(), 1);
    }

    #[test]
    fn one_clone_per_thread() {
        let pool = Arc::new(pool());
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..20 {
                        pool.acquire().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.len(), threads);
        assert_eq!(pool.insertions(), threads);
    }

    #[test]
    fn clones_are_independent() {
        let pool = Arc::new(pool());
        let marker = pool.canonical().marker_index("marker0").unwrap();

        let mine = pool.acquire().unwrap();
        mine.lock().set_marker_height(marker, 0.5);

        let other = Arc::clone(&pool);
        let seen = thread::spawn(move || {
            let slot = other.acquire().unwrap();
            let height = slot.lock().marker_height(marker);
            height
        })
        .join()
        .unwrap();

        assert_eq!(seen, -0.027);
        assert_eq!(pool.canonical().marker_height(marker), -0.027);
        assert_eq!(mine.lock().marker_height(marker), 0.5);
    }

    #[test]
    fn clones_are_initialized() {
        let pool = pool();
        let slot = pool.acquire().unwrap();
        assert!(slot.lock().is_initialized());
        assert_eq!(slot.lock().contacts().len(), 3);
    }

    #[test]
    fn init_failure_is_reported_every_time() {
        let mut broken = PlanarFootModel::new("broken");
        broken.add_body("calcn_r", 1.0, [0.0; 3]).unwrap();
        broken.add_contact("c", "missing", 1.0).unwrap();
        let pool = ModelPool::new(broken);
        assert!(pool.acquire().is_err());
        assert!(pool.acquire().is_err());
        assert_eq!(pool.insertions(), 1);
    }

    #[test]
    fn detached_clone_is_not_registered() {
        let pool = pool();
        let model = pool.detached().unwrap();
        assert!(model.is_initialized());
        assert!(pool.is_empty());
        assert_eq!(pool.detached_builds(), 1);
    }
}
