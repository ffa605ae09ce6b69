//! Bounded, lazily-filled pool of [`VmHandle`]s.
//!
//! `Get` blocks on a counting semaphore of capacity `max`, then hands
//! out an idle VM or spawns a new one (lazy fill; at most `max` worker
//! threads ever exist). `Put` — modeled as [`VmLease`]'s `Drop` — resets
//! the VM and releases the permit, so every exit path (normal return,
//! early `?`, panic unwind) returns exactly one permit.

use super::config::VmConfig;
use super::handle::VmHandle;
use crate::error::AppError;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};

type Factory = Arc<dyn Fn() -> Result<VmHandle, AppError> + Send + Sync>;

/// A pool of at most `max` concurrently checked-out VMs.
pub struct VmPool {
    semaphore: Arc<Semaphore>,
    idle: AsyncMutex<Vec<VmHandle>>,
    factory: Factory,
    max: usize,
}

impl VmPool {
    /// A pool that lazily spawns real `deno_core`-backed workers.
    pub fn new(max: usize) -> Arc<Self> {
        Self::with_factory(max, Arc::new(VmHandle::spawn_deno))
    }

    /// A pool with an injectable VM factory, for tests that want every
    /// checked-out VM to be a `FakeVmCore`.
    pub fn with_factory(max: usize, factory: Factory) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max.max(1))),
            idle: AsyncMutex::new(Vec::with_capacity(max)),
            factory,
            max: max.max(1),
        })
    }

    /// Capacity of the pool (the `N` in property P8).
    pub fn capacity(&self) -> usize {
        self.max
    }

    /// Checks out a VM, blocking until a permit is available. The
    /// returned lease resets and returns the VM to the pool when
    /// dropped — callers never call `Put` directly.
    pub async fn get(self: &Arc<Self>) -> Result<VmLease, AppError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| AppError::VmConfigure("vm pool semaphore closed".into()))?;

        let cached = self.idle.lock().await.pop();
        let handle = match cached {
            Some(handle) => handle,
            None => (self.factory)()?,
        };

        Ok(VmLease {
            pool: Arc::clone(self),
            handle: Some(handle),
            permit: Some(permit),
        })
    }
}

/// RAII checkout. Configure/Execute through [`VmLease::handle`]; drop
/// (normal, early-return, or panic unwind) always runs `Reset` and
/// releases the permit exactly once.
pub struct VmLease {
    pool: Arc<VmPool>,
    handle: Option<VmHandle>,
    permit: Option<OwnedSemaphorePermit>,
}

impl VmLease {
    /// The checked-out VM. Configure it, then execute against it.
    pub fn handle(&self) -> &VmHandle {
        self.handle.as_ref().expect("lease handle taken before drop")
    }

    /// Rebinds per-request data onto the leased VM.
    pub async fn configure(&self, config: VmConfig) -> Result<(), AppError> {
        self.handle().configure(config).await
    }
}

impl Drop for VmLease {
    fn drop(&mut self) {
        if let (Some(handle), Some(permit)) = (self.handle.take(), self.permit.take()) {
            let pool = Arc::clone(&self.pool);
            tokio::spawn(async move {
                let _ = handle.reset().await;
                pool.idle.lock().await.push(handle);
                drop(permit);
            });
        }
    }
}
