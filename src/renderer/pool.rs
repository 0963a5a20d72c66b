use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::renderer::errors::RenderError;
use crate::renderer::handle::{RenderBackend, RenderHandle};

/// What `acquire` does when every handle is checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Fail with `PoolExhausted` immediately, never queueing the caller.
    Reject,
    /// Wait for a handle up to the given limit, then fail with
    /// `PoolExhausted`.
    Wait(Duration),
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub capacity: usize,
    pub acquire: AcquireMode,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            acquire: AcquireMode::Reject,
        }
    }
}

/// Trust state of a checked-out handle, recorded by the borrower before
/// release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleHealth {
    Healthy,
    /// Last navigation failed or timed out; the handle must be reset before
    /// anyone else borrows it.
    Suspected,
    /// The underlying renderer is gone; discard and replace.
    Broken,
}

enum IdleSlot<H> {
    Ready(H),
    /// A broken handle was discarded here; the next acquire recreates it so
    /// total capacity never shrinks.
    Vacant,
}

struct PoolInner<B: RenderBackend> {
    backend: Arc<B>,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<IdleSlot<B::Handle>>>,
    capacity: usize,
}

/// Fixed-capacity pool of pre-created rendering handles with exclusive
/// checkout. The semaphore is the single point of serialization: a permit is
/// held for exactly as long as a handle is checked out, so available +
/// checked-out always equals the configured capacity.
pub struct HandlePool<B: RenderBackend> {
    inner: Arc<PoolInner<B>>,
    mode: AcquireMode,
}

impl<B: RenderBackend> HandlePool<B> {
    /// Eagerly create `capacity` handles on the backend and stand the pool
    /// up. Fails if any handle cannot be created at startup.
    pub async fn initialize(backend: Arc<B>, config: PoolConfig) -> Result<Self, RenderError> {
        let mut handles = Vec::with_capacity(config.capacity);
        for _ in 0..config.capacity {
            handles.push(IdleSlot::Ready(backend.new_handle().await?));
        }
        debug!(capacity = config.capacity, "handle pool filled");

        Ok(Self {
            inner: Arc::new(PoolInner {
                backend,
                semaphore: Arc::new(Semaphore::new(config.capacity)),
                idle: Mutex::new(handles),
                capacity: config.capacity,
            }),
            mode: config.acquire,
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Handles currently in the idle set (ready or pending recreation).
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Check a handle out for exclusive use. Returns `PoolExhausted` per the
    /// configured mode when capacity is fully claimed.
    pub async fn acquire(&self) -> Result<PooledHandle<B>, RenderError> {
        let permit = match self.mode {
            AcquireMode::Reject => self
                .inner
                .semaphore
                .clone()
                .try_acquire_owned()
                .map_err(|_| RenderError::PoolExhausted)?,
            AcquireMode::Wait(limit) => {
                tokio::time::timeout(limit, self.inner.semaphore.clone().acquire_owned())
                    .await
                    .map_err(|_| RenderError::PoolExhausted)?
                    .map_err(|_| RenderError::Browser("pool is shut down".into()))?
            }
        };

        let slot = self
            .inner
            .idle
            .lock()
            .expect("idle set mutex poisoned")
            .pop()
            .expect("semaphore permit issued without an idle slot");

        let handle = match slot {
            IdleSlot::Ready(handle) => handle,
            IdleSlot::Vacant => match self.inner.backend.new_handle().await {
                Ok(handle) => {
                    debug!(id = %handle.id(), "broken handle replaced");
                    handle
                }
                Err(e) => {
                    // Keep the vacancy so capacity is still recoverable.
                    self.inner
                        .idle
                        .lock()
                        .expect("idle set mutex poisoned")
                        .push(IdleSlot::Vacant);
                    drop(permit);
                    return Err(e);
                }
            },
        };

        Ok(PooledHandle {
            handle: Some(handle),
            health: HandleHealth::Healthy,
            inner: Arc::clone(&self.inner),
            permit: Some(permit),
            runtime: tokio::runtime::Handle::current(),
        })
    }

    /// Close every idle handle. Checked-out handles are closed by their
    /// guards as they come back.
    pub async fn shutdown(&self) {
        let slots = {
            let mut idle = self.inner.idle.lock().expect("idle set mutex poisoned");
            std::mem::take(&mut *idle)
        };
        for slot in slots {
            if let IdleSlot::Ready(handle) = slot
                && let Err(e) = handle.close().await
            {
                debug!("handle close during shutdown failed: {}", e);
            }
        }
        self.inner.semaphore.close();
    }
}

/// Scoped checkout of one handle. Dereferences to the handle itself.
///
/// Prefer the explicit async [`release`](Self::release); dropping the guard
/// still returns the handle, via a task spawned on the runtime captured at
/// acquire time, so no exit path can leak capacity.
pub struct PooledHandle<B: RenderBackend> {
    handle: Option<B::Handle>,
    health: HandleHealth,
    inner: Arc<PoolInner<B>>,
    permit: Option<OwnedSemaphorePermit>,
    runtime: tokio::runtime::Handle,
}

impl<B: RenderBackend> PooledHandle<B> {
    pub fn health(&self) -> HandleHealth {
        self.health
    }

    pub fn mark_suspected(&mut self) {
        if self.health == HandleHealth::Healthy {
            self.health = HandleHealth::Suspected;
        }
    }

    pub fn mark_broken(&mut self) {
        self.health = HandleHealth::Broken;
    }

    /// Record the outcome of a failed navigation on this handle.
    pub fn record_failure(&mut self, err: &RenderError) {
        if err.breaks_handle() {
            self.mark_broken();
        } else {
            self.mark_suspected();
        }
    }

    /// Return the handle to the pool, resetting or discarding it first
    /// according to its recorded health.
    pub async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            let permit = self.permit.take();
            return_to_pool(&self.inner, handle, self.health, permit).await;
        }
    }
}

impl<B: RenderBackend> Deref for PooledHandle<B> {
    type Target = B::Handle;

    fn deref(&self) -> &Self::Target {
        self.handle.as_ref().expect("handle already released")
    }
}

impl<B: RenderBackend> Drop for PooledHandle<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let inner = Arc::clone(&self.inner);
            let permit = self.permit.take();
            let health = self.health;
            self.runtime.spawn(async move {
                return_to_pool(&inner, handle, health, permit).await;
            });
        }
    }
}

async fn return_to_pool<B: RenderBackend>(
    inner: &PoolInner<B>,
    handle: B::Handle,
    health: HandleHealth,
    permit: Option<OwnedSemaphorePermit>,
) {
    let slot = match health {
        HandleHealth::Healthy => IdleSlot::Ready(handle),
        HandleHealth::Suspected => match handle.reset().await {
            Ok(()) => IdleSlot::Ready(handle),
            Err(e) => {
                warn!(id = %handle.id(), "suspected handle failed reset, discarding: {}", e);
                if let Err(close_err) = handle.close().await {
                    debug!("broken handle close failed: {}", close_err);
                }
                IdleSlot::Vacant
            }
        },
        HandleHealth::Broken => {
            warn!(id = %handle.id(), "discarding broken handle");
            if let Err(e) = handle.close().await {
                debug!("broken handle close failed: {}", e);
            }
            IdleSlot::Vacant
        }
    };

    // Push before the permit drops so a woken waiter always finds a slot.
    inner
        .idle
        .lock()
        .expect("idle set mutex poisoned")
        .push(slot);
    drop(permit);
}
