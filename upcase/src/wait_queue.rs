//! Wait queue
//!
//! The sleep/wake primitive a `TransformBuffer` reader suspends on.
//! One queue is shared by every buffer of a device; buffers are told
//! apart by their `Handle`.
//!
//! # Lost wake-ups
//!
//! A reader does:
//!
//! 10. check the buffer: nothing unread
//! 20. register itself as a waiter
//! 30. sleep
//!
//! and a writer does:
//!
//! 40. store a new generation
//! 50. wake registered waiters
//!
//! Running on different threads, step 50 can land between 10 and 20. The
//! writer then wakes nobody and the reader sleeps on data that is already
//! there. To close the gap the reader takes the queue lock before step 10
//! and hands it to `wait`, which registers the waiter and only then
//! releases the lock:
//!
//! ```ignore
//! let lock = queue.get_lock();
//! if nothing_unread() {
//!     let wakeup = queue.wait(handle, "reader", lock);
//!     // lock already released here
//!     wakeup.await;
//! }
//! ```
//!
//! Lock order is queue -> buffer state. A notifier updates buffer state,
//! releases it, and only then calls `notify`, which takes the queue lock.
//!
//! Wake-ups are a hint, not a promise: the woken reader must check the
//! buffer again before consuming anything.

use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::idgen::Handle;

/// Why a waiter was woken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// A writer stored a new generation
    DataAvailable,
    /// An external interrupt was delivered to the handle
    Interrupt,
    /// The handle was unregistered, its buffer is gone
    Unregistered,
}

struct Waiter {
    sender: oneshot::Sender<Wakeup>,
    debug_hint: String,
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("debug_hint", &self.debug_hint)
            .finish_non_exhaustive()
    }
}

pub struct WaitQueueState {
    registered: HashMap<Handle, String>,
    waiters: HashMap<Handle, Vec<Waiter>>,
}

impl WaitQueueState {
    fn new() -> Self {
        Self {
            registered: HashMap::new(),
            waiters: HashMap::new(),
        }
    }
}

/// Thread-safe wait queue keyed by buffer handle
#[derive(Clone)]
pub struct WaitQueueArc {
    inner: Arc<Mutex<WaitQueueState>>,
}

impl WaitQueueArc {
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(WaitQueueState::new())),
        }
    }

    /// Get the lock for an atomic condition-check + wait
    pub fn get_lock(&self) -> MutexGuard<'_, WaitQueueState> {
        self.inner.lock()
    }

    /// Allow waits on `handle`
    pub fn register(&self, handle: Handle, debug_hint: &str) {
        let mut state = self.inner.lock();
        if let Some(old_hint) = state.registered.insert(handle, debug_hint.to_string()) {
            log::warn!("wait_queue.register: handle {handle} already registered (was: '{old_hint}')");
        }
    }

    /// Forbid further waits on `handle` and wake everyone still waiting
    pub fn unregister(&self, handle: Handle) {
        let mut state = self.inner.lock();
        if state.registered.remove(&handle).is_none() {
            log::warn!("wait_queue.unregister: handle {handle} not registered");
        }
        drop(state);

        self.notify(handle, Wakeup::Unregistered);
    }

    #[must_use]
    pub fn is_registered(&self, handle: Handle) -> bool {
        self.inner.lock().registered.contains_key(&handle)
    }

    /// Number of waiters currently suspended on `handle`
    #[must_use]
    pub fn waiter_count(&self, handle: Handle) -> usize {
        self.inner.lock().waiters.get(&handle).map_or(0, Vec::len)
    }

    /// Wake every waiter of `handle`, returns how many were woken
    pub fn notify(&self, handle: Handle, wakeup: Wakeup) -> usize {
        let mut state = self.inner.lock();
        let waiters = state.waiters.remove(&handle).unwrap_or_default();
        drop(state);

        log::debug!(
            "wait_queue.notify: handle {handle}, wakeup={wakeup:?}, waiters: {}",
            waiters.len()
        );

        let mut woken = 0;
        for waiter in waiters {
            if waiter.sender.send(wakeup).is_ok() {
                woken += 1;
            } else {
                // The waiting future was dropped (e.g. cancelled by select!)
                log::debug!(
                    "wait_queue.notify: waiter gone for handle {handle} (hint: {})",
                    waiter.debug_hint
                );
            }
        }
        woken
    }

    /// Suspend until `handle` is notified
    ///
    /// Precondition: the caller holds `lock` and has just checked that it
    /// needs to wait. Post-condition: the lock is released before this
    /// method returns, the waiter is already registered.
    ///
    /// If `handle` is not registered the returned future resolves at once
    /// with `Wakeup::Unregistered`.
    pub fn wait(
        &self,
        handle: Handle,
        debug_hint: &str,
        mut lock: MutexGuard<'_, WaitQueueState>,
    ) -> impl Future<Output = Wakeup> + Send {
        let (tx, rx) = oneshot::channel();

        if lock.registered.contains_key(&handle) {
            lock.waiters.entry(handle).or_default().push(Waiter {
                sender: tx,
                debug_hint: debug_hint.to_string(),
            });
            drop(lock);
        } else {
            drop(lock);
            let _ = tx.send(Wakeup::Unregistered);
        }

        // A closed channel means the queue itself was torn down
        async move { rx.await.unwrap_or(Wakeup::Unregistered) }
    }
}

impl std::fmt::Debug for WaitQueueArc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("WaitQueueArc")
            .field("registered", &state.registered.len())
            .field("waiting_handles", &state.waiters.len())
            .finish()
    }
}
