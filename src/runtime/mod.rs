//! Global execution lock
//!
//! Managed code runs while holding a single process-wide lock; at most one
//! `ExecutionContext` of a `Runtime` is active at a time. A blocking native
//! call can give the lock up for the duration of the native body through
//! [`ExecutionContext::without_lock`]; argument coercion and result
//! conversion always run under the lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};

static GLOBAL: Lazy<Runtime> = Lazy::new(Runtime::new);

/// Owner of one global execution lock
pub struct Runtime {
    lock: Mutex<()>,
    releases: AtomicU64,
}

impl Runtime {
    /// Isolated runtime with its own lock
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            releases: AtomicU64::new(0),
        }
    }

    /// Process-wide runtime
    pub fn global() -> &'static Runtime {
        &GLOBAL
    }

    /// Block until the lock is free and enter managed execution
    pub fn enter(&self) -> ExecutionContext<'_> {
        ExecutionContext {
            guard: self.lock.lock(),
            runtime: self,
        }
    }

    /// Enter only if no other context currently holds the lock
    pub fn try_enter(&self) -> Option<ExecutionContext<'_>> {
        self.lock.try_lock().map(|guard| ExecutionContext {
            guard,
            runtime: self,
        })
    }

    /// Whether some context currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Number of times a context released the lock around native code
    pub fn lock_releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("locked", &self.is_locked())
            .field("lock_releases", &self.lock_releases())
            .finish()
    }
}

/// Proof that the current thread holds a runtime's execution lock
pub struct ExecutionContext<'rt> {
    guard: MutexGuard<'rt, ()>,
    runtime: &'rt Runtime,
}

impl<'rt> ExecutionContext<'rt> {
    pub fn runtime(&self) -> &'rt Runtime {
        self.runtime
    }

    /// Run `f` with the lock released, reacquiring it before returning
    ///
    /// Other contexts may run while `f` executes. `f` must not touch managed
    /// state.
    pub fn without_lock<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.runtime.releases.fetch_add(1, Ordering::Relaxed);
        MutexGuard::unlocked(&mut self.guard, f)
    }
}

impl fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext").finish_non_exhaustive()
    }
}
