//! Interop counters
//!
//! Process-wide and monotonic; read with [`stats`].

use std::sync::atomic::{AtomicUsize, Ordering};

static CALLS: AtomicUsize = AtomicUsize::new(0);
static COERCION_ERRORS: AtomicUsize = AtomicUsize::new(0);
static ARITY_ERRORS: AtomicUsize = AtomicUsize::new(0);
static LOCK_RELEASES: AtomicUsize = AtomicUsize::new(0);
static LIBRARIES_LOADED: AtomicUsize = AtomicUsize::new(0);

/// Interop statistics for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteropStats {
    /// Native calls that reached the callee
    pub calls_made: usize,
    /// Calls rejected because an argument did not coerce
    pub marshaling_errors: usize,
    /// Calls rejected for argument count
    pub arity_errors: usize,
    /// Native calls run with the execution lock released
    pub lock_releases: usize,
    pub libraries_loaded: usize,
}

/// Snapshot of the counters
pub fn stats() -> InteropStats {
    InteropStats {
        calls_made: CALLS.load(Ordering::Relaxed),
        marshaling_errors: COERCION_ERRORS.load(Ordering::Relaxed),
        arity_errors: ARITY_ERRORS.load(Ordering::Relaxed),
        lock_releases: LOCK_RELEASES.load(Ordering::Relaxed),
        libraries_loaded: LIBRARIES_LOADED.load(Ordering::Relaxed),
    }
}

#[inline]
pub(crate) fn record_call(released_lock: bool) {
    CALLS.fetch_add(1, Ordering::Relaxed);
    if released_lock {
        LOCK_RELEASES.fetch_add(1, Ordering::Relaxed);
    }
}

#[inline]
pub(crate) fn record_coercion_error() {
    COERCION_ERRORS.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_arity_error() {
    ARITY_ERRORS.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_library_loaded() {
    LIBRARIES_LOADED.fetch_add(1, Ordering::Relaxed);
}
