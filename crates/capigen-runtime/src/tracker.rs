//! Live-object counters, one pair per adapter class.
//!
//! The generated adapters keep a debug-build `DebugObjCt`; these counters
//! play the same part so leaks show up in tests.

use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct ObjectCounter {
    live: AtomicIsize,
    created: AtomicUsize,
}

impl ObjectCounter {
    pub const fn new() -> Self {
        ObjectCounter {
            live: AtomicIsize::new(0),
            created: AtomicUsize::new(0),
        }
    }

    pub fn increment(&self) {
        self.live.fetch_add(1, Ordering::Relaxed);
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        let before = self.live.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(before > 0, "object counter underflow");
    }

    /// Objects alive right now.
    pub fn live(&self) -> isize {
        self.live.load(Ordering::Relaxed)
    }

    /// Objects ever created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

/// Counters for both adapters of one class.
#[derive(Debug, Default)]
pub struct AdapterCounters {
    /// Native wrappers around C structures.
    pub forward: ObjectCounter,
    /// C structures around native objects.
    pub reverse: ObjectCounter,
}

impl AdapterCounters {
    pub const fn new() -> Self {
        AdapterCounters {
            forward: ObjectCounter::new(),
            reverse: ObjectCounter::new(),
        }
    }

    /// Whether every adapter ever created has been destroyed.
    pub fn is_balanced(&self) -> bool {
        self.forward.live() == 0 && self.reverse.live() == 0
    }
}
