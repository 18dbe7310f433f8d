//! Native-side holders of C structures (the forward adapter's base).
//!
//! A [`Handle`] owns one reference to a reference-counted structure:
//! cloning adds one, dropping releases one. A [`ScopedHandle`] holds a
//! scoped structure, either lent for one call or owned outright.

use std::os::raw::c_int;
use std::ptr::NonNull;

use tracing::trace;

use crate::base::{self, member_in_bounds, RefCounted, Scoped};
use crate::tracker::ObjectCounter;

pub struct Handle<S: RefCounted> {
    ptr: NonNull<S>,
    counter: Option<&'static ObjectCounter>,
}

// SAFETY: `RefCounted` requires a thread-safe reference count.
unsafe impl<S: RefCounted> Send for Handle<S> {}
unsafe impl<S: RefCounted> Sync for Handle<S> {}

impl<S: RefCounted> Handle<S> {
    /// Take over the reference the caller holds. Null yields `None`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live structure, and the caller
    /// gives up one reference to it.
    pub unsafe fn adopt(ptr: *mut S) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Handle { ptr, counter: None })
    }

    /// Add a reference of our own. Null yields `None`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live structure.
    pub unsafe fn borrow(ptr: *mut S) -> Option<Self> {
        let handle = Self::adopt(ptr)?;
        base::add_ref(ptr);
        Some(handle)
    }

    /// Count this handle and its clones in `counter`.
    pub fn counted(mut self, counter: &'static ObjectCounter) -> Self {
        if self.counter.is_none() {
            counter.increment();
            self.counter = Some(counter);
        }
        self
    }

    pub fn as_ptr(&self) -> *mut S {
        self.ptr.as_ptr()
    }

    pub fn get(&self) -> &S {
        // SAFETY: the handle keeps the structure alive.
        unsafe { self.ptr.as_ref() }
    }

    /// Declared size of the structure.
    pub fn size(&self) -> usize {
        // SAFETY: as above.
        unsafe { base::header(self.as_ptr()).size }
    }

    pub fn refct(&self) -> c_int {
        // SAFETY: as above.
        unsafe { base::refct(self.as_ptr()) }
    }

    /// The member read by `field`, or `None` when the structure is too
    /// short to hold a member at `offset` or the member is unset.
    pub fn member<F: Copy>(&self, offset: usize, field: impl FnOnce(&S) -> Option<F>) -> Option<F> {
        if !member_in_bounds(self.size(), offset) {
            return None;
        }
        field(self.get())
    }

    /// Give the held reference back to the caller.
    pub fn into_raw(self) -> *mut S {
        let ptr = self.as_ptr();
        if let Some(counter) = self.counter {
            counter.decrement();
        }
        std::mem::forget(self);
        ptr
    }
}

impl<S: RefCounted> Clone for Handle<S> {
    fn clone(&self) -> Self {
        // SAFETY: the handle keeps the structure alive.
        unsafe { base::add_ref(self.as_ptr()) };
        if let Some(counter) = self.counter {
            counter.increment();
        }
        Handle {
            ptr: self.ptr,
            counter: self.counter,
        }
    }
}

impl<S: RefCounted> Drop for Handle<S> {
    fn drop(&mut self) {
        if let Some(counter) = self.counter {
            counter.decrement();
        }
        // SAFETY: this handle owns one reference.
        let remaining = unsafe { base::release(self.as_ptr()) };
        trace!(remaining, "released structure");
    }
}

impl<S: RefCounted> std::fmt::Debug for Handle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle").field("ptr", &self.ptr).finish()
    }
}

/// A scoped structure, lent for one call or owned.
#[derive(Debug)]
pub struct ScopedHandle<S: Scoped> {
    ptr: NonNull<S>,
    owned: bool,
}

impl<S: Scoped> ScopedHandle<S> {
    /// Hold a structure the caller keeps ownership of.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a structure that outlives the handle.
    pub unsafe fn lend(ptr: *mut S) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| ScopedHandle { ptr, owned: false })
    }

    /// Take ownership; the structure's `del` runs on drop.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live structure nobody else owns.
    pub unsafe fn adopt(ptr: *mut S) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| ScopedHandle { ptr, owned: true })
    }

    pub fn as_ptr(&self) -> *mut S {
        self.ptr.as_ptr()
    }

    pub fn get(&self) -> &S {
        // SAFETY: lent or owned structures outlive the handle.
        unsafe { self.ptr.as_ref() }
    }

    pub fn member<F: Copy>(&self, offset: usize, field: impl FnOnce(&S) -> Option<F>) -> Option<F> {
        // SAFETY: as above.
        let size = unsafe { base::scoped_header(self.as_ptr()).size };
        if !member_in_bounds(size, offset) {
            return None;
        }
        field(self.get())
    }
}

impl<S: Scoped> Drop for ScopedHandle<S> {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        let base = self.as_ptr().cast::<base::CBaseScoped>();
        // SAFETY: owned structures are live until their `del` runs.
        unsafe {
            if let Some(del) = (*base).del {
                del(base);
            }
        }
    }
}
