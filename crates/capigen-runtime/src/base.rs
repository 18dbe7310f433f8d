//! Structure headers shared by every C-ABI interface.
//!
//! Mirrors `cef_base_t` and `cef_base_scoped_t` in the generated C header:
//! a reference-counted structure starts with a [`CBase`], a structure owned
//! by exactly one side starts with a [`CBaseScoped`].

use std::os::raw::c_int;

/// `add_ref`, `release` and `get_refct` all share this shape.
pub type RefFn = unsafe extern "C" fn(this: *mut CBase) -> c_int;

/// Header of every reference-counted structure.
#[repr(C)]
#[derive(Debug, Default)]
pub struct CBase {
    /// Size of the full structure, header included.
    pub size: usize,
    /// Adds a reference; returns the new count.
    pub add_ref: Option<RefFn>,
    /// Drops a reference; returns the remaining count.
    pub release: Option<RefFn>,
    pub get_refct: Option<RefFn>,
}

/// Header of every structure owned by exactly one side.
#[repr(C)]
#[derive(Debug, Default)]
pub struct CBaseScoped {
    pub size: usize,
    /// Destroys the structure. Unset when the structure is only lent.
    pub del: Option<unsafe extern "C" fn(this: *mut CBaseScoped)>,
}

/// A C structure beginning with a [`CBase`].
///
/// # Safety
///
/// The type must be `#[repr(C)]` with a [`CBase`] as its first field, and
/// its reference count must be safe to adjust from any thread.
pub unsafe trait RefCounted: Sized {}

// SAFETY: trivially its own header.
unsafe impl RefCounted for CBase {}

/// A C structure beginning with a [`CBaseScoped`].
///
/// # Safety
///
/// The type must be `#[repr(C)]` with a [`CBaseScoped`] as its first field.
pub unsafe trait Scoped: Sized {}

// SAFETY: trivially its own header.
unsafe impl Scoped for CBaseScoped {}

/// Header of a reference-counted structure.
///
/// # Safety
///
/// `s` must point to a live structure.
pub unsafe fn header<'a, S: RefCounted>(s: *mut S) -> &'a CBase {
    &*s.cast::<CBase>()
}

/// Header of a scoped structure.
///
/// # Safety
///
/// `s` must point to a live structure.
pub unsafe fn scoped_header<'a, S: Scoped>(s: *mut S) -> &'a CBaseScoped {
    &*s.cast::<CBaseScoped>()
}

/// `CEF_ADD_REF`. Null and structures without the function yield 0.
///
/// # Safety
///
/// `s` must be null or point to a live structure.
pub unsafe fn add_ref<S: RefCounted>(s: *mut S) -> c_int {
    let base = s.cast::<CBase>();
    match base.as_ref().and_then(|b| b.add_ref) {
        Some(f) => f(base),
        None => 0,
    }
}

/// `CEF_RELEASE`. The structure may be gone when this returns 0.
///
/// # Safety
///
/// `s` must be null or point to a live structure holding a reference owned
/// by the caller.
pub unsafe fn release<S: RefCounted>(s: *mut S) -> c_int {
    let base = s.cast::<CBase>();
    match base.as_ref().and_then(|b| b.release) {
        Some(f) => f(base),
        None => 0,
    }
}

/// Current reference count, or 0 when it cannot be read.
///
/// # Safety
///
/// `s` must be null or point to a live structure.
pub unsafe fn refct<S: RefCounted>(s: *mut S) -> c_int {
    let base = s.cast::<CBase>();
    match base.as_ref().and_then(|b| b.get_refct) {
        Some(f) => f(base),
        None => 0,
    }
}

/// Whether a member at `offset` lies inside a structure of `size` bytes.
///
/// A structure built against an older header is shorter than the current
/// definition; members past its end must not be read.
pub fn member_in_bounds(size: usize, offset: usize) -> bool {
    offset < size
}
