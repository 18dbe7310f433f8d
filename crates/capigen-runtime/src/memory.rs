//! `cef_mem_alloc` / `cef_mem_free` and array buffers.
//!
//! Arrays cross as a count plus a buffer from [`mem_alloc`]; whichever side
//! receives the buffer frees it with [`mem_free`].

use std::alloc::{alloc, dealloc, Layout};
use std::mem::{align_of, size_of};
use std::os::raw::c_void;
use std::ptr;

use crate::error::{Result, RuntimeError};

/// Block prefix holding the allocation size; keeps 16-byte alignment.
const HEADER: usize = 16;

/// Allocate `size` bytes. Returns null on failure.
pub fn mem_alloc(size: usize) -> *mut c_void {
    let Some(total) = size.checked_add(HEADER) else {
        return ptr::null_mut();
    };
    let Ok(layout) = Layout::from_size_align(total, HEADER) else {
        return ptr::null_mut();
    };
    // SAFETY: the layout is never zero-sized.
    unsafe {
        let block = alloc(layout);
        if block.is_null() {
            return ptr::null_mut();
        }
        block.cast::<usize>().write(total);
        block.add(HEADER).cast()
    }
}

/// Free a block from [`mem_alloc`]. Null is ignored.
///
/// # Safety
///
/// `p` must be null or come from [`mem_alloc`] and not be freed yet.
pub unsafe fn mem_free(p: *mut c_void) {
    if p.is_null() {
        return;
    }
    let block = p.cast::<u8>().sub(HEADER);
    let total = block.cast::<usize>().read();
    dealloc(block, Layout::from_size_align_unchecked(total, HEADER));
}

/// Copy `items` into a new buffer. An empty slice yields `(0, null)`.
pub fn array_to_c<T: Copy>(items: &[T]) -> Result<(usize, *mut T)> {
    if items.is_empty() {
        return Ok((0, ptr::null_mut()));
    }
    let failed = RuntimeError::Allocation {
        count: items.len(),
        size: size_of::<T>(),
    };
    if align_of::<T>() > HEADER {
        return Err(failed);
    }
    let bytes = size_of::<T>().checked_mul(items.len()).ok_or(failed.clone())?;
    let buffer = mem_alloc(bytes).cast::<T>();
    if buffer.is_null() {
        return Err(failed);
    }
    // SAFETY: the buffer holds `items.len()` elements and is fresh.
    unsafe { ptr::copy_nonoverlapping(items.as_ptr(), buffer, items.len()) };
    Ok((items.len(), buffer))
}

/// Copy a C array into a vector. The buffer stays with the caller.
///
/// # Safety
///
/// When `count > 0`, `items` must be null or point to `count` elements.
pub unsafe fn array_from_c<T: Copy>(count: usize, items: *const T) -> Result<Vec<T>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if items.is_null() {
        return Err(RuntimeError::NullArray { count });
    }
    Ok(std::slice::from_raw_parts(items, count).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_cross_and_come_back() {
        let (count, buffer) = array_to_c(&[3i32, 1, 4, 1, 5]).unwrap();
        assert_eq!(count, 5);
        unsafe {
            assert_eq!(array_from_c(count, buffer).unwrap(), vec![3, 1, 4, 1, 5]);
            mem_free(buffer.cast());
        }
    }

    #[test]
    fn empty_arrays_have_no_buffer() {
        let (count, buffer) = array_to_c::<f64>(&[]).unwrap();
        assert_eq!(count, 0);
        assert!(buffer.is_null());
        assert!(unsafe { array_from_c::<f64>(0, ptr::null()) }.unwrap().is_empty());
    }

    #[test]
    fn null_buffer_with_count_is_an_error() {
        let err = unsafe { array_from_c::<u8>(3, ptr::null()) }.unwrap_err();
        assert_eq!(err, RuntimeError::NullArray { count: 3 });
    }

    #[test]
    fn allocations_are_aligned() {
        let p = mem_alloc(24);
        assert!(!p.is_null());
        assert_eq!(p as usize % HEADER, 0);
        unsafe {
            mem_free(p);
            mem_free(ptr::null_mut());
        }
    }
}
