//! Strings crossing the boundary.
//!
//! `cef_char_t` is `wchar_t`: UTF-16 code units on Windows, UTF-32 code
//! points elsewhere. Strings handed to C are NUL-terminated buffers from
//! [`string_alloc`] and must come back to [`string_free`].

use std::iter;
use std::ptr;

use crate::error::{Result, RuntimeError};

#[cfg(windows)]
pub type CChar = u16;
#[cfg(not(windows))]
pub type CChar = u32;

#[cfg(windows)]
fn encode(s: &str) -> Vec<CChar> {
    s.encode_utf16().chain(iter::once(0)).collect()
}

#[cfg(not(windows))]
fn encode(s: &str) -> Vec<CChar> {
    s.chars().map(|c| c as CChar).chain(iter::once(0)).collect()
}

#[cfg(windows)]
fn decode(units: &[CChar]) -> Result<String> {
    char::decode_utf16(units.iter().copied())
        .enumerate()
        .map(|(position, c)| c.map_err(|_| RuntimeError::InvalidString { position }))
        .collect()
}

#[cfg(not(windows))]
fn decode(units: &[CChar]) -> Result<String> {
    units
        .iter()
        .enumerate()
        .map(|(position, &u)| char::from_u32(u).ok_or(RuntimeError::InvalidString { position }))
        .collect()
}

/// Number of code units before the terminator.
///
/// # Safety
///
/// `s` must point to a NUL-terminated buffer.
unsafe fn units(s: *const CChar) -> usize {
    let mut n = 0;
    while *s.add(n) != 0 {
        n += 1;
    }
    n
}

/// Copy `s` into a new C string. Text after an embedded NUL is dropped.
pub fn string_alloc(s: &str) -> *mut CChar {
    let text = s.split('\0').next().unwrap_or_default();
    Box::into_raw(encode(text).into_boxed_slice()).cast::<CChar>()
}

/// Free a string from [`string_alloc`]. Null is ignored.
///
/// # Safety
///
/// `s` must be null or come from [`string_alloc`] and not be freed yet.
pub unsafe fn string_free(s: *mut CChar) {
    if s.is_null() {
        return;
    }
    let len = units(s) + 1;
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(s, len)));
}

/// Read a C string. Null reads as the empty string.
///
/// # Safety
///
/// `s` must be null or point to a NUL-terminated buffer.
pub unsafe fn string_read(s: *const CChar) -> Result<String> {
    if s.is_null() {
        return Ok(String::new());
    }
    decode(std::slice::from_raw_parts(s, units(s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_survives_the_crossing() {
        let s = string_alloc("héllo wörld ✓");
        unsafe {
            assert_eq!(string_read(s).unwrap(), "héllo wörld ✓");
            string_free(s);
        }
    }

    #[test]
    fn null_reads_empty_and_frees_quietly() {
        unsafe {
            assert_eq!(string_read(ptr::null()).unwrap(), "");
            string_free(ptr::null_mut());
        }
    }

    #[test]
    fn embedded_nul_truncates() {
        let s = string_alloc("abc\0def");
        unsafe {
            assert_eq!(string_read(s).unwrap(), "abc");
            string_free(s);
        }
    }

    #[test]
    fn invalid_units_are_reported() {
        #[cfg(windows)]
        let bad: Vec<CChar> = vec![0x61, 0xD800, 0];
        #[cfg(not(windows))]
        let bad: Vec<CChar> = vec![0x61, 0x11_0000, 0];
        let err = unsafe { string_read(bad.as_ptr()) }.unwrap_err();
        assert_eq!(err, RuntimeError::InvalidString { position: 1 });
    }
}
