//! Reference model of the adapter bases the generated code relies on.
//!
//! Generated adapters assume a small runtime contract: reference-counted
//! structures with a common header, null-safe wrapping in both directions,
//! wrapper identity, and a shared allocator for strings and arrays. This
//! crate implements that contract in Rust so it can be exercised directly.
//!
//! ## Modules
//!
//! - [`base`]: `cef_base_t` / `cef_base_scoped_t` headers and reference helpers
//! - [`forward`]: native-side handles to C structures
//! - [`reverse`]: C structures forwarding to native objects
//! - [`string`]: `cef_char_t` strings
//! - [`memory`]: `cef_mem_alloc` / `cef_mem_free` and array buffers
//! - [`tracker`]: live-object counters per adapter

pub mod base;
pub mod error;
pub mod forward;
pub mod memory;
pub mod reverse;
pub mod string;
pub mod tracker;

pub use base::{CBase, CBaseScoped, RefCounted, Scoped};
pub use error::{Result, RuntimeError};
pub use forward::{Handle, ScopedHandle};
pub use reverse::{Binding, ScopedBinding};
pub use string::CChar;
pub use tracker::{AdapterCounters, ObjectCounter};
