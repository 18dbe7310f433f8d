//! Emitters and incremental writer for the capigen translator.
//!
//! Every output derives from one immutable [`capigen_core::HeaderModel`]
//! and the crossing strategies the classifier assigns to it:
//!
//! - [`capi_header`]: the flat C header (prelude, enums, structs, class structs)
//! - [`forward`]: per-class forward adapters ("CppToC")
//! - [`reverse`]: per-class reverse adapters ("CToCpp")
//! - [`writer`]: content-comparing writer with hashed backups
//! - [`generator`]: the read, parse, classify, write driver

pub mod adapter;
pub mod capi_header;
pub mod config;
pub mod ctype;
pub mod error;
pub mod forward;
pub mod generator;
pub mod reverse;
pub mod source;
pub mod writer;

pub use config::{EmitConfig, Includes};
pub use error::{EmitError, Result, WriteError};
pub use forward::ForwardEmitter;
pub use generator::{generate, GenerateOptions, GenerationReport, OutputKinds};
pub use reverse::ReverseEmitter;
pub use writer::IncrementalWriter;
