//! Header model, parser and type classifier for the capigen translator.
//!
//! ## Modules
//!
//! - [`lexer`]: header tokenizer (comments, attributes, preprocessor lines)
//! - [`attrs`]: `/*--cef(...)--*/` attribute lists
//! - [`types`]: primitive set and type expressions
//! - [`model`]: the immutable header model
//! - [`parser`]: header text to [`HeaderModel`]
//! - [`classify`]: crossing strategy per parameter and return
//! - [`naming`]: C and file names derived from native names

pub mod attrs;
pub mod classify;
pub mod error;
pub mod lexer;
pub mod model;
pub mod naming;
pub mod parser;
pub mod types;

pub use classify::{
    ClassCrossings, Classifier, ClassifyPolicy, CrossingStrategy, ElementKind, MethodCrossings,
    ParamCrossing, ShapeRule,
};
pub use error::{ClassificationError, Location, ParseError};
pub use model::{
    ArrayLength, ClassDef, Direction, HeaderModel, MethodDef, Ownership, ParamDef, Passing,
    Primitive, TypeRef,
};
pub use naming::Naming;
pub use parser::{parse_header, ParseOptions};
