//! Parse and classification error types.

use serde::Serialize;

/// A 1-based position in the input header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Location { line, column }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The header could not be turned into a model.
///
/// Always names the offending construct (e.g. "class", "parameter",
/// "attribute") and the approximate location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: invalid {construct}: {detail}")]
pub struct ParseError {
    pub construct: String,
    pub location: Location,
    pub detail: String,
}

impl ParseError {
    pub fn new(construct: impl Into<String>, location: Location, detail: impl Into<String>) -> Self {
        ParseError {
            construct: construct.into(),
            location,
            detail: detail.into(),
        }
    }
}

/// A parameter or return type matched no crossing strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationError {
    /// Class being classified (empty until the site is known).
    pub class: String,
    pub method: Option<String>,
    /// Parameter name, or `None` for the return value.
    pub param: Option<String>,
    pub detail: String,
}

impl ClassificationError {
    pub fn new(detail: impl Into<String>) -> Self {
        ClassificationError {
            class: String::new(),
            method: None,
            param: None,
            detail: detail.into(),
        }
    }

    /// Attach the class/method/parameter the failure belongs to.
    pub fn at(mut self, class: &str, method: &str, param: Option<&str>) -> Self {
        self.class = class.to_string();
        self.method = Some(method.to_string());
        self.param = param.map(str::to_string);
        self
    }
}

impl std::fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot classify ")?;
        match (&self.method, &self.param) {
            (Some(m), Some(p)) => write!(f, "parameter '{p}' of {}::{m}", self.class)?,
            (Some(m), None) => write!(f, "return value of {}::{m}", self.class)?,
            _ if !self.class.is_empty() => write!(f, "class {}", self.class)?,
            _ => write!(f, "type")?,
        }
        write!(f, ": {}", self.detail)
    }
}

impl std::error::Error for ClassificationError {}

/// Result type alias for parsing.
pub type Result<T> = std::result::Result<T, ParseError>;
