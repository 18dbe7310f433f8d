//! `/*--cef(...)--*/` attribute lists.

use serde::Serialize;

use crate::error::{Location, ParseError, Result};

/// Keys accepted on a class.
pub const CLASS_KEYS: &[&str] = &["capi_name", "source"];

/// Keys accepted on a method.
pub const METHOD_KEYS: &[&str] = &[
    "capi_name",
    "optional_param",
    "transfer",
    "borrow",
    "out",
    "count",
    "return",
    "default_retval",
];

/// Keys that name a parameter and may repeat.
const REPEATABLE: &[&str] = &["optional_param", "transfer", "borrow", "out", "count"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attr {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes {
    pub entries: Vec<Attr>,
    #[serde(skip)]
    pub location: Location,
}

impl Attributes {
    /// Parse the text between `cef(` and `)`.
    pub fn parse(inner: &str, location: Location) -> Result<Self> {
        let mut entries = Vec::new();
        for item in inner.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (key, value) = match item.split_once('=') {
                Some((k, v)) => {
                    let v = v.trim();
                    if v.is_empty() {
                        return Err(ParseError::new(
                            "attribute",
                            location,
                            format!("missing value for '{}'", k.trim()),
                        ));
                    }
                    (k.trim(), Some(v.to_string()))
                }
                None => (item, None),
            };
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ParseError::new(
                    "attribute",
                    location,
                    format!("malformed key in '{item}'"),
                ));
            }
            entries.push(Attr {
                key: key.to_string(),
                value,
            });
        }
        Ok(Attributes { entries, location })
    }

    /// Concatenate another list (several attribute comments before one declaration).
    pub fn merge(&mut self, other: Attributes) {
        if self.entries.is_empty() {
            self.location = other.location;
        }
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reject keys outside `allowed`, keys without a value, and duplicates of
    /// single-valued keys.
    pub fn validate(&self, allowed: &[&str], construct: &str) -> Result<()> {
        let mut seen: Vec<&str> = Vec::new();
        for attr in &self.entries {
            if !allowed.contains(&attr.key.as_str()) {
                return Err(self.error(format!("unknown key '{}' on {construct}", attr.key)));
            }
            if attr.value.is_none() {
                return Err(self.error(format!("missing value for '{}'", attr.key)));
            }
            if !REPEATABLE.contains(&attr.key.as_str()) {
                if seen.contains(&attr.key.as_str()) {
                    return Err(self.error(format!("duplicate key '{}'", attr.key)));
                }
                seen.push(&attr.key);
            }
        }
        Ok(())
    }

    /// Value of a single-valued key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|a| a.key == key)
            .and_then(|a| a.value.as_deref())
    }

    /// Every value of a repeatable key, in order.
    pub fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |a| a.key == key)
            .filter_map(|a| a.value.as_deref())
    }

    pub fn error(&self, detail: impl Into<String>) -> ParseError {
        ParseError::new("attribute", self.location, detail)
    }
}
