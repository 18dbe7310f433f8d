//! Naming conventions shared by the parser and every emitter.

use serde::{Deserialize, Serialize};

use crate::model::{ClassDef, MethodDef};

/// Prefixes and built-in type names of the native surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Naming {
    /// Native class prefix stripped when deriving C names.
    pub cpp_prefix: String,
    /// Prefix of every generated C identifier.
    pub c_prefix: String,
    /// The ref-counted root class. Built in, never emitted.
    pub root_class: String,
    pub string_type: String,
    pub ref_ptr: String,
}

impl Default for Naming {
    fn default() -> Self {
        Naming {
            cpp_prefix: "Cef".to_string(),
            c_prefix: "cef".to_string(),
            root_class: "CefBase".to_string(),
            string_type: "CefString".to_string(),
            ref_ptr: "CefRefPtr".to_string(),
        }
    }
}

impl Naming {
    fn strip_prefix<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.cpp_prefix.as_str())
            .filter(|rest| !rest.is_empty())
            .unwrap_or(name)
    }

    /// Snake-case base of all per-class names, e.g. `CefBrowserHost` → `browser_host`.
    pub fn class_stem(&self, class: &ClassDef) -> String {
        match &class.capi_name {
            Some(capi) => {
                let trimmed = capi.strip_suffix("_t").unwrap_or(capi);
                let prefix = format!("{}_", self.c_prefix);
                trimmed.strip_prefix(&prefix).unwrap_or(trimmed).to_string()
            }
            None => to_snake_case(self.strip_prefix(&class.name)),
        }
    }

    /// Stem of the adapter file names (`<stem>_cpptoc.h` ...).
    pub fn file_stem(&self, class: &ClassDef) -> String {
        self.class_stem(class)
    }

    /// C struct name of a class, e.g. `cef_browser_t`.
    pub fn class_struct(&self, class: &ClassDef) -> String {
        format!("{}_{}_t", self.c_prefix, self.class_stem(class))
    }

    /// C name of a global enum or plain struct, e.g. `CefThreadId` → `cef_thread_id_t`.
    pub fn c_type_name(&self, native: &str) -> String {
        format!("{}_{}_t", self.c_prefix, to_snake_case(self.strip_prefix(native)))
    }

    /// Prefix of C enumerator names, e.g. `CEF_THREAD_ID_`.
    pub fn enumerator_prefix(&self, native: &str) -> String {
        let c_name = self.c_type_name(native);
        let stem = c_name.strip_suffix("_t").unwrap_or(&c_name);
        format!("{}_", stem.to_ascii_uppercase())
    }

    /// Function-pointer field name of an instance method.
    pub fn method_field(&self, method: &MethodDef) -> String {
        match &method.capi_name {
            Some(name) => name.clone(),
            None => to_snake_case(&method.name),
        }
    }

    /// Exported C function name of a static (creation) method.
    pub fn creation_function(&self, class: &ClassDef, method: &MethodDef) -> String {
        match &method.capi_name {
            Some(name) => name.clone(),
            None => format!(
                "{}_{}_{}",
                self.c_prefix,
                self.class_stem(class),
                to_snake_case(&method.name)
            ),
        }
    }

    pub fn forward_class(&self, class: &ClassDef) -> String {
        format!("{}CppToC", class.name)
    }

    pub fn reverse_class(&self, class: &ClassDef) -> String {
        format!("{}CToCpp", class.name)
    }

    /// Upper-case macro prefix (`CEF`).
    pub fn macro_prefix(&self) -> String {
        self.c_prefix.to_ascii_uppercase()
    }
}

/// Convert a CamelCase identifier to snake_case.
///
/// A word boundary is placed before an upper-case letter that follows a
/// lower-case letter or digit, and before the last capital of an acronym
/// that starts a new word (`DOMNode` → `dom_node`).
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;

    fn class(name: &str, capi_name: Option<&str>) -> ClassDef {
        ClassDef {
            name: name.to_string(),
            doc: Vec::new(),
            methods: Vec::new(),
            ref_counted: true,
            base: None,
            capi_name: capi_name.map(str::to_string),
            location: Location::default(),
        }
    }

    #[test]
    fn snake_case_boundaries() {
        assert_eq!(to_snake_case("BrowserHost"), "browser_host");
        assert_eq!(to_snake_case("GetURL"), "get_url");
        assert_eq!(to_snake_case("DOMNode"), "dom_node");
        assert_eq!(to_snake_case("V8Value"), "v8_value");
        assert_eq!(to_snake_case("get_id"), "get_id");
        assert_eq!(to_snake_case("X"), "x");
    }

    #[test]
    fn class_names() {
        let naming = Naming::default();
        let c = class("CefBrowserHost", None);
        assert_eq!(naming.class_stem(&c), "browser_host");
        assert_eq!(naming.class_struct(&c), "cef_browser_host_t");
        assert_eq!(naming.forward_class(&c), "CefBrowserHostCppToC");
        assert_eq!(naming.reverse_class(&c), "CefBrowserHostCToCpp");
    }

    #[test]
    fn capi_name_overrides_stem() {
        let naming = Naming::default();
        let c = class("CefWebURLRequest", Some("cef_web_urlrequest_t"));
        assert_eq!(naming.file_stem(&c), "web_urlrequest");
        assert_eq!(naming.class_struct(&c), "cef_web_urlrequest_t");
    }

    #[test]
    fn enum_names() {
        let naming = Naming::default();
        assert_eq!(naming.c_type_name("CefThreadId"), "cef_thread_id_t");
        assert_eq!(naming.enumerator_prefix("CefThreadId"), "CEF_THREAD_ID_");
    }

    #[test]
    fn bare_prefix_is_kept() {
        let naming = Naming::default();
        assert_eq!(naming.c_type_name("Cef"), "cef_cef_t");
    }
}
