//! Emission settings that end up inside generated text.

use serde::{Deserialize, Serialize};

use capigen_core::Naming;

/// Include paths written into generated files, relative to the include root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Includes {
    pub native_header: String,
    pub capi_header: String,
    pub cpptoc_dir: String,
    pub ctocpp_dir: String,
    /// Header declaring the forward adapter base templates.
    pub cpptoc_base: String,
    /// Header declaring the reverse adapter base templates.
    pub ctocpp_base: String,
}

impl Default for Includes {
    fn default() -> Self {
        Includes {
            native_header: "include/cef.h".to_string(),
            capi_header: "include/cef_capi.h".to_string(),
            cpptoc_dir: "libcef_dll/cpptoc".to_string(),
            ctocpp_dir: "libcef_dll/ctocpp".to_string(),
            cpptoc_base: "libcef_dll/cpptoc/cpptoc.h".to_string(),
            ctocpp_base: "libcef_dll/ctocpp/ctocpp.h".to_string(),
        }
    }
}

impl Includes {
    pub fn cpptoc_header(&self, stem: &str) -> String {
        format!("{}/{stem}_cpptoc.h", self.cpptoc_dir.trim_end_matches('/'))
    }

    pub fn ctocpp_header(&self, stem: &str) -> String {
        format!("{}/{stem}_ctocpp.h", self.ctocpp_dir.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitConfig {
    pub naming: Naming,
    pub includes: Includes,
    /// Lines placed (as `//` comments) at the top of every generated file.
    pub banner: Vec<String>,
}

/// Include guard for a header path, e.g. `include/cef_capi.h` → `CEF_INCLUDE_CEF_CAPI_H_`.
pub fn include_guard(prefix: &str, path: &str) -> String {
    let mut guard = String::with_capacity(path.len() + prefix.len() + 2);
    guard.push_str(&prefix.to_ascii_uppercase());
    guard.push('_');
    for c in path.chars() {
        if c.is_ascii_alphanumeric() {
            guard.push(c.to_ascii_uppercase());
        } else {
            guard.push('_');
        }
    }
    guard.push('_');
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_from_path() {
        assert_eq!(include_guard("cef", "include/cef_capi.h"), "CEF_INCLUDE_CEF_CAPI_H_");
        assert_eq!(
            include_guard("cef", "libcef_dll/cpptoc/frame_cpptoc.h"),
            "CEF_LIBCEF_DLL_CPPTOC_FRAME_CPPTOC_H_"
        );
    }

    #[test]
    fn adapter_header_paths() {
        let includes = Includes {
            cpptoc_dir: "gen/cpptoc/".to_string(),
            ..Includes::default()
        };
        assert_eq!(includes.cpptoc_header("browser"), "gen/cpptoc/browser_cpptoc.h");
        assert_eq!(includes.ctocpp_header("browser"), "libcef_dll/ctocpp/browser_ctocpp.h");
    }
}
