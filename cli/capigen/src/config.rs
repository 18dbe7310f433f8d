//! `capigen.toml` parsing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use capigen_core::{ClassifyPolicy, Naming, ShapeRule};
use capigen_emit::{EmitConfig, EmitError, Includes};

pub const CONFIG_FILE: &str = "capigen.toml";

/// The whole configuration file. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapigenConfig {
    pub naming: Naming,
    pub output: OutputConfig,
    pub includes: Includes,
    pub policy: PolicyConfig,
    pub banner: BannerConfig,
}

/// Default output locations, relative to the directory holding the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub capi_header: Option<PathBuf>,
    pub cpptoc_dir: Option<PathBuf>,
    pub ctocpp_dir: Option<PathBuf>,
    /// Keep replaced files as hashed backups (default true).
    pub backup: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Precedence of shape rules for ambiguous raw pointers.
    pub tie_break: Vec<ShapeRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerConfig {
    pub lines: Vec<String>,
}

impl CapigenConfig {
    /// Search upward from `start_dir` for a `capigen.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Ok(Some((Self::load(&candidate)?, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing capigen.toml")
    }

    /// Settings that end up in generated text.
    pub fn emit_config(&self) -> EmitConfig {
        EmitConfig {
            naming: self.naming.clone(),
            includes: self.includes.clone(),
            banner: self.banner.lines.clone(),
        }
    }

    /// Tie-break policy; an empty list keeps the built-in order.
    pub fn policy(&self) -> capigen_emit::Result<ClassifyPolicy> {
        if self.policy.tie_break.is_empty() {
            return Ok(ClassifyPolicy::default());
        }
        ClassifyPolicy::new(self.policy.tie_break.clone())
            .map_err(|e| EmitError::config(format!("[policy] tie_break: {e}")))
    }
}
