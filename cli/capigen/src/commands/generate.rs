//! `capigen generate`: translate a header into the C API and its adapters.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{debug, error};

use capigen_emit::{generate, GenerateOptions, IncrementalWriter, OutputKinds};

use crate::config::CapigenConfig;

#[derive(Debug, Clone, Default, Args)]
pub struct GenerateArgs {
    /// Native header to translate
    #[arg(long)]
    pub cpp_header: PathBuf,
    /// Combined C API header to write
    #[arg(long)]
    pub capi_header: Option<PathBuf>,
    /// Directory for forward adapters (<name>_cpptoc.h/.cc)
    #[arg(long)]
    pub cpptoc_dir: Option<PathBuf>,
    /// Directory for reverse adapters (<name>_ctocpp.h/.cc)
    #[arg(long)]
    pub ctocpp_dir: Option<PathBuf>,
    #[arg(long)]
    pub no_cpptoc_header: bool,
    #[arg(long)]
    pub no_cpptoc_impl: bool,
    #[arg(long)]
    pub no_ctocpp_header: bool,
    #[arg(long)]
    pub no_ctocpp_impl: bool,
    /// Overwrite changed files without keeping a backup
    #[arg(long)]
    pub no_backup: bool,
    /// Only generate adapters for these classes (repeatable)
    #[arg(short = 'c', long = "classes", alias = "class", value_name = "CLASS")]
    pub classes: Vec<String>,
    /// Skip classes that cannot be translated instead of stopping
    #[arg(long)]
    pub keep_going: bool,
    /// Report files that would change without writing anything
    #[arg(long)]
    pub check: bool,
    /// Configuration file (default: capigen.toml searched upward)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run `capigen generate`.
pub fn run(args: &GenerateArgs, cwd: &Path) -> Result<()> {
    let (config, config_dir) = load_config(args.config.as_deref(), cwd)?;
    let (options, writer) = resolve(args, &config, &config_dir)?;
    debug!(?options, ?writer, "resolved options");

    let report = generate(&options, &writer)
        .with_context(|| format!("generating from {}", options.cpp_header.display()))?;

    if args.check {
        println!("Check - {} file(s) would change", report.files_changed);
    } else {
        println!("Done - wrote {} file(s)", report.files_changed);
    }

    if !report.is_clean() {
        for failure in &report.failures {
            error!("{failure}");
        }
        bail!("{} class(es) could not be translated", report.failures.len());
    }
    if args.check && report.files_changed > 0 {
        bail!("generated files are out of date");
    }
    Ok(())
}

/// The explicit config file, or one found upward from `cwd`, with the
/// directory its relative paths resolve against.
fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<(CapigenConfig, PathBuf)> {
    if let Some(path) = explicit {
        let path = cwd.join(path);
        let config = CapigenConfig::load(&path)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.to_path_buf());
        return Ok((config, dir));
    }
    match CapigenConfig::find_and_load(cwd)? {
        Some(found) => Ok(found),
        None => Ok((CapigenConfig::default(), cwd.to_path_buf())),
    }
}

/// Merge flags over the config file. Flags win; config paths are relative
/// to `config_dir`.
pub fn resolve(
    args: &GenerateArgs,
    config: &CapigenConfig,
    config_dir: &Path,
) -> Result<(GenerateOptions, IncrementalWriter)> {
    let from_config = |p: &Option<PathBuf>| p.as_ref().map(|p| config_dir.join(p));
    let output = &config.output;

    let options = GenerateOptions {
        cpp_header: args.cpp_header.clone(),
        capi_header: args.capi_header.clone().or_else(|| from_config(&output.capi_header)),
        cpptoc_dir: args.cpptoc_dir.clone().or_else(|| from_config(&output.cpptoc_dir)),
        ctocpp_dir: args.ctocpp_dir.clone().or_else(|| from_config(&output.ctocpp_dir)),
        outputs: OutputKinds {
            cpptoc_header: !args.no_cpptoc_header,
            cpptoc_impl: !args.no_cpptoc_impl,
            ctocpp_header: !args.no_ctocpp_header,
            ctocpp_impl: !args.no_ctocpp_impl,
        },
        classes: args.classes.clone(),
        keep_going: args.keep_going,
        policy: config.policy()?,
        emit: config.emit_config(),
    };

    if options.capi_header.is_none() && options.cpptoc_dir.is_none() && options.ctocpp_dir.is_none() {
        bail!("nothing to generate: pass --capi-header, --cpptoc-dir or --ctocpp-dir");
    }

    let backup = !args.no_backup && output.backup.unwrap_or(true);
    Ok((options, IncrementalWriter::new(backup, args.check)))
}
