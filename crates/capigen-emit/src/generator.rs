//! Generation driver: read, parse, classify everything, then write.
//!
//! Nothing is written until every selected class has been classified, so
//! a failing run leaves the output tree untouched (unless keep-going asks
//! for the healthy classes to be written anyway).

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use capigen_core::{
    parse_header, ClassCrossings, ClassDef, ClassificationError, Classifier, ClassifyPolicy,
    HeaderModel, ParseOptions,
};
use tracing::{debug, info, warn};

use crate::capi_header;
use crate::config::EmitConfig;
use crate::ctype::CTypes;
use crate::error::{EmitError, Result};
use crate::forward::ForwardEmitter;
use crate::reverse::ReverseEmitter;
use crate::writer::IncrementalWriter;

/// Which per-class files to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputKinds {
    pub cpptoc_header: bool,
    pub cpptoc_impl: bool,
    pub ctocpp_header: bool,
    pub ctocpp_impl: bool,
}

impl Default for OutputKinds {
    fn default() -> Self {
        OutputKinds {
            cpptoc_header: true,
            cpptoc_impl: true,
            ctocpp_header: true,
            ctocpp_impl: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// The native-surface header to translate.
    pub cpp_header: PathBuf,
    pub capi_header: Option<PathBuf>,
    pub cpptoc_dir: Option<PathBuf>,
    pub ctocpp_dir: Option<PathBuf>,
    pub outputs: OutputKinds,
    /// Allow-list of class names; empty selects every class.
    pub classes: Vec<String>,
    /// Skip classes that fail classification instead of aborting.
    pub keep_going: bool,
    pub policy: ClassifyPolicy,
    pub emit: EmitConfig,
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Files written (or, in check mode, that would be written).
    pub files_changed: usize,
    /// Classes skipped under keep-going.
    pub failures: Vec<ClassificationError>,
}

impl GenerationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Read and parse the header named by `options`.
pub fn load_model(options: &GenerateOptions) -> Result<HeaderModel> {
    let path = &options.cpp_header;
    let src = fs::read_to_string(path)
        .map_err(|e| EmitError::input(format!("cannot read header {}: {e}", path.display())))?;
    let parse_options = ParseOptions {
        naming: options.emit.naming.clone(),
    };
    Ok(parse_header(&src, &parse_options)?)
}

/// Classes named by the filter (all when empty), sorted by name.
pub fn select_classes<'m>(model: &'m HeaderModel, filter: &[String]) -> Result<Vec<&'m ClassDef>> {
    let unknown: Vec<&str> = filter
        .iter()
        .filter(|name| model.class(name).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(EmitError::input(format!(
            "unknown class(es) in filter: {}",
            unknown.join(", ")
        )));
    }

    let wanted: BTreeSet<&str> = filter.iter().map(String::as_str).collect();
    Ok(model
        .class_names()
        .into_iter()
        .filter(|name| wanted.is_empty() || wanted.contains(name))
        .filter_map(|name| model.class(name))
        .collect())
}

/// Run one generation.
pub fn generate(options: &GenerateOptions, writer: &IncrementalWriter) -> Result<GenerationReport> {
    let model = load_model(options)?;
    let selected = select_classes(&model, &options.classes)?;
    let classifier = Classifier::new(&model, options.policy.clone());
    let mut report = GenerationReport::default();

    let mut classified: Vec<ClassCrossings<'_>> = Vec::with_capacity(selected.len());
    for class in selected {
        match classifier.classify_class(class) {
            Ok(c) => classified.push(c),
            Err(e) if options.keep_going => {
                warn!(class = %class.name, error = %e, "skipping class");
                report.failures.push(e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    // The C header covers every class, selected or not.
    let capi_text = match &options.capi_header {
        Some(_) => match capi_header::render(&model, &options.emit, &options.policy) {
            Ok(text) => Some(text),
            Err(EmitError::Classification(e)) if options.keep_going => {
                warn!(error = %e, "skipping C API header");
                if !report.failures.contains(&e) {
                    report.failures.push(e);
                }
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };

    if let (Some(path), Some(text)) = (&options.capi_header, &capi_text) {
        report.files_changed += capi_header::write_capi_header(writer, path, text)?;
    }

    let ctypes = CTypes::new(&options.emit.naming, &model);
    for crossings in &classified {
        report.files_changed += write_class(options, writer, ctypes, crossings)?;
    }

    info!(
        files = report.files_changed,
        classes = classified.len(),
        skipped = report.failures.len(),
        "generation finished"
    );
    Ok(report)
}

fn write_class(
    options: &GenerateOptions,
    writer: &IncrementalWriter,
    ctypes: CTypes<'_>,
    crossings: &ClassCrossings<'_>,
) -> Result<usize> {
    let stem = ctypes.naming.file_stem(crossings.class);
    let outputs = options.outputs;
    let mut changed = 0;

    if let Some(dir) = &options.cpptoc_dir {
        let emitter = ForwardEmitter::new(ctypes, &options.emit, crossings);
        if outputs.cpptoc_header {
            changed += write_one(writer, &dir.join(format!("{stem}_cpptoc.h")), &emitter.render_header())?;
        }
        if outputs.cpptoc_impl {
            changed += write_one(writer, &dir.join(format!("{stem}_cpptoc.cc")), &emitter.render_impl())?;
        }
    }

    if let Some(dir) = &options.ctocpp_dir {
        let emitter = ReverseEmitter::new(ctypes, &options.emit, crossings);
        if outputs.ctocpp_header {
            changed += write_one(writer, &dir.join(format!("{stem}_ctocpp.h")), &emitter.render_header())?;
        }
        if outputs.ctocpp_impl {
            changed += write_one(writer, &dir.join(format!("{stem}_ctocpp.cc")), &emitter.render_impl())?;
        }
    }

    debug!(class = %crossings.class.name, changed, "class written");
    Ok(changed)
}

fn write_one(writer: &IncrementalWriter, path: &Path, text: &str) -> Result<usize> {
    Ok(usize::from(writer.write(path, text)?))
}
