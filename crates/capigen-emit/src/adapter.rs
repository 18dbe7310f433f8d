//! Pieces shared by the forward and reverse adapter emitters.

use std::collections::BTreeSet;

use capigen_core::{ClassCrossings, ClassDef, CrossingStrategy, MethodCrossings};

use crate::config::EmitConfig;
use crate::ctype::CTypes;
use crate::source::SourceWriter;

/// Notice written below the banner of every adapter file.
pub const ADAPTER_NOTICE: &[&str] = &[
    "This file was generated by the capigen translator tool. Do not edit it by",
    "hand; change the native header and regenerate instead.",
];

/// How one parameter crosses inside a method body.
#[derive(Debug, Default)]
pub struct Translation {
    /// Conditions under which the call is abandoned.
    pub verify: Vec<String>,
    /// Statements before the call.
    pub pre: Vec<String>,
    /// Arguments for the call, in order.
    pub args: Vec<String>,
    /// Statements after the call.
    pub post: Vec<String>,
    /// Native argument standing in for an absorbed count parameter.
    pub count_arg: Option<(String, String)>,
}

/// Every class referenced through an interface crossing, sorted.
pub fn referenced_classes<'c>(crossings: &'c ClassCrossings<'_>) -> BTreeSet<&'c str> {
    let mut found = BTreeSet::new();
    for m in &crossings.methods {
        let strategies = m.params.iter().map(|p| &p.crossing).chain(m.ret.iter());
        for s in strategies {
            match s {
                CrossingStrategy::Interface { class }
                | CrossingStrategy::InterfaceArray { class, .. } => {
                    found.insert(class.as_str());
                }
                _ => {}
            }
        }
    }
    found
}

/// Include lines for the adapters of every referenced class, except `own`.
pub fn adapter_includes(ctypes: &CTypes<'_>, config: &EmitConfig, crossings: &ClassCrossings<'_>, own: &str) -> Vec<String> {
    let mut includes = BTreeSet::new();
    for class in referenced_classes(crossings) {
        let Some(def) = ctypes.model.class(class) else {
            continue;
        };
        let stem = ctypes.naming.file_stem(def);
        includes.insert(config.includes.cpptoc_header(&stem));
        includes.insert(config.includes.ctocpp_header(&stem));
    }
    includes.remove(own);
    includes
        .into_iter()
        .map(|path| format!("#include \"{path}\""))
        .collect()
}

/// Base template name of an adapter, e.g. `CefCppToC` or `CefCToCppScoped`.
pub fn base_template(ctypes: &CTypes<'_>, class: &ClassDef, kind: &str) -> String {
    let scoped = if class.ref_counted { "" } else { "Scoped" };
    format!("{}{kind}{scoped}", ctypes.naming.cpp_prefix)
}

/// `Base<Adapter, Class, cef_class_t>`.
pub fn base_specialization(ctypes: &CTypes<'_>, class: &ClassDef, kind: &str, adapter: &str) -> String {
    format!(
        "{}<{adapter}, {}, {}>",
        base_template(ctypes, class, kind),
        class.name,
        ctypes.naming.class_struct(class)
    )
}

/// Per-template live object counter, defined once per adapter.
pub fn debug_counter(w: &mut SourceWriter, specialization: &str) {
    w.line("#ifndef NDEBUG");
    w.line(format!("template<> long {specialization}::DebugObjCt = 0;"));
    w.line("#endif");
}

/// `return;` or `return <value>;`.
pub fn early_return(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("return {v};"),
        None => "return;".to_string(),
    }
}

/// Emit the verification checks that abandon a call.
pub fn verify(w: &mut SourceWriter, conditions: &[String], on_fail: &str) {
    for cond in conditions {
        w.line(format!("if ({cond})"));
        w.line(format!("  {on_fail}"));
    }
}

/// Group methods by declaring class, preserving order.
pub fn by_owner<'a, 'm>(methods: impl Iterator<Item = &'a MethodCrossings<'m>>) -> Vec<(&'m str, Vec<&'a MethodCrossings<'m>>)>
where
    'm: 'a,
{
    let mut groups: Vec<(&'m str, Vec<&'a MethodCrossings<'m>>)> = Vec::new();
    for m in methods {
        match groups.last_mut() {
            Some((owner, list)) if *owner == m.owner.name => list.push(m),
            _ => groups.push((m.owner.name.as_str(), vec![m])),
        }
    }
    groups
}

/// Native arguments in declaration order, splicing in absorbed counts.
pub fn native_args(m: &MethodCrossings<'_>, translations: &[Translation]) -> Vec<String> {
    let mut args = Vec::with_capacity(m.method.params.len());
    for param in &m.method.params {
        let spliced = translations
            .iter()
            .filter_map(|t| t.count_arg.as_ref())
            .find(|(name, _)| *name == param.name);
        if let Some((_, expr)) = spliced {
            args.push(expr.clone());
            continue;
        }
        let own = m
            .params
            .iter()
            .position(|pc| pc.param.name == param.name)
            .and_then(|i| translations.get(i))
            .and_then(|t| t.args.first());
        if let Some(expr) = own {
            args.push(expr.clone());
        }
    }
    args
}

/// Loop over `count` elements with index `i`.
pub fn for_each(count: &str, body: &[String]) -> String {
    let mut text = format!("for (size_t i = 0; i < {count}; ++i) {{");
    for line in body {
        for l in line.split('\n') {
            text.push_str("\n  ");
            text.push_str(l);
        }
    }
    text.push_str("\n}");
    text
}

/// `if (cond) { body }`.
pub fn if_block(cond: &str, body: &[String]) -> String {
    let mut text = format!("if ({cond}) {{");
    for line in body {
        for l in line.split('\n') {
            text.push_str("\n  ");
            text.push_str(l);
        }
    }
    text.push_str("\n}");
    text
}
