//! C-ABI Header Emitter.
//!
//! One header with the fixed prelude, every enum and plain struct, and one
//! function-pointer struct per class. Classes are ordered parents first,
//! then by name; fields follow method declaration order.

use std::collections::BTreeMap;
use std::path::Path;

use capigen_core::model::{EnumDef, StructDef};
use capigen_core::{
    ArrayLength, ClassCrossings, Classifier, ClassifyPolicy, HeaderModel, Primitive, TypeRef,
};
use tracing::debug;

use crate::config::{include_guard, EmitConfig};
use crate::ctype::CTypes;
use crate::error::{EmitError, Result};
use crate::source::{banner, SourceWriter};
use crate::writer::IncrementalWriter;

const NOTICE: &[&str] = &[
    "This file was generated by the capigen translator tool and should not be",
    "edited by hand.",
];

/// Render the C-ABI header, classifying every class under `policy`.
pub fn render(model: &HeaderModel, config: &EmitConfig, policy: &ClassifyPolicy) -> Result<String> {
    let classifier = Classifier::new(model, policy.clone());
    let mut classes = Vec::with_capacity(model.classes().len());
    for class in model.classes_in_dependency_order() {
        classes.push(classifier.classify_class(class).map_err(EmitError::from)?);
    }
    Ok(render_classified(model, config, &classes))
}

/// Render from classes already classified, given in dependency order.
pub fn render_classified(model: &HeaderModel, config: &EmitConfig, classes: &[ClassCrossings<'_>]) -> String {
    let ctypes = CTypes::new(&config.naming, model);
    let guard = include_guard(&config.naming.c_prefix, &config.includes.capi_header);
    let mut w = SourceWriter::new();
    banner(&mut w, &config.banner, NOTICE);

    w.line(format!("#ifndef {guard}"));
    w.line(format!("#define {guard}"));
    w.line("#pragma once");
    w.blank();
    w.line("#include <stddef.h>");
    w.line("#include <wchar.h>");
    w.blank();
    w.line("#ifdef __cplusplus");
    w.line("extern \"C\" {");
    w.line("#endif");
    w.blank();

    prelude(&mut w, &ctypes);

    let mut enums: Vec<&EnumDef> = model.enums().iter().collect();
    enums.sort_by(|a, b| a.name.cmp(&b.name));
    for def in enums {
        enumeration(&mut w, &ctypes, def);
    }

    for def in structs_in_dependency_order(model) {
        structure(&mut w, &ctypes, def);
    }

    if !classes.is_empty() {
        let mut names: Vec<String> = classes.iter().map(|c| ctypes.class_struct(&c.class.name)).collect();
        names.sort();
        names.dedup();
        for name in names {
            w.line(format!("struct _{name};"));
        }
        w.blank();
    }

    for crossings in classes {
        class_struct(&mut w, &ctypes, crossings);
    }

    w.line("#ifdef __cplusplus");
    w.line("}");
    w.line("#endif");
    w.blank();
    w.line(format!("#endif  // {guard}"));
    debug!(classes = classes.len(), "rendered C API header");
    w.finish()
}

/// Write the header through `writer`; 1 when the file changed, else 0.
pub fn write_capi_header(writer: &IncrementalWriter, path: &Path, text: &str) -> Result<usize> {
    Ok(usize::from(writer.write(path, text)?))
}

fn prelude(w: &mut SourceWriter, c: &CTypes<'_>) {
    let export = c.mac("EXPORT");
    let callback = c.mac("CALLBACK");
    let char_t = c.abi("char_t");
    let string_t = c.abi("string_t");
    let base = c.abi("base_t");
    let scoped = c.abi("base_scoped_t");

    w.line("#if defined(_WIN32)");
    w.line(format!("#define {export} __declspec(dllexport)"));
    w.line(format!("#define {callback} __stdcall"));
    w.line("#else");
    w.line(format!("#define {export} __attribute__((visibility(\"default\")))"));
    w.line(format!("#define {callback}"));
    w.line("#endif");
    w.blank();

    w.line(format!("typedef wchar_t {char_t};"));
    w.line(format!("typedef {char_t}* {string_t};"));
    w.blank();
    w.comment(&["Copy |src| into a new string. NULL yields NULL."]);
    w.line(format!("{export} {string_t} {}(const {char_t}* src);", c.abi("string_alloc")));
    w.comment(&["Free a string from the allocator above. NULL is ignored."]);
    w.line(format!("{export} void {}({string_t} str);", c.abi("string_free")));
    w.comment(&["Buffers crossing the boundary (arrays) use these."]);
    w.line(format!("{export} void* {}(size_t size);", c.abi("mem_alloc")));
    w.line(format!("{export} void {}(void* ptr);", c.abi("mem_free")));
    w.blank();

    w.doc(&["Header of every reference-counted structure."]);
    w.open(format!("typedef struct _{base}"));
    w.line("size_t size;");
    w.line(format!("int ({callback} *add_ref)(struct _{base}* self);"));
    w.line(format!("int ({callback} *release)(struct _{base}* self);"));
    w.line(format!("int ({callback} *get_refct)(struct _{base}* self);"));
    w.close(&format!(" {base};"));
    w.blank();

    w.doc(&["Header of every structure owned by exactly one side."]);
    w.open(format!("typedef struct _{scoped}"));
    w.line("size_t size;");
    w.line(format!("void ({callback} *del)(struct _{scoped}* self);"));
    w.close(&format!(" {scoped};"));
    w.blank();

    w.line(format!(
        "#define {}(s) (({base}*)(s))->add_ref(({base}*)(s))",
        c.mac("ADD_REF")
    ));
    w.line(format!(
        "#define {}(s) (({base}*)(s))->release(({base}*)(s))",
        c.mac("RELEASE")
    ));
    w.line(format!("#define {}(s, f) (!(s) || !(s)->f)", c.mac("MEMBER_MISSING")));
    w.blank();
}

fn enumeration(w: &mut SourceWriter, c: &CTypes<'_>, def: &EnumDef) {
    let prefix = c.naming.enumerator_prefix(&def.name);
    let rename: BTreeMap<&str, String> = def
        .values
        .iter()
        .map(|v| (v.name.as_str(), enumerator(&prefix, &v.name)))
        .collect();

    w.doc(&def.doc);
    w.open("typedef enum");
    for value in &def.values {
        w.doc(&value.doc);
        let name = &rename[value.name.as_str()];
        match &value.value {
            Some(init) => w.line(format!("{name} = {},", rename_identifiers(init, &rename))),
            None => w.line(format!("{name},")),
        }
    }
    w.close(&format!(" {};", c.naming.c_type_name(&def.name)));
    w.blank();
}

/// Prefixed C enumerator, without doubling a prefix already present.
fn enumerator(prefix: &str, value: &str) -> String {
    let upper = value.to_ascii_uppercase();
    if upper.starts_with(prefix) {
        upper
    } else {
        format!("{prefix}{upper}")
    }
}

/// Replace whole identifiers found in `rename` (initializers naming siblings).
fn rename_identifiers(expr: &str, rename: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut word = String::new();
    let flush = |word: &mut String, out: &mut String| {
        if !word.is_empty() {
            match rename.get(word.as_str()) {
                Some(r) => out.push_str(r),
                None => out.push_str(word),
            }
            word.clear();
        }
    };
    for ch in expr.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            word.push(ch);
        } else {
            flush(&mut word, &mut out);
            out.push(ch);
        }
    }
    flush(&mut word, &mut out);
    out
}

fn structs_in_dependency_order(model: &HeaderModel) -> Vec<&StructDef> {
    fn depth(model: &HeaderModel, def: &StructDef, seen: &mut Vec<String>) -> usize {
        if seen.contains(&def.name) {
            return 0;
        }
        seen.push(def.name.clone());
        let mut deepest = 0;
        for field in &def.fields {
            let inner = match &field.ty {
                TypeRef::Struct(n) => Some(n),
                TypeRef::Array { element, .. } => match &**element {
                    TypeRef::Struct(n) => Some(n),
                    _ => None,
                },
                _ => None,
            };
            if let Some(inner) = inner.and_then(|n| model.struct_def(n)) {
                deepest = deepest.max(1 + depth(model, inner, seen));
            }
        }
        seen.pop();
        deepest
    }

    let mut ordered: Vec<(usize, &StructDef)> = model
        .structs()
        .iter()
        .map(|s| (depth(model, s, &mut Vec::new()), s))
        .collect();
    ordered.sort_by(|a, b| (a.0, &a.1.name).cmp(&(b.0, &b.1.name)));
    ordered.into_iter().map(|(_, s)| s).collect()
}

fn field_type(c: &CTypes<'_>, ty: &TypeRef) -> String {
    match ty {
        TypeRef::Primitive(p) => p.c_name().to_string(),
        TypeRef::Enum(n) | TypeRef::Struct(n) => c.naming.c_type_name(n),
        TypeRef::Array { element, .. } => field_type(c, element),
        _ => Primitive::VoidPtr.c_name().to_string(),
    }
}

fn structure(w: &mut SourceWriter, c: &CTypes<'_>, def: &StructDef) {
    let name = c.naming.c_type_name(&def.name);
    w.doc(&def.doc);
    w.open(format!("typedef struct _{name}"));
    for field in &def.fields {
        w.doc(&field.doc);
        let ty = field_type(c, &field.ty);
        match &field.ty {
            TypeRef::Array {
                length: ArrayLength::Fixed(n),
                ..
            } => w.line(format!("{ty} {}[{n}];", field.name)),
            _ => w.line(format!("{ty} {};", field.name)),
        }
    }
    w.close(&format!(" {name};"));
    w.blank();
}

fn class_struct(w: &mut SourceWriter, c: &CTypes<'_>, crossings: &ClassCrossings<'_>) {
    let class = crossings.class;
    let name = c.naming.class_struct(class);
    let callback = c.mac("CALLBACK");

    w.doc(&class.doc);
    w.open(format!("typedef struct _{name}"));
    let base = match class.base.as_deref().and_then(|b| c.model.class(b)) {
        Some(parent) => c.naming.class_struct(parent),
        None if class.ref_counted => c.abi("base_t"),
        None => c.abi("base_scoped_t"),
    };
    w.doc(&["Base structure."]);
    w.line(format!("{base} base;"));

    for m in crossings.methods.iter().filter(|m| !m.is_inherited(class) && !m.method.is_static) {
        w.blank();
        w.doc(&m.method.doc);
        let mut params = vec![format!("struct _{name}* self")];
        params.extend(m.params.iter().flat_map(|pc| c.c_params(pc)));
        let field = c.naming.method_field(m.method);
        w.signature(
            &format!("{} ({callback} *{field})", c.c_return(m.ret.as_ref())),
            &params,
            ";",
        );
    }
    w.close(&format!(" {name};"));
    w.blank();

    for m in crossings.static_methods() {
        w.doc(&m.method.doc);
        let params: Vec<String> = m.params.iter().flat_map(|pc| c.c_params(pc)).collect();
        let function = c.naming.creation_function(class, m.method);
        let params = if params.is_empty() { vec!["void".to_string()] } else { params };
        w.signature(
            &format!("{} {} {function}", c.mac("EXPORT"), c.c_return(m.ret.as_ref())),
            &params,
            ";",
        );
        w.blank();
    }
}
