//! Reverse-Adapter Emitter ("CToCpp").
//!
//! A reverse adapter is a C structure whose function pointers are thunks
//! into a held native object. Borrowed interface returns are parked in the
//! adapter so the pointer handed to C outlives the thunk.

use capigen_core::{
    ArrayLength, ClassCrossings, CrossingStrategy, Direction, MethodCrossings, Ownership,
    ParamCrossing, Passing, Primitive,
};
use tracing::debug;

use crate::adapter::{self, Translation};
use crate::config::{include_guard, EmitConfig};
use crate::ctype::{CTypes, Elem};
use crate::source::{banner, SourceWriter};

/// Emitter for one class's reverse adapter.
pub struct ReverseEmitter<'a, 'm> {
    ctypes: CTypes<'a>,
    config: &'a EmitConfig,
    crossings: &'a ClassCrossings<'m>,
}

impl<'a, 'm> ReverseEmitter<'a, 'm> {
    pub fn new(ctypes: CTypes<'a>, config: &'a EmitConfig, crossings: &'a ClassCrossings<'m>) -> Self {
        ReverseEmitter {
            ctypes,
            config,
            crossings,
        }
    }

    fn adapter(&self) -> String {
        self.ctypes.naming.reverse_class(self.crossings.class)
    }

    fn stem(&self) -> String {
        self.ctypes.naming.file_stem(self.crossings.class)
    }

    fn header_path(&self) -> String {
        self.config.includes.ctocpp_header(&self.stem())
    }

    fn specialization(&self) -> String {
        adapter::base_specialization(&self.ctypes, self.crossings.class, "CToCpp", &self.adapter())
    }

    /// Instance methods whose borrowed interface result is parked in the adapter.
    fn parked(&self) -> Vec<&MethodCrossings<'m>> {
        self.crossings
            .instance_methods()
            .filter(|m| is_parked(&self.ctypes, m))
            .collect()
    }

    /// `<stem>_ctocpp.h`.
    pub fn render_header(&self) -> String {
        let class = self.crossings.class;
        let naming = self.ctypes.naming;
        let guard = include_guard(&naming.c_prefix, &self.header_path());
        let mut w = SourceWriter::new();
        banner(&mut w, &self.config.banner, adapter::ADAPTER_NOTICE);

        w.line(format!("#ifndef {guard}"));
        w.line(format!("#define {guard}"));
        w.line("#pragma once");
        w.blank();
        w.line(format!("#include \"{}\"", self.config.includes.native_header));
        w.line(format!("#include \"{}\"", self.config.includes.capi_header));
        w.line(format!("#include \"{}\"", self.config.includes.ctocpp_base));
        w.blank();

        w.comment(&[format!(
            "C structure whose functions call into a native {} object.",
            class.name
        )]);
        w.line(format!("class {}", self.adapter()));
        w.line(format!("    : public {} {{", self.specialization()));
        w.line(" public:");
        w.indent();
        w.line(format!("explicit {}({}* cls);", self.adapter(), class.name));

        let parked = self.parked();
        if parked.is_empty() {
            w.line(format!("virtual ~{}() {{}}", self.adapter()));
        } else {
            w.line(format!("virtual ~{}();", self.adapter()));
            w.blank();
            w.comment(&["Borrowed results, valid until the next call or destruction."]);
            for m in parked {
                if let Some(CrossingStrategy::Interface { class }) = &m.ret {
                    w.line(format!("{} {};", self.ctypes.class_ptr(class), parked_member(&self.ctypes, m)));
                }
            }
        }
        w.dedent();
        w.line("};");
        w.blank();
        w.line(format!("#endif  // {guard}"));
        w.finish()
    }

    /// `<stem>_ctocpp.cc`.
    pub fn render_impl(&self) -> String {
        let class = self.crossings.class;
        let mut w = SourceWriter::new();
        banner(&mut w, &self.config.banner, adapter::ADAPTER_NOTICE);

        let own = self.header_path();
        w.line(format!("#include \"{own}\""));
        w.lines(adapter::adapter_includes(&self.ctypes, self.config, self.crossings, &own));
        w.blank();

        let statics: Vec<_> = self.crossings.static_methods().collect();
        if !statics.is_empty() {
            w.comment(&["GLOBAL FUNCTIONS"]);
            w.blank();
            for m in statics {
                self.creation_function(&mut w, m);
                w.blank();
            }
        }

        w.line("namespace {");
        w.blank();
        w.comment(&["MEMBER FUNCTIONS"]);
        w.blank();
        for m in self.crossings.instance_methods() {
            self.thunk(&mut w, m);
            w.blank();
        }
        w.line("}  // namespace");
        w.blank();

        self.constructor(&mut w);
        debug!(class = %class.name, "rendered reverse adapter");
        w.finish()
    }

    fn thunk_name(&self, m: &MethodCrossings<'_>) -> String {
        format!("{}_{}", self.stem(), self.ctypes.naming.method_field(m.method))
    }

    fn constructor(&self, w: &mut SourceWriter) {
        let class = self.crossings.class;
        let naming = self.ctypes.naming;
        let parked = self.parked();

        w.comment(&["CONSTRUCTOR"]);
        w.blank();
        w.line(format!("{}::{}({}* cls)", self.adapter(), self.adapter(), class.name));
        if parked.is_empty() {
            w.line(format!("    : {}(cls) {{", self.specialization()));
        } else {
            w.line(format!("    : {}(cls),", self.specialization()));
            let last = parked.len() - 1;
            for (i, m) in parked.iter().enumerate() {
                let sep = if i == last { " {" } else { "," };
                w.line(format!("      {}(NULL){sep}", parked_member(&self.ctypes, m)));
            }
        }
        w.indent();
        for m in self.crossings.instance_methods() {
            let field = naming.method_field(m.method);
            let target = if m.is_inherited(class) {
                format!("reinterpret_cast<{}*>(GetStruct())", naming.class_struct(m.owner))
            } else {
                "GetStruct()".to_string()
            };
            w.line(format!("{target}->{field} = {};", self.thunk_name(m)));
        }
        w.close("");

        if !parked.is_empty() {
            w.blank();
            w.open(format!("{}::~{}()", self.adapter(), self.adapter()));
            for m in &parked {
                let member = parked_member(&self.ctypes, m);
                w.line(format!("if ({member})"));
                w.line(format!("  {}({member});", self.ctypes.mac("RELEASE")));
            }
            w.close("");
        }
        w.blank();
        adapter::debug_counter(w, &self.specialization());
    }

    fn thunk(&self, w: &mut SourceWriter, m: &MethodCrossings<'_>) {
        let class = self.crossings.class;
        let naming = self.ctypes.naming;
        let mut params = vec![format!("{} self", self.ctypes.class_ptr(&m.owner.name))];
        params.extend(m.params.iter().flat_map(|pc| self.ctypes.c_params(pc)));
        let ret_c = self.ctypes.c_return(m.ret.as_ref());
        w.signature(
            &format!("{ret_c} {} {}", self.ctypes.mac("CALLBACK"), self.thunk_name(m)),
            &params,
            " {",
        );
        w.indent();

        let self_expr = if m.is_inherited(class) {
            let own = naming.class_struct(class);
            w.line(format!("{own}* _self = reinterpret_cast<{own}*>(self);"));
            "_self"
        } else {
            "self"
        };

        let empty = self.empty_result(m);
        let on_fail = adapter::early_return(empty.as_deref());
        w.comment(&["Verify param: self"]);
        adapter::verify(w, &["!self".to_string()], &on_fail);
        w.blank();

        let callee = format!("{}::Get({self_expr})->{}", self.adapter(), m.method.name);
        self.body(w, m, &callee, &on_fail, Some(self_expr));
        w.close("");
    }

    fn creation_function(&self, w: &mut SourceWriter, m: &MethodCrossings<'_>) {
        let class = self.crossings.class;
        let params: Vec<String> = m.params.iter().flat_map(|pc| self.ctypes.c_params(pc)).collect();
        let ret_c = self.ctypes.c_return(m.ret.as_ref());
        let name = self.ctypes.naming.creation_function(class, m.method);
        w.signature(&format!("{} {ret_c} {name}", self.ctypes.mac("EXPORT")), &params, " {");
        w.indent();
        let empty = self.empty_result(m);
        let on_fail = adapter::early_return(empty.as_deref());
        let callee = format!("{}::{}", class.name, m.method.name);
        self.body(w, m, &callee, &on_fail, None);
        w.close("");
    }

    fn body(
        &self,
        w: &mut SourceWriter,
        m: &MethodCrossings<'_>,
        callee: &str,
        on_fail: &str,
        self_expr: Option<&str>,
    ) {
        let translations: Vec<Translation> = m.params.iter().map(|pc| self.translate(pc)).collect();

        let checks: Vec<String> = translations.iter().flat_map(|t| t.verify.iter().cloned()).collect();
        if !checks.is_empty() {
            w.comment(&["Verify param"]);
            adapter::verify(w, &checks, on_fail);
            w.blank();
        }

        let pre: Vec<&String> = translations.iter().flat_map(|t| t.pre.iter()).collect();
        if !pre.is_empty() {
            w.comment(&["Translate param"]);
            w.lines(pre);
            w.blank();
        }

        let args = adapter::native_args(m, &translations);
        w.comment(&["Execute"]);
        if m.ret.is_some() {
            w.signature(&format!("{} _retval = {callee}", m.method.ret_spelling), &args, ";");
        } else {
            w.signature(callee, &args, ";");
        }

        let post: Vec<&String> = translations.iter().flat_map(|t| t.post.iter()).collect();
        if !post.is_empty() {
            w.blank();
            w.comment(&["Restore param"]);
            w.lines(post);
        }

        if let Some(ret) = &m.ret {
            w.blank();
            w.comment(&["Return type"]);
            w.line(self.convert_return(m, ret, self_expr));
        }
    }

    fn empty_result(&self, m: &MethodCrossings<'_>) -> Option<String> {
        let ret = m.ret.as_ref()?;
        let fallback = self.ctypes.c_empty(ret);
        Some(match (ret, &m.method.default_retval) {
            (CrossingStrategy::Primitive { .. }, Some(value)) => value.clone(),
            _ => fallback,
        })
    }

    fn convert_return(&self, m: &MethodCrossings<'_>, ret: &CrossingStrategy, self_expr: Option<&str>) -> String {
        let ctypes = &self.ctypes;
        match ret {
            CrossingStrategy::Primitive { .. } | CrossingStrategy::Struct { .. } => "return _retval;".to_string(),
            CrossingStrategy::Enum { name } => {
                format!("return static_cast<{}>(_retval);", ctypes.naming.c_type_name(name))
            }
            CrossingStrategy::String => {
                format!("return {}(_retval.c_str());", ctypes.abi("string_alloc"))
            }
            CrossingStrategy::Interface { class } if !ctypes.is_ref_counted(class) => {
                format!("return {}::WrapRaw(_retval);", ctypes.reverse_class(class))
            }
            CrossingStrategy::Interface { class } => {
                let wrap = format!("{}::Wrap(_retval)", ctypes.reverse_class(class));
                match self_expr {
                    Some(owner) if is_parked(ctypes, m) => {
                        let member = format!("_wrapper->{}", parked_member(ctypes, m));
                        [
                            format!("{} _retvalStruct = {wrap};", ctypes.class_ptr(class)),
                            format!("{}* _wrapper = {}::GetWrapper({owner});", self.adapter(), self.adapter()),
                            format!("if ({member})"),
                            format!("  {}({member});", ctypes.mac("RELEASE")),
                            format!("{member} = _retvalStruct;"),
                            "return _retvalStruct;".to_string(),
                        ]
                        .join("\n")
                    }
                    _ => format!("return {wrap};"),
                }
            }
            CrossingStrategy::Array { .. } | CrossingStrategy::InterfaceArray { .. } => {
                "return _retval;".to_string()
            }
        }
    }

    /// C argument(s) to a native argument.
    fn translate(&self, pc: &ParamCrossing<'_>) -> Translation {
        let ctypes = &self.ctypes;
        let param = pc.param;
        let n = param.name.as_str();
        let dir = param.direction;
        let mut t = Translation::default();

        match &pc.crossing {
            CrossingStrategy::Primitive { primitive } => match (dir, primitive) {
                (Direction::In, Primitive::Bool) => t.args.push(format!("{n} ? true : false")),
                (Direction::In, _) => t.args.push(n.to_string()),
                (_, Primitive::Bool) => {
                    let init = if dir == Direction::Out {
                        "false".to_string()
                    } else {
                        format!("*{n} ? true : false")
                    };
                    t.verify.push(format!("!{n}"));
                    t.pre.push(format!("bool {n}Bool = {init};"));
                    t.args.push(format!("{n}Bool"));
                    t.post.push(format!("*{n} = {n}Bool ? true : false;"));
                }
                _ => {
                    t.verify.push(format!("!{n}"));
                    t.args.push(format!("*{n}"));
                }
            },
            CrossingStrategy::Enum { name } => {
                if dir == Direction::In {
                    t.args.push(format!("static_cast<{name}>({n})"));
                } else {
                    let init = if dir == Direction::Out {
                        format!("{name}()")
                    } else {
                        format!("static_cast<{name}>(*{n})")
                    };
                    t.verify.push(format!("!{n}"));
                    t.pre.push(format!("{name} {n}Val = {init};"));
                    t.args.push(format!("{n}Val"));
                    t.post.push(format!(
                        "*{n} = static_cast<{}>({n}Val);",
                        ctypes.naming.c_type_name(name)
                    ));
                }
            }
            CrossingStrategy::Struct { name } => match (param.passing, dir) {
                (Passing::Value, _) => t.args.push(format!("{name}({n})")),
                (Passing::Pointer, Direction::In) => t.args.push(format!("static_cast<const {name}*>({n})")),
                (Passing::Pointer, _) => t.args.push(format!("static_cast<{name}*>({n})")),
                (Passing::Reference, dir) => {
                    t.verify.push(format!("!{n}"));
                    t.pre.push(format!("{name} {n}Val = {name}(*{n});"));
                    t.args.push(format!("{n}Val"));
                    if dir != Direction::In {
                        t.post.push(format!("*{n} = {n}Val;"));
                    }
                }
            },
            CrossingStrategy::String => self.string(&mut t, pc),
            CrossingStrategy::Interface { class } => self.interface(&mut t, pc, class),
            CrossingStrategy::Array { .. } | CrossingStrategy::InterfaceArray { .. } => {
                if let Some((elem, length)) = Elem::of(&pc.crossing) {
                    self.array(&mut t, pc, elem, length);
                }
            }
        }
        t
    }

    fn string(&self, t: &mut Translation, pc: &ParamCrossing<'_>) {
        let ctypes = &self.ctypes;
        let n = pc.param.name.as_str();
        let s = &ctypes.naming.string_type;
        match pc.param.direction {
            Direction::In => {
                if !pc.param.optional {
                    t.verify.push(format!("!{n}"));
                }
                t.pre.push(format!("{s} {n}Str = {n} ? {s}({n}) : {s}();"));
                t.args.push(format!("{n}Str"));
            }
            dir => {
                t.verify.push(format!("!{n}"));
                if dir == Direction::Out {
                    t.pre.push(format!("{s} {n}Str;"));
                } else {
                    // The incoming string belongs to the callee.
                    t.pre.push(format!("{s} {n}Str = *{n} ? {s}(*{n}) : {s}();"));
                    t.pre.push(format!("{}(*{n});", ctypes.abi("string_free")));
                }
                t.args.push(format!("{n}Str"));
                t.post.push(format!("*{n} = {}({n}Str.c_str());", ctypes.abi("string_alloc")));
            }
        }
    }

    fn interface(&self, t: &mut Translation, pc: &ParamCrossing<'_>, class: &str) {
        let ctypes = &self.ctypes;
        let param = pc.param;
        let n = param.name.as_str();
        let forward = ctypes.forward_class(class);

        if !ctypes.is_ref_counted(class) {
            if !param.optional {
                t.verify.push(format!("!{n}"));
            }
            t.pre.push(format!("{class}* {n}Ptr = {forward}::WrapRaw({n});"));
            t.args.push(format!("{n}Ptr"));
            t.post.push(format!("{forward}::ReleaseRaw({n}Ptr);"));
            return;
        }

        let ref_ptr = ctypes.ref_ptr(class);
        match param.direction {
            Direction::In => {
                if !param.optional {
                    t.verify.push(format!("!{n}"));
                }
                if param.ownership == Ownership::Borrowed {
                    // Wrap takes over a reference; the caller keeps its own.
                    t.pre.push(format!("if ({n})\n  {}({n});", ctypes.mac("ADD_REF")));
                }
                t.pre.push(format!("{ref_ptr} {n}Ptr = {forward}::Wrap({n});"));
                let arg = match param.passing {
                    Passing::Pointer if param.count_param.is_some() => format!("&{n}Ptr"),
                    Passing::Pointer => format!("{n}Ptr.get()"),
                    _ => format!("{n}Ptr"),
                };
                t.args.push(arg);
            }
            dir => {
                t.verify.push(format!("!{n}"));
                let init = if dir == Direction::Out {
                    format!("{ref_ptr} {n}Ptr;")
                } else {
                    format!("{ref_ptr} {n}Ptr = {forward}::Wrap(*{n});")
                };
                t.pre.push(init);
                t.args.push(format!("{n}Ptr"));
                t.post.push(format!("*{n} = {}::Wrap({n}Ptr);", ctypes.reverse_class(class)));
            }
        }
    }

    fn array(&self, t: &mut Translation, pc: &ParamCrossing<'_>, elem: Elem<'_>, length: &ArrayLength) {
        let ctypes = &self.ctypes;
        let n = pc.param.name.as_str();
        let dir = pc.param.direction;
        let e = ctypes.elem_c(elem);
        let native = ctypes.elem_native(elem);
        let list = format!("{n}List");
        let add_ref = matches!(elem, Elem::Interface(_)) && pc.param.ownership == Ownership::Borrowed;

        // Per-element statements turning `source` into a native element.
        let take = |source: &str| -> Vec<String> {
            let mut body = Vec::new();
            if add_ref {
                body.push(format!("if ({source})\n  {}({source});", ctypes.mac("ADD_REF")));
            }
            body.push(format!("{list}.push_back({});", ctypes.elem_to_native(elem, source)));
            body
        };

        match length {
            ArrayLength::Fixed(len) => {
                t.verify.push(format!("!{n}"));
                t.pre.push(format!("{native} {list}[{len}];"));
                t.pre.push(adapter::for_each(
                    &len.to_string(),
                    &[format!("{list}[i] = {};", ctypes.elem_to_native(elem, &format!("{n}[i]")))],
                ));
                t.args.push(list.clone());
                if dir != Direction::In {
                    t.post.push(adapter::for_each(
                        &len.to_string(),
                        &[format!("{n}[i] = {};", ctypes.elem_to_c(elem, &format!("{list}[i]")))],
                    ));
                }
            }
            ArrayLength::Counted(count) => {
                t.verify.push(format!("{count} > 0 && !{n}"));
                t.pre.push(format!("std::vector<{native} > {list};"));
                t.pre.push(adapter::if_block(
                    &format!("{count} > 0"),
                    &[adapter::for_each(&format!("static_cast<size_t>({count})"), &take(&format!("{n}[i]")))],
                ));
                t.args.push(format!("{list}.empty() ? NULL : &{list}[0]"));
                t.count_arg = Some((
                    count.clone(),
                    format!("static_cast<{}>({list}.size())", ctypes.count_native_type(pc)),
                ));
            }
            ArrayLength::Dynamic if dir == Direction::In => {
                let size = format!("{n}Count");
                t.verify.push(format!("{size} > 0 && !{n}"));
                t.pre.push(format!("std::vector<{native} > {list};"));
                t.pre.push(adapter::for_each(&size, &take(&format!("{n}[i]"))));
                t.args.push(list.clone());
            }
            ArrayLength::Dynamic => {
                let size = format!("{n}Count");
                t.verify.push(format!("!{size} || !{n}"));
                t.pre.push(format!("std::vector<{native} > {list};"));
                if dir == Direction::InOut {
                    // The incoming buffer and its elements belong to the callee.
                    let mut per_element = vec![format!(
                        "{list}.push_back({});",
                        ctypes.elem_to_native(elem, &format!("(*{n})[i]"))
                    )];
                    if elem == Elem::String {
                        per_element.push(format!("{}((*{n})[i]);", ctypes.abi("string_free")));
                    }
                    t.pre.push(adapter::if_block(
                        &format!("*{n}"),
                        &[
                            adapter::for_each(&format!("*{size}"), &per_element),
                            format!("{}(*{n});", ctypes.abi("mem_free")),
                        ],
                    ));
                }
                t.args.push(list.clone());

                t.post.push(format!("*{size} = {list}.size();"));
                t.post.push(format!("*{n} = NULL;"));
                t.post.push(adapter::if_block(
                    &format!("!{list}.empty()"),
                    &[
                        format!(
                            "*{n} = static_cast<{e}*>({}(sizeof({e}) * {list}.size()));",
                            ctypes.abi("mem_alloc")
                        ),
                        adapter::for_each(
                            &format!("{list}.size()"),
                            &[format!("(*{n})[i] = {};", ctypes.elem_to_c(elem, &format!("{list}[i]")))],
                        ),
                    ],
                ));
            }
        }
    }
}

fn is_parked(ctypes: &CTypes<'_>, m: &MethodCrossings<'_>) -> bool {
    matches!(&m.ret, Some(CrossingStrategy::Interface { class }) if ctypes.is_ref_counted(class))
        && m.method.ret_ownership == Ownership::Borrowed
        && !m.method.is_static
}

fn parked_member(ctypes: &CTypes<'_>, m: &MethodCrossings<'_>) -> String {
    format!("{}_retval_", ctypes.naming.method_field(m.method))
}
