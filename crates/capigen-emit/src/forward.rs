//! Forward-Adapter Emitter ("CppToC").
//!
//! A forward adapter is a native class implementing the virtual interface;
//! each override converts its arguments, calls the held C structure's
//! function pointer and converts the results back.

use capigen_core::{
    ArrayLength, ClassCrossings, CrossingStrategy, Direction, MethodCrossings, Ownership,
    ParamCrossing, Passing, Primitive,
};
use tracing::debug;

use crate::adapter::{self, Translation};
use crate::config::{include_guard, EmitConfig};
use crate::ctype::{native_param, CTypes, Elem};
use crate::source::{banner, SourceWriter};

/// Emitter for one class's forward adapter.
pub struct ForwardEmitter<'a, 'm> {
    ctypes: CTypes<'a>,
    config: &'a EmitConfig,
    crossings: &'a ClassCrossings<'m>,
}

impl<'a, 'm> ForwardEmitter<'a, 'm> {
    pub fn new(ctypes: CTypes<'a>, config: &'a EmitConfig, crossings: &'a ClassCrossings<'m>) -> Self {
        ForwardEmitter {
            ctypes,
            config,
            crossings,
        }
    }

    fn adapter(&self) -> String {
        self.ctypes.naming.forward_class(self.crossings.class)
    }

    fn header_path(&self) -> String {
        let stem = self.ctypes.naming.file_stem(self.crossings.class);
        self.config.includes.cpptoc_header(&stem)
    }

    fn specialization(&self) -> String {
        adapter::base_specialization(&self.ctypes, self.crossings.class, "CppToC", &self.adapter())
    }

    /// `<stem>_cpptoc.h`.
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
        w.line(format!("#include \"{}\"", self.config.includes.cpptoc_base));
        w.blank();

        w.comment(&[format!(
            "Native implementation of {} that forwards every call to a C structure.",
            class.name
        )]);
        w.line(format!("class {}", self.adapter()));
        w.line(format!("    : public {} {{", self.specialization()));
        w.line(" public:");
        w.indent();
        w.line(format!("explicit {}({}* str);", self.adapter(), naming.class_struct(class)));
        w.line(format!("virtual ~{}() {{}}", self.adapter()));

        for (owner, methods) in adapter::by_owner(self.crossings.instance_methods()) {
            w.blank();
            w.comment(&[format!("{owner} methods")]);
            for m in methods {
                let params: Vec<String> = m.method.params.iter().map(native_param).collect();
                let tail = if m.method.is_const { " const OVERRIDE;" } else { " OVERRIDE;" };
                w.signature(&format!("virtual {} {}", m.method.ret_spelling, m.method.name), &params, tail);
            }
        }
        w.dedent();
        w.line("};");
        w.blank();
        w.line(format!("#endif  // {guard}"));
        w.finish()
    }

    /// `<stem>_cpptoc.cc`.
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
            w.comment(&["STATIC METHODS"]);
            w.blank();
            for m in statics {
                self.static_method(&mut w, m);
                w.blank();
            }
        }

        w.comment(&["CONSTRUCTOR"]);
        w.blank();
        w.line(format!(
            "{}::{}({}* str)",
            self.adapter(),
            self.adapter(),
            self.ctypes.naming.class_struct(class)
        ));
        w.line(format!("    : {}(str) {{}}", self.specialization()));
        w.blank();

        w.comment(&["VIRTUAL METHODS"]);
        w.blank();
        for m in self.crossings.instance_methods() {
            self.virtual_method(&mut w, m);
            w.blank();
        }

        adapter::debug_counter(&mut w, &self.specialization());
        debug!(class = %class.name, "rendered forward adapter");
        w.finish()
    }

    fn virtual_method(&self, w: &mut SourceWriter, m: &MethodCrossings<'_>) {
        let class = self.crossings.class;
        let naming = self.ctypes.naming;
        let params: Vec<String> = m.method.params.iter().map(native_param).collect();
        let tail = if m.method.is_const { " const {" } else { " {" };
        w.signature(
            &format!("{} {}::{}", m.method.ret_spelling, self.adapter(), m.method.name),
            &params,
            tail,
        );
        w.indent();

        let field = naming.method_field(m.method);
        let target = if m.is_inherited(class) {
            let owner_struct = naming.class_struct(m.owner);
            w.line(format!(
                "{owner_struct}* _struct = reinterpret_cast<{owner_struct}*>(struct_);"
            ));
            "_struct"
        } else {
            "struct_"
        };

        let empty = self.empty_result(m);
        w.line(format!(
            "if ({}({target}, {field}))",
            self.ctypes.mac("MEMBER_MISSING")
        ));
        w.line(format!("  {}", adapter::early_return(empty.as_deref())));
        w.blank();

        let mut c_args = vec![target.to_string()];
        self.body(w, m, &format!("{target}->{field}"), &mut c_args, empty.as_deref());
        w.close("");
    }

    fn static_method(&self, w: &mut SourceWriter, m: &MethodCrossings<'_>) {
        let class = self.crossings.class;
        let params: Vec<String> = m.method.params.iter().map(native_param).collect();
        w.signature(
            &format!("{} {}::{}", m.method.ret_spelling, class.name, m.method.name),
            &params,
            " {",
        );
        w.indent();
        let empty = self.empty_result(m);
        let function = self.ctypes.naming.creation_function(class, m.method);
        let mut c_args = Vec::new();
        self.body(w, m, &function, &mut c_args, empty.as_deref());
        w.close("");
    }

    fn body(
        &self,
        w: &mut SourceWriter,
        m: &MethodCrossings<'_>,
        callee: &str,
        c_args: &mut Vec<String>,
        empty: Option<&str>,
    ) {
        let translations: Vec<Translation> = m.params.iter().map(|pc| self.translate(pc)).collect();

        let checks: Vec<String> = translations.iter().flat_map(|t| t.verify.iter().cloned()).collect();
        if !checks.is_empty() {
            w.comment(&["Verify param"]);
            adapter::verify(w, &checks, &adapter::early_return(empty));
            w.blank();
        }

        let pre: Vec<&String> = translations.iter().flat_map(|t| t.pre.iter()).collect();
        if !pre.is_empty() {
            w.comment(&["Translate param"]);
            w.lines(pre);
            w.blank();
        }

        c_args.extend(translations.iter().flat_map(|t| t.args.iter().cloned()));
        w.comment(&["Execute"]);
        match &m.ret {
            Some(ret) => {
                let ret_c = self.ctypes.c_return(Some(ret));
                w.signature(&format!("{ret_c} _retval = {callee}"), c_args, ";");
            }
            None => w.signature(callee, c_args, ";"),
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
            w.line(self.convert_return(m, ret));
        }
    }

    /// Value returned when the call cannot be made.
    fn empty_result(&self, m: &MethodCrossings<'_>) -> Option<String> {
        let ret = m.ret.as_ref()?;
        Some(
            m.method
                .default_retval
                .clone()
                .unwrap_or_else(|| self.ctypes.native_empty(ret)),
        )
    }

    fn convert_return(&self, m: &MethodCrossings<'_>, ret: &CrossingStrategy) -> String {
        let ctypes = &self.ctypes;
        match ret {
            CrossingStrategy::Primitive { primitive: Primitive::Bool } => {
                "return _retval ? true : false;".to_string()
            }
            CrossingStrategy::Primitive { .. } => "return _retval;".to_string(),
            CrossingStrategy::Enum { name } => format!("return static_cast<{name}>(_retval);"),
            CrossingStrategy::Struct { name } => format!("return {name}(_retval);"),
            CrossingStrategy::String => {
                let s = &ctypes.naming.string_type;
                format!(
                    "{s} _retvalStr = _retval ? {s}(_retval) : {s}();\n{}(_retval);\nreturn _retvalStr;",
                    ctypes.abi("string_free")
                )
            }
            CrossingStrategy::Interface { class } if !ctypes.is_ref_counted(class) => {
                format!("return {}::WrapRaw(_retval);", ctypes.forward_class(class))
            }
            CrossingStrategy::Interface { class } => {
                let wrap = format!("return {}::Wrap(_retval);", ctypes.forward_class(class));
                if m.method.ret_ownership == Ownership::Borrowed {
                    format!("if (_retval)\n  {}(_retval);\n{wrap}", ctypes.mac("ADD_REF"))
                } else {
                    wrap
                }
            }
            CrossingStrategy::Array { .. } | CrossingStrategy::InterfaceArray { .. } => {
                "return _retval;".to_string()
            }
        }
    }

    /// Native argument to C argument(s).
    fn translate(&self, pc: &ParamCrossing<'_>) -> Translation {
        let ctypes = &self.ctypes;
        let param = pc.param;
        let n = param.name.as_str();
        let dir = param.direction;
        let mut t = Translation::default();

        match &pc.crossing {
            CrossingStrategy::Primitive { primitive } => match (dir, primitive) {
                (Direction::In, _) => t.args.push(n.to_string()),
                (_, Primitive::Bool) => {
                    let init = if dir == Direction::Out { "0" } else { n };
                    t.pre.push(format!("int {n}Int = {init};"));
                    t.args.push(format!("&{n}Int"));
                    t.post.push(format!("{n} = {n}Int ? true : false;"));
                }
                _ => t.args.push(format!("&{n}")),
            },
            CrossingStrategy::Enum { name } => {
                let c = ctypes.naming.c_type_name(name);
                if dir == Direction::In {
                    t.args.push(format!("static_cast<{c}>({n})"));
                } else {
                    let init = if dir == Direction::Out {
                        format!("{c}()")
                    } else {
                        format!("static_cast<{c}>({n})")
                    };
                    t.pre.push(format!("{c} {n}Val = {init};"));
                    t.args.push(format!("&{n}Val"));
                    t.post.push(format!("{n} = static_cast<{name}>({n}Val);"));
                }
            }
            CrossingStrategy::Struct { .. } => match param.passing {
                Passing::Value => t.args.push(n.to_string()),
                Passing::Reference => t.args.push(format!("&{n}")),
                Passing::Pointer => t.args.push(n.to_string()),
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
            Direction::In if pc.param.optional => {
                t.args.push(format!("{n}.empty() ? NULL : {n}.c_str()"));
            }
            Direction::In => {
                t.verify.push(format!("{n}.empty()"));
                t.args.push(format!("{n}.c_str()"));
            }
            dir => {
                let string_t = ctypes.abi("string_t");
                let init = if dir == Direction::Out {
                    "NULL".to_string()
                } else {
                    format!("{}({n}.c_str())", ctypes.abi("string_alloc"))
                };
                t.pre.push(format!("{string_t} {n}Str = {init};"));
                t.args.push(format!("&{n}Str"));
                t.post.push(format!(
                    "{n} = {n}Str ? {s}({n}Str) : {s}();\n{}({n}Str);",
                    ctypes.abi("string_free")
                ));
            }
        }
    }

    fn interface(&self, t: &mut Translation, pc: &ParamCrossing<'_>, class: &str) {
        let ctypes = &self.ctypes;
        let param = pc.param;
        let n = param.name.as_str();
        let c_struct = ctypes.class_struct(class);
        let reverse = ctypes.reverse_class(class);

        if !ctypes.is_ref_counted(class) {
            if !param.optional {
                t.verify.push(format!("!{n}"));
            }
            t.pre.push(format!("{c_struct}* {n}Struct = {reverse}::WrapRaw({n});"));
            t.args.push(format!("{n}Struct"));
            t.post.push(format!("{reverse}::ReleaseRaw({n}Struct);"));
            return;
        }

        match param.direction {
            Direction::In => {
                // A counted ref-pointer array read as a single interface.
                let points_to_ref = param.passing == Passing::Pointer && param.count_param.is_some();
                let (source, missing) = match param.passing {
                    _ if points_to_ref => (format!("{n} ? {n}->get() : NULL"), format!("!{n} || !{n}->get()")),
                    Passing::Pointer => (n.to_string(), format!("!{n}")),
                    _ => (n.to_string(), format!("!{n}.get()")),
                };
                if !param.optional {
                    t.verify.push(missing);
                }
                t.pre.push(format!("{c_struct}* {n}Struct = {reverse}::Wrap({source});"));
                t.args.push(format!("{n}Struct"));
                if param.ownership == Ownership::Borrowed {
                    t.post.push(format!("if ({n}Struct)\n  {}({n}Struct);", ctypes.mac("RELEASE")));
                }
            }
            dir => {
                let init = if dir == Direction::Out {
                    "NULL".to_string()
                } else {
                    format!("{reverse}::Wrap({n})")
                };
                t.pre.push(format!("{c_struct}* {n}Struct = {init};"));
                t.args.push(format!("&{n}Struct"));
                t.post.push(format!("{n} = {}::Wrap({n}Struct);", ctypes.forward_class(class)));
            }
        }
    }

    fn array(&self, t: &mut Translation, pc: &ParamCrossing<'_>, elem: Elem<'_>, length: &ArrayLength) {
        let ctypes = &self.ctypes;
        let n = pc.param.name.as_str();
        let dir = pc.param.direction;
        let e = ctypes.elem_c(elem);
        let list = format!("{n}List");
        let release_after = match elem {
            Elem::String => true,
            Elem::Interface(_) => pc.param.ownership == Ownership::Borrowed,
            _ => false,
        };

        let fill = |count: &str| {
            adapter::for_each(count, &[format!("{list}[i] = {};", ctypes.elem_to_c(elem, &format!("{n}[i]")))])
        };
        let alloc = |count: &str| {
            format!(
                "{list} = static_cast<{e}*>({}(sizeof({e}) * {count}));",
                ctypes.abi("mem_alloc")
            )
        };
        let release_elements = |count: &str| -> Option<String> {
            let release = ctypes.elem_release(elem, &format!("{list}[i]"))?;
            Some(adapter::for_each(count, &[release]))
        };

        match length {
            ArrayLength::Fixed(len) => {
                t.pre.push(format!("{e} {list}[{len}];"));
                t.pre.push(fill(&len.to_string()));
                t.args.push(list.clone());
                if dir != Direction::In {
                    t.post.push(adapter::for_each(
                        &len.to_string(),
                        &[format!("{n}[i] = {};", ctypes.elem_to_native(elem, &format!("{list}[i]")))],
                    ));
                }
            }
            ArrayLength::Counted(count) => {
                let size = format!("{n}Count");
                t.pre.push(format!(
                    "const size_t {size} = ({n} && {count} > 0) ? static_cast<size_t>({count}) : 0;"
                ));
                t.pre.push(format!("{e}* {list} = NULL;"));
                t.pre.push(adapter::if_block(&format!("{size} > 0"), &[alloc(&size), fill(&size)]));
                t.args.push(format!("static_cast<{}>({size})", ctypes.count_c_type(pc)));
                t.args.push(list.clone());
                self.free_list(t, &list, release_after.then(|| release_elements(&size)).flatten());
            }
            ArrayLength::Dynamic if dir == Direction::In => {
                let size = format!("{n}Count");
                t.pre.push(format!("const size_t {size} = {n}.size();"));
                t.pre.push(format!("{e}* {list} = NULL;"));
                t.pre.push(adapter::if_block(&format!("{size} > 0"), &[alloc(&size), fill(&size)]));
                t.args.push(size.clone());
                t.args.push(list.clone());
                self.free_list(t, &list, release_after.then(|| release_elements(&size)).flatten());
            }
            ArrayLength::Dynamic => {
                let size = format!("{n}Count");
                if dir == Direction::Out {
                    t.pre.push(format!("size_t {size} = 0;"));
                    t.pre.push(format!("{e}* {list} = NULL;"));
                } else {
                    // The callee takes over the buffer and its elements.
                    t.pre.push(format!("size_t {size} = {n}.size();"));
                    t.pre.push(format!("{e}* {list} = NULL;"));
                    t.pre.push(adapter::if_block(&format!("{size} > 0"), &[alloc(&size), fill(&size)]));
                }
                t.args.push(format!("&{size}"));
                t.args.push(format!("&{list}"));

                let mut per_element = vec![format!(
                    "{n}.push_back({});",
                    ctypes.elem_to_native(elem, &format!("{list}[i]"))
                )];
                if elem == Elem::String {
                    per_element.push(format!("{}({list}[i]);", ctypes.abi("string_free")));
                }
                t.post.push(format!("{n}.clear();"));
                t.post.push(adapter::if_block(
                    &list,
                    &[
                        adapter::for_each(&size, &per_element),
                        format!("{}({list});", ctypes.abi("mem_free")),
                    ],
                ));
            }
        }
    }

    fn free_list(&self, t: &mut Translation, list: &str, release: Option<String>) {
        let mut body = Vec::new();
        body.extend(release);
        body.push(format!("{}({list});", self.ctypes.abi("mem_free")));
        t.post.push(adapter::if_block(list, &body));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capigen_core::{parse_header, Classifier, ClassifyPolicy, HeaderModel, ParseOptions};

    const HEADER: &str = r#"
class CefFrame : public CefBase {
 public:
  virtual CefString GetName() =0;
};

class CefNode : public CefBase {
 public:
  virtual bool IsValid() =0;
};

class CefDocument : public CefNode {
 public:
  /*--cef(optional_param=title)--*/
  virtual bool SetTitle(const CefString& title) =0;
  virtual void GetName(CefString& name) =0;
  virtual void AddFrame(CefRefPtr<CefFrame> frame) =0;
  /*--cef(return=borrowed)--*/
  virtual CefRefPtr<CefFrame> GetMainFrame() =0;
  virtual void SetFrames(const std::vector<CefRefPtr<CefFrame> >& frames) =0;
  virtual void GetFrames(std::vector<CefRefPtr<CefFrame> >& frames) =0;
  /*--cef(default_retval=-1)--*/
  virtual int Count() =0;
  static CefRefPtr<CefDocument> Create(const CefString& url);
};
"#;

    fn render(class: &str) -> (String, String) {
        let model: HeaderModel = parse_header(HEADER, &ParseOptions::default()).unwrap();
        let classifier = Classifier::new(&model, ClassifyPolicy::default());
        let crossings = classifier.classify_class(model.class(class).unwrap()).unwrap();
        let config = EmitConfig::default();
        let emitter = ForwardEmitter::new(CTypes::new(&config.naming, &model), &config, &crossings);
        (emitter.render_header(), emitter.render_impl())
    }

    #[test]
    fn header_declares_own_and_inherited_overrides() {
        let (header, _) = render("CefDocument");
        assert!(header.contains("class CefDocumentCppToC"));
        assert!(header.contains(": public CefCppToC<CefDocumentCppToC, CefDocument, cef_document_t> {"));
        assert!(header.contains("explicit CefDocumentCppToC(cef_document_t* str);"));
        assert!(header.contains("// CefNode methods"));
        assert!(header.contains("virtual bool IsValid() OVERRIDE;"));
        assert!(header.contains("virtual bool SetTitle(const CefString& title) OVERRIDE;"));
        let node = header.find("// CefNode methods").unwrap();
        let own = header.find("// CefDocument methods").unwrap();
        assert!(node < own);
    }

    #[test]
    fn inherited_methods_cast_to_the_ancestor_struct() {
        let (_, body) = render("CefDocument");
        assert!(body.contains("cef_node_t* _struct = reinterpret_cast<cef_node_t*>(struct_);"));
        assert!(body.contains("if (CEF_MEMBER_MISSING(_struct, is_valid))"));
        assert!(body.contains("int _retval = _struct->is_valid(_struct);"));
    }

    #[test]
    fn missing_member_returns_empty_or_default() {
        let (_, body) = render("CefDocument");
        assert!(body.contains("if (CEF_MEMBER_MISSING(struct_, count))\n    return -1;"));
        assert!(body.contains("if (CEF_MEMBER_MISSING(struct_, get_main_frame))\n    return NULL;"));
        assert!(body.contains("if (CEF_MEMBER_MISSING(struct_, get_name))\n    return;"));
    }

    #[test]
    fn optional_strings_are_not_verified() {
        let (_, body) = render("CefDocument");
        assert!(body.contains("title.empty() ? NULL : title.c_str()"));
        assert!(!body.contains("if (title.empty())"));
        assert!(body.contains("return _retval ? true : false;"));
    }

    #[test]
    fn borrowed_interface_in_is_reference_neutral() {
        let (_, body) = render("CefDocument");
        assert!(body.contains("if (!frame.get())"));
        assert!(body.contains("cef_frame_t* frameStruct = CefFrameCToCpp::Wrap(frame);"));
        assert!(body.contains("if (frameStruct)\n    CEF_RELEASE(frameStruct);"));
    }

    #[test]
    fn borrowed_return_adds_one_reference() {
        let (_, body) = render("CefDocument");
        assert!(body.contains("if (_retval)\n    CEF_ADD_REF(_retval);\n  return CefFrameCppToC::Wrap(_retval);"));
    }

    #[test]
    fn interface_arrays_adjust_each_element() {
        let (_, body) = render("CefDocument");
        assert!(body.contains("framesList[i] = CefFrameCToCpp::Wrap(frames[i]);"));
        assert!(body.contains("CEF_RELEASE(framesList[i]);"));
        assert!(body.contains("frames.push_back(CefFrameCppToC::Wrap(framesList[i]));"));
        assert!(body.contains("cef_mem_free(framesList);"));
    }

    #[test]
    fn static_methods_call_the_creation_function() {
        let (_, body) = render("CefDocument");
        assert!(body.contains("// STATIC METHODS"));
        assert!(body.contains("CefRefPtr<CefDocument> CefDocument::Create(const CefString& url) {"));
        assert!(body.contains("struct _cef_document_t* _retval = cef_document_create(url.c_str());"));
        assert!(body.contains("return CefDocumentCppToC::Wrap(_retval);"));
    }

    #[test]
    fn includes_referenced_adapters() {
        let (_, body) = render("CefDocument");
        assert!(body.starts_with("// This file was generated by the capigen translator tool."));
        assert!(body.contains("#include \"libcef_dll/cpptoc/document_cpptoc.h\"\n"));
        assert!(body.contains("#include \"libcef_dll/ctocpp/frame_ctocpp.h\""));
        assert!(body.contains("#include \"libcef_dll/cpptoc/frame_cpptoc.h\""));
        assert!(body.trim_end().ends_with("#endif"));
        assert!(body.contains("template<> long CefCppToC<CefDocumentCppToC, CefDocument, cef_document_t>::DebugObjCt = 0;"));
    }
}
