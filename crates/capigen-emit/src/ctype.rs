//! C-ABI spellings shared by all three emitters.
//!
//! Every decision about how a crossing looks in C lives here, so the C
//! header's function-pointer fields and both adapters' casts always agree.

use capigen_core::{
    ArrayLength, CrossingStrategy, Direction, ElementKind, HeaderModel, Naming, ParamCrossing,
    Passing, Primitive, TypeRef,
};

/// One element of an array crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elem<'s> {
    Primitive(Primitive),
    Enum(&'s str),
    Struct(&'s str),
    String,
    Interface(&'s str),
}

impl<'s> Elem<'s> {
    pub fn of(crossing: &'s CrossingStrategy) -> Option<(Elem<'s>, &'s ArrayLength)> {
        match crossing {
            CrossingStrategy::Array { element, length } => {
                let elem = match element {
                    ElementKind::Primitive(p) => Elem::Primitive(*p),
                    ElementKind::Enum(n) => Elem::Enum(n),
                    ElementKind::Struct(n) => Elem::Struct(n),
                    ElementKind::String => Elem::String,
                };
                Some((elem, length))
            }
            CrossingStrategy::InterfaceArray { class, length } => {
                Some((Elem::Interface(class), length))
            }
            _ => None,
        }
    }
}

/// Spelling helper bound to one model and naming scheme.
#[derive(Debug, Clone, Copy)]
pub struct CTypes<'a> {
    pub naming: &'a Naming,
    pub model: &'a HeaderModel,
}

impl<'a> CTypes<'a> {
    pub fn new(naming: &'a Naming, model: &'a HeaderModel) -> Self {
        CTypes { naming, model }
    }

    /// Prelude identifier, e.g. `string_free` → `cef_string_free`.
    pub fn abi(&self, name: &str) -> String {
        format!("{}_{name}", self.naming.c_prefix)
    }

    /// Prelude macro, e.g. `RELEASE` → `CEF_RELEASE`.
    pub fn mac(&self, name: &str) -> String {
        format!("{}_{name}", self.naming.macro_prefix())
    }

    /// Typedef name of a class struct (`cef_frame_t`).
    pub fn class_struct(&self, class: &str) -> String {
        match self.model.class(class) {
            Some(def) => self.naming.class_struct(def),
            None => self.naming.c_type_name(class),
        }
    }

    /// Tagged pointer spelling, `struct _cef_frame_t*`.
    pub fn class_ptr(&self, class: &str) -> String {
        format!("struct _{}*", self.class_struct(class))
    }

    pub fn forward_class(&self, class: &str) -> String {
        format!("{class}CppToC")
    }

    pub fn reverse_class(&self, class: &str) -> String {
        format!("{class}CToCpp")
    }

    pub fn is_ref_counted(&self, class: &str) -> bool {
        self.model.is_ref_counted(class)
    }

    pub fn ref_ptr(&self, class: &str) -> String {
        format!("{}<{class}>", self.naming.ref_ptr)
    }

    pub fn elem_c(&self, elem: Elem<'_>) -> String {
        match elem {
            Elem::Primitive(p) => p.c_name().to_string(),
            Elem::Enum(n) | Elem::Struct(n) => self.naming.c_type_name(n),
            Elem::String => self.abi("string_t"),
            Elem::Interface(c) => self.class_ptr(c),
        }
    }

    pub fn elem_native(&self, elem: Elem<'_>) -> String {
        match elem {
            Elem::Primitive(p) => p.native_name().to_string(),
            Elem::Enum(n) | Elem::Struct(n) => n.to_string(),
            Elem::String => self.naming.string_type.clone(),
            Elem::Interface(c) => self.ref_ptr(c),
        }
    }

    /// Native value to a C value the receiver owns (strings are allocated,
    /// interfaces carry one new reference).
    pub fn elem_to_c(&self, elem: Elem<'_>, expr: &str) -> String {
        match elem {
            Elem::Primitive(_) => expr.to_string(),
            Elem::Enum(n) => format!("static_cast<{}>({expr})", self.naming.c_type_name(n)),
            Elem::Struct(_) => expr.to_string(),
            Elem::String => format!("{}({expr}.c_str())", self.abi("string_alloc")),
            Elem::Interface(c) => format!("{}::Wrap({expr})", self.reverse_class(c)),
        }
    }

    /// C value to a native value. Interfaces take over the reference held
    /// by `expr`; strings are copied.
    pub fn elem_to_native(&self, elem: Elem<'_>, expr: &str) -> String {
        match elem {
            Elem::Primitive(Primitive::Bool) => format!("{expr} ? true : false"),
            Elem::Primitive(_) => expr.to_string(),
            Elem::Enum(n) => format!("static_cast<{n}>({expr})"),
            Elem::Struct(n) => format!("{n}({expr})"),
            Elem::String => format!("{}({expr})", self.naming.string_type),
            Elem::Interface(c) => format!("{}::Wrap({expr})", self.forward_class(c)),
        }
    }

    /// Statement releasing a C element produced by [`CTypes::elem_to_c`].
    pub fn elem_release(&self, elem: Elem<'_>, expr: &str) -> Option<String> {
        match elem {
            Elem::String => Some(format!("{}({expr});", self.abi("string_free"))),
            Elem::Interface(_) => Some(format!("if ({expr})\n  {}({expr});", self.mac("RELEASE"))),
            _ => None,
        }
    }

    /// C spelling of a scalar (non-array) crossing as seen by an `In` value.
    fn scalar_c(&self, crossing: &CrossingStrategy) -> String {
        match crossing {
            CrossingStrategy::Primitive { primitive } => primitive.c_name().to_string(),
            CrossingStrategy::Enum { name } | CrossingStrategy::Struct { name } => {
                self.naming.c_type_name(name)
            }
            CrossingStrategy::String => self.abi("string_t"),
            CrossingStrategy::Interface { class } => self.class_ptr(class),
            CrossingStrategy::Array { .. } | CrossingStrategy::InterfaceArray { .. } => {
                "void*".to_string()
            }
        }
    }

    /// C return type; `void` when `ret` is `None`.
    pub fn c_return(&self, ret: Option<&CrossingStrategy>) -> String {
        match ret {
            None => "void".to_string(),
            Some(c) => self.scalar_c(c),
        }
    }

    /// C parameter declarations for one native parameter. Arrays expand to
    /// a count and a pointer.
    pub fn c_params(&self, pc: &ParamCrossing<'_>) -> Vec<String> {
        let name = &pc.param.name;
        let dir = pc.param.direction;
        if let Some((elem, length)) = Elem::of(&pc.crossing) {
            let e = self.elem_c(elem);
            return match length {
                ArrayLength::Dynamic if dir == Direction::In => {
                    vec![format!("size_t {name}Count"), format!("{} {name}", const_ptr(&e))]
                }
                ArrayLength::Dynamic => {
                    vec![format!("size_t* {name}Count"), format!("{e}** {name}")]
                }
                ArrayLength::Counted(count) => {
                    vec![
                        format!("{} {count}", self.count_c_type(pc)),
                        format!("{} {name}", const_ptr(&e)),
                    ]
                }
                ArrayLength::Fixed(_) if dir == Direction::In => {
                    vec![format!("{} {name}", const_ptr(&e))]
                }
                ArrayLength::Fixed(_) => vec![format!("{e}* {name}")],
            };
        }

        let c = self.scalar_c(&pc.crossing);
        let decl = match (&pc.crossing, dir) {
            (CrossingStrategy::String, Direction::In) => {
                format!("const {}* {name}", self.abi("char_t"))
            }
            (CrossingStrategy::Struct { .. }, Direction::In)
                if pc.param.passing != Passing::Value =>
            {
                format!("const {c}* {name}")
            }
            (_, Direction::In) => format!("{c} {name}"),
            (_, _) => format!("{c}* {name}"),
        };
        vec![decl]
    }

    /// C type of an absorbed count parameter.
    pub fn count_c_type(&self, pc: &ParamCrossing<'_>) -> String {
        match pc.count.map(|p| &p.ty) {
            Some(TypeRef::Primitive(p)) => p.c_name().to_string(),
            _ => "size_t".to_string(),
        }
    }

    /// Native spelling of an absorbed count parameter.
    pub fn count_native_type(&self, pc: &ParamCrossing<'_>) -> String {
        match pc.count.map(|p| &p.ty) {
            Some(TypeRef::Primitive(p)) => p.native_name().to_string(),
            _ => "size_t".to_string(),
        }
    }

    /// Native "nothing" value of a return crossing.
    pub fn native_empty(&self, ret: &CrossingStrategy) -> String {
        match ret {
            CrossingStrategy::Primitive { primitive } => primitive.empty_value().to_string(),
            CrossingStrategy::Enum { name } | CrossingStrategy::Struct { name } => format!("{name}()"),
            CrossingStrategy::String => format!("{}()", self.naming.string_type),
            _ => "NULL".to_string(),
        }
    }

    /// C "nothing" value of a return crossing.
    pub fn c_empty(&self, ret: &CrossingStrategy) -> String {
        match ret {
            CrossingStrategy::Primitive { primitive } => primitive.empty_value().to_string(),
            CrossingStrategy::Enum { name } | CrossingStrategy::Struct { name } => {
                format!("{}()", self.naming.c_type_name(name))
            }
            _ => "NULL".to_string(),
        }
    }
}

/// `const T*`, or `T const*` when `T` is itself a pointer.
pub fn const_ptr(ty: &str) -> String {
    if ty.ends_with('*') {
        format!("{ty} const*")
    } else {
        format!("const {ty}*")
    }
}

/// Native parameter declaration as written in the input header.
pub fn native_param(pc: &capigen_core::ParamDef) -> String {
    match &pc.ty {
        TypeRef::Array {
            length: ArrayLength::Fixed(n),
            ..
        } => format!("{} {}[{n}]", pc.spelling, pc.name),
        _ => format!("{} {}", pc.spelling, pc.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capigen_core::{parse_header, Classifier, ClassifyPolicy, ParseOptions};

    const HEADER: &str = r#"
struct CefRect { int x; };
enum CefState { A, B };
class CefFrame : public CefBase {
 public:
  virtual void Visit(const CefString& name, CefString& value, bool& flag) =0;
  virtual void Place(const CefRect& rect, CefRect* out_rect, CefState state) =0;
  virtual void Frames(const std::vector<CefRefPtr<CefFrame> >& frames,
                      std::vector<CefString>& names) =0;
  /*--cef(count=values:value_count)--*/
  virtual void Values(const int* values, int value_count, int fixed[4]) =0;
};
"#;

    fn decls(method: &str) -> Vec<String> {
        let model = parse_header(HEADER, &ParseOptions::default()).unwrap();
        let naming = Naming::default();
        let classifier = Classifier::new(&model, ClassifyPolicy::default());
        let class = model.class("CefFrame").unwrap();
        let m = class.methods.iter().find(|m| m.name == method).unwrap();
        let crossings = classifier.classify_method(class, m).unwrap();
        let ctypes = CTypes::new(&naming, &model);
        crossings.params.iter().flat_map(|p| ctypes.c_params(p)).collect()
    }

    #[test]
    fn strings_and_primitives() {
        assert_eq!(
            decls("Visit"),
            vec!["const cef_char_t* name", "cef_string_t* value", "int* flag"]
        );
    }

    #[test]
    fn structs_and_enums() {
        assert_eq!(
            decls("Place"),
            vec!["const cef_rect_t* rect", "cef_rect_t* out_rect", "cef_state_t state"]
        );
    }

    #[test]
    fn arrays_expand_to_count_and_pointer() {
        assert_eq!(
            decls("Frames"),
            vec![
                "size_t framesCount",
                "struct _cef_frame_t* const* frames",
                "size_t* namesCount",
                "cef_string_t** names",
            ]
        );
        assert_eq!(
            decls("Values"),
            vec!["int value_count", "const int* values", "int* fixed"]
        );
    }

    #[test]
    fn element_conversions() {
        let model = HeaderModel::default();
        let naming = Naming::default();
        let ctypes = CTypes::new(&naming, &model);
        assert_eq!(ctypes.elem_to_c(Elem::Enum("CefState"), "x"), "static_cast<cef_state_t>(x)");
        assert_eq!(ctypes.elem_to_native(Elem::Interface("CefFrame"), "p"), "CefFrameCppToC::Wrap(p)");
        assert_eq!(ctypes.elem_to_native(Elem::Primitive(Primitive::Bool), "b"), "b ? true : false");
        assert!(ctypes.elem_release(Elem::Primitive(Primitive::Int), "x").is_none());
        assert_eq!(const_ptr("int"), "const int*");
    }
}
