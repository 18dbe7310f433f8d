//! The header model: everything the emitters know about the native surface.
//!
//! Built once by [`crate::parser::parse_header`] and shared immutably.

use serde::Serialize;

use crate::error::Location;
pub use crate::types::Primitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Ownership {
    /// The callee may use the value only for the duration of the call.
    Borrowed,
    /// One reference (or the buffer) moves to the receiver.
    Owned,
    /// The receiver gets an independent copy.
    Copied,
}

/// How a parameter is spelled on the native side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Passing {
    Value,
    Reference,
    Pointer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ArrayLength {
    /// `std::vector<T>`.
    Dynamic,
    /// `T name[N]`.
    Fixed(usize),
    /// Raw pointer whose length is another parameter.
    Counted(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeRef {
    Void,
    Primitive(Primitive),
    String,
    Enum(String),
    Struct(String),
    Interface(String),
    Array {
        element: Box<TypeRef>,
        length: ArrayLength,
    },
    /// Raw pointer whose crossing the classifier decides.
    Pointer {
        pointee: Box<TypeRef>,
        count: Option<String>,
    },
}

impl TypeRef {
    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    /// Interface class named anywhere in this type.
    pub fn interface(&self) -> Option<&str> {
        match self {
            TypeRef::Interface(c) => Some(c),
            TypeRef::Array { element, .. } => element.interface(),
            TypeRef::Pointer { pointee, .. } => pointee.interface(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamDef {
    pub name: String,
    pub ty: TypeRef,
    /// Native type as written, without any `[N]` suffix.
    pub spelling: String,
    pub passing: Passing,
    pub direction: Direction,
    pub ownership: Ownership,
    /// Null (or an empty string) is a legal value.
    pub optional: bool,
    /// For raw counted arrays, the parameter holding the length.
    pub count_param: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDef {
    pub name: String,
    pub doc: Vec<String>,
    pub ret: TypeRef,
    pub ret_spelling: String,
    pub ret_ownership: Ownership,
    pub params: Vec<ParamDef>,
    pub is_static: bool,
    pub is_const: bool,
    pub capi_name: Option<String>,
    pub default_retval: Option<String>,
    pub location: Location,
}

impl MethodDef {
    pub fn param(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Whether `name` is the length of some counted array parameter.
    pub fn is_count_param(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| p.count_param.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassDef {
    pub name: String,
    pub doc: Vec<String>,
    /// Declaration order; determines struct-field order.
    pub methods: Vec<MethodDef>,
    pub ref_counted: bool,
    /// Parent class inside the model. `None` for direct children of the root.
    pub base: Option<String>,
    pub capi_name: Option<String>,
    pub location: Location,
}

impl ClassDef {
    pub fn instance_methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter().filter(|m| !m.is_static)
    }

    pub fn static_methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter().filter(|m| m.is_static)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumValue {
    pub name: String,
    /// Explicit initializer as written.
    pub value: Option<String>,
    pub doc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDef {
    pub name: String,
    pub doc: Vec<String>,
    pub values: Vec<EnumValue>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub doc: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructDef {
    pub name: String,
    pub doc: Vec<String>,
    pub fields: Vec<FieldDef>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedefDef {
    pub name: String,
    /// Fully resolved target.
    pub target: TypeRef,
    pub location: Location,
}

/// Parsed native surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderModel {
    classes: Vec<ClassDef>,
    enums: Vec<EnumDef>,
    structs: Vec<StructDef>,
    typedefs: Vec<TypedefDef>,
}

impl HeaderModel {
    pub(crate) fn new(
        classes: Vec<ClassDef>,
        enums: Vec<EnumDef>,
        structs: Vec<StructDef>,
        typedefs: Vec<TypedefDef>,
    ) -> Self {
        HeaderModel {
            classes,
            enums,
            structs,
            typedefs,
        }
    }

    /// Classes in declaration order.
    pub fn classes(&self) -> &[ClassDef] {
        &self.classes
    }

    pub fn enums(&self) -> &[EnumDef] {
        &self.enums
    }

    pub fn structs(&self) -> &[StructDef] {
        &self.structs
    }

    pub fn typedefs(&self) -> &[TypedefDef] {
        &self.typedefs
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }

    /// Class names, sorted.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Model classes above `class`, root-first. Excludes `class` itself.
    pub fn ancestors(&self, class: &ClassDef) -> Vec<&ClassDef> {
        let mut chain = Vec::new();
        let mut next = class.base.as_deref();
        while let Some(name) = next {
            match self.class(name) {
                Some(parent) if !chain.iter().any(|c: &&ClassDef| c.name == parent.name) => {
                    chain.push(parent);
                    next = parent.base.as_deref();
                }
                _ => break,
            }
        }
        chain.reverse();
        chain
    }

    pub fn is_ref_counted(&self, class: &str) -> bool {
        self.class(class).is_some_and(|c| c.ref_counted)
    }

    /// Classes with parents before children, otherwise by name.
    pub fn classes_in_dependency_order(&self) -> Vec<&ClassDef> {
        let mut ordered: Vec<&ClassDef> = self.classes.iter().collect();
        ordered.sort_by_key(|c| (self.ancestors(c).len(), c.name.clone()));
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, base: Option<&str>) -> ClassDef {
        ClassDef {
            name: name.to_string(),
            doc: Vec::new(),
            methods: Vec::new(),
            ref_counted: true,
            base: base.map(str::to_string),
            capi_name: None,
            location: Location::default(),
        }
    }

    #[test]
    fn ancestors_are_root_first() {
        let model = HeaderModel::new(
            vec![
                class("CefC", Some("CefB")),
                class("CefA", None),
                class("CefB", Some("CefA")),
            ],
            vec![],
            vec![],
            vec![],
        );
        let c = model.class("CefC").unwrap();
        let names: Vec<_> = model.ancestors(c).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["CefA", "CefB"]);
    }

    #[test]
    fn dependency_order_puts_parents_first() {
        let model = HeaderModel::new(
            vec![
                class("CefZeta", None),
                class("CefAlpha", Some("CefZeta")),
                class("CefBeta", None),
            ],
            vec![],
            vec![],
            vec![],
        );
        let names: Vec<_> = model
            .classes_in_dependency_order()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["CefBeta", "CefZeta", "CefAlpha"]);
        assert_eq!(model.class_names(), vec!["CefAlpha", "CefBeta", "CefZeta"]);
    }

    #[test]
    fn interface_lookup_through_arrays() {
        let ty = TypeRef::Array {
            element: Box::new(TypeRef::Interface("CefFrame".into())),
            length: ArrayLength::Dynamic,
        };
        assert_eq!(ty.interface(), Some("CefFrame"));
        assert_eq!(TypeRef::String.interface(), None);
    }
}
