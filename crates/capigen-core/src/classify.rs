//! Type Classifier.
//!
//! Maps every parameter and return type to exactly one
//! [`CrossingStrategy`]. All three emitters consult the classifier, so the
//! forward and reverse adapters always agree on how a value crosses.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClassificationError;
use crate::model::{
    ArrayLength, ClassDef, Direction, HeaderModel, MethodDef, ParamDef, Primitive, TypeRef,
};

type Result<T> = std::result::Result<T, ClassificationError>;

/// Element of a non-interface array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ElementKind {
    Primitive(Primitive),
    Enum(String),
    Struct(String),
    String,
}

/// How a value crosses the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CrossingStrategy {
    Primitive { primitive: Primitive },
    Enum { name: String },
    String,
    Struct { name: String },
    Interface { class: String },
    Array { element: ElementKind, length: ArrayLength },
    InterfaceArray { class: String, length: ArrayLength },
}

impl CrossingStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            CrossingStrategy::Primitive { .. } => "Primitive",
            CrossingStrategy::Enum { .. } => "Enum",
            CrossingStrategy::String => "String",
            CrossingStrategy::Struct { .. } => "Struct",
            CrossingStrategy::Interface { .. } => "Interface",
            CrossingStrategy::Array { .. } => "Array",
            CrossingStrategy::InterfaceArray { .. } => "InterfaceArray",
        }
    }

    /// Count parameter absorbed by a counted array.
    pub fn counted_by(&self) -> Option<&str> {
        match self {
            CrossingStrategy::Array {
                length: ArrayLength::Counted(c),
                ..
            }
            | CrossingStrategy::InterfaceArray {
                length: ArrayLength::Counted(c),
                ..
            } => Some(c),
            _ => None,
        }
    }
}

impl std::fmt::Display for CrossingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let length = |l: &ArrayLength| match l {
            ArrayLength::Dynamic => "dynamic".to_string(),
            ArrayLength::Fixed(n) => format!("fixed {n}"),
            ArrayLength::Counted(c) => format!("counted by {c}"),
        };
        match self {
            CrossingStrategy::Primitive { primitive } => write!(f, "Primitive({primitive})"),
            CrossingStrategy::Enum { name } => write!(f, "Enum({name})"),
            CrossingStrategy::String => write!(f, "String"),
            CrossingStrategy::Struct { name } => write!(f, "Struct({name})"),
            CrossingStrategy::Interface { class } => write!(f, "Interface({class})"),
            CrossingStrategy::Array { element, length: l } => {
                let element = match element {
                    ElementKind::Primitive(p) => p.to_string(),
                    ElementKind::Enum(n) | ElementKind::Struct(n) => n.clone(),
                    ElementKind::String => "string".to_string(),
                };
                write!(f, "Array({element}, {})", length(l))
            }
            CrossingStrategy::InterfaceArray { class, length: l } => {
                write!(f, "InterfaceArray({class}, {})", length(l))
            }
        }
    }
}

/// A shape a raw pointer may be read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeRule {
    Array,
    Interface,
    Struct,
}

/// Precedence of shape rules for raw pointers matching more than one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyPolicy {
    pub order: Vec<ShapeRule>,
}

impl Default for ClassifyPolicy {
    fn default() -> Self {
        ClassifyPolicy {
            order: vec![ShapeRule::Array, ShapeRule::Interface, ShapeRule::Struct],
        }
    }
}

impl ClassifyPolicy {
    /// Build a policy; every rule must appear exactly once.
    pub fn new(order: Vec<ShapeRule>) -> Result<Self> {
        for rule in [ShapeRule::Array, ShapeRule::Interface, ShapeRule::Struct] {
            let n = order.iter().filter(|r| **r == rule).count();
            if n != 1 {
                return Err(ClassificationError::new(format!(
                    "tie-break order must list {rule:?} exactly once"
                )));
            }
        }
        Ok(ClassifyPolicy { order })
    }
}

#[derive(Debug, Clone)]
pub struct ParamCrossing<'m> {
    pub param: &'m ParamDef,
    pub crossing: CrossingStrategy,
    /// Count parameter absorbed into this array.
    pub count: Option<&'m ParamDef>,
}

#[derive(Debug, Clone)]
pub struct MethodCrossings<'m> {
    /// Class declaring the method (an ancestor for inherited methods).
    pub owner: &'m ClassDef,
    pub method: &'m MethodDef,
    /// Parameters in C order; absorbed count parameters are omitted.
    pub params: Vec<ParamCrossing<'m>>,
    /// `None` for `void`.
    pub ret: Option<CrossingStrategy>,
}

impl<'m> MethodCrossings<'m> {
    pub fn is_inherited(&self, class: &ClassDef) -> bool {
        self.owner.name != class.name
    }
}

#[derive(Debug, Clone)]
pub struct ClassCrossings<'m> {
    pub class: &'m ClassDef,
    /// Ancestors' instance methods root-first, then the class's own methods.
    pub methods: Vec<MethodCrossings<'m>>,
}

impl<'m> ClassCrossings<'m> {
    pub fn instance_methods(&self) -> impl Iterator<Item = &MethodCrossings<'m>> {
        self.methods.iter().filter(|m| !m.method.is_static)
    }

    pub fn static_methods(&self) -> impl Iterator<Item = &MethodCrossings<'m>> {
        self.methods.iter().filter(|m| m.method.is_static)
    }
}

/// Classifies types against one model under one policy.
#[derive(Debug, Clone)]
pub struct Classifier<'m> {
    model: &'m HeaderModel,
    policy: ClassifyPolicy,
}

impl<'m> Classifier<'m> {
    pub fn new(model: &'m HeaderModel, policy: ClassifyPolicy) -> Self {
        Classifier { model, policy }
    }

    pub fn model(&self) -> &'m HeaderModel {
        self.model
    }

    pub fn policy(&self) -> &ClassifyPolicy {
        &self.policy
    }

    /// Strategy for one type in one direction.
    ///
    /// Direction does not change the strategy, only how emitters render it.
    pub fn classify(&self, ty: &TypeRef, _direction: Direction) -> Result<CrossingStrategy> {
        match ty {
            TypeRef::Void => Err(ClassificationError::new("void parameters are not allowed")),
            TypeRef::Primitive(p) => Ok(CrossingStrategy::Primitive { primitive: *p }),
            TypeRef::String => Ok(CrossingStrategy::String),
            TypeRef::Enum(name) => Ok(CrossingStrategy::Enum { name: name.clone() }),
            TypeRef::Struct(name) => Ok(CrossingStrategy::Struct { name: name.clone() }),
            TypeRef::Interface(class) => {
                self.ref_counted_interface(class)?;
                Ok(CrossingStrategy::Interface { class: class.clone() })
            }
            TypeRef::Array { element, length } => self.array(element, length.clone()),
            TypeRef::Pointer { pointee, count } => self.pointer(pointee, count.as_deref()),
        }
    }

    pub fn classify_param(&self, param: &ParamDef) -> Result<CrossingStrategy> {
        self.classify(&param.ty, param.direction)
    }

    /// Strategy for a method's return value, `None` for `void`.
    pub fn classify_return(&self, method: &MethodDef) -> Result<Option<CrossingStrategy>> {
        match &method.ret {
            TypeRef::Void => Ok(None),
            TypeRef::Array { .. } => Err(ClassificationError::new(
                "arrays cannot be returned by value",
            )),
            TypeRef::Pointer { pointee, .. } if matches!(&**pointee, TypeRef::Interface(c) if self.model.is_ref_counted(c)) => {
                Err(ClassificationError::new(
                    "ref-counted interfaces must be returned by ref-pointer, not raw pointer",
                ))
            }
            ty => self.classify(ty, Direction::Out).map(Some),
        }
    }

    /// Classify every parameter and the return of `method`, declared on `owner`.
    pub fn classify_method(&self, owner: &'m ClassDef, method: &'m MethodDef) -> Result<MethodCrossings<'m>> {
        let mut classified = Vec::with_capacity(method.params.len());
        for param in &method.params {
            let crossing = self
                .classify_param(param)
                .map_err(|e| e.at(&owner.name, &method.name, Some(&param.name)))?;
            classified.push((param, crossing));
        }

        let absorbed: Vec<String> = classified
            .iter()
            .filter_map(|(_, c)| c.counted_by().map(str::to_string))
            .collect();

        let params = classified
            .into_iter()
            .filter(|(p, _)| !absorbed.contains(&p.name))
            .map(|(param, crossing)| {
                let count = crossing.counted_by().and_then(|c| method.param(c));
                ParamCrossing {
                    param,
                    crossing,
                    count,
                }
            })
            .collect();

        let ret = self
            .classify_return(method)
            .map_err(|e| e.at(&owner.name, &method.name, None))?;

        Ok(MethodCrossings {
            owner,
            method,
            params,
            ret,
        })
    }

    /// Classify a class and its ancestors; the first failure fails the class.
    pub fn classify_class(&self, class: &'m ClassDef) -> Result<ClassCrossings<'m>> {
        let mut methods = Vec::new();
        for ancestor in self.model.ancestors(class) {
            for method in ancestor.instance_methods() {
                methods.push(self.classify_method(ancestor, method)?);
            }
        }
        for method in &class.methods {
            methods.push(self.classify_method(class, method)?);
        }
        debug!(class = %class.name, methods = methods.len(), "classified class");
        Ok(ClassCrossings { class, methods })
    }

    fn adapter_class(&self, class: &str) -> Result<&'m ClassDef> {
        self.model.class(class).ok_or_else(|| {
            ClassificationError::new(format!("no adapter exists for class '{class}'"))
        })
    }

    fn ref_counted_interface(&self, class: &str) -> Result<()> {
        if self.adapter_class(class)?.ref_counted {
            Ok(())
        } else {
            Err(ClassificationError::new(format!(
                "interface reference to non-ref-counted class '{class}'"
            )))
        }
    }

    fn element(&self, element: &TypeRef) -> Result<ElementKind> {
        match element {
            TypeRef::Primitive(p) => Ok(ElementKind::Primitive(*p)),
            TypeRef::Enum(n) => Ok(ElementKind::Enum(n.clone())),
            TypeRef::Struct(n) => Ok(ElementKind::Struct(n.clone())),
            TypeRef::String => Ok(ElementKind::String),
            TypeRef::Array { .. } => Err(ClassificationError::new("arrays of arrays are not supported")),
            TypeRef::Void => Err(ClassificationError::new("arrays of void are not supported")),
            other => Err(ClassificationError::new(format!(
                "unsupported array element {other:?}"
            ))),
        }
    }

    fn array(&self, element: &TypeRef, length: ArrayLength) -> Result<CrossingStrategy> {
        let fixed = matches!(length, ArrayLength::Fixed(_));
        if let TypeRef::Interface(class) = element {
            if fixed {
                return Err(ClassificationError::new("fixed arrays of interfaces are not supported"));
            }
            self.ref_counted_interface(class)?;
            return Ok(CrossingStrategy::InterfaceArray {
                class: class.clone(),
                length,
            });
        }
        let element = self.element(element)?;
        if fixed && element == ElementKind::String {
            return Err(ClassificationError::new("fixed arrays of strings are not supported"));
        }
        Ok(CrossingStrategy::Array { element, length })
    }

    fn pointer(&self, pointee: &TypeRef, count: Option<&str>) -> Result<CrossingStrategy> {
        for rule in &self.policy.order {
            match (rule, pointee, count) {
                (ShapeRule::Array, _, Some(count)) => {
                    return self.array(pointee, ArrayLength::Counted(count.to_string()));
                }
                (ShapeRule::Interface, TypeRef::Interface(_), Some(count))
                | (ShapeRule::Struct, TypeRef::Struct(_), Some(count)) => {
                    // A single element cannot honour a length parameter.
                    return Err(ClassificationError::new(format!(
                        "tie-break order reads this pointer as one {rule:?} but it is counted by '{count}'; \
                         list Array before {rule:?} or drop the 'count=' attribute"
                    )));
                }
                (ShapeRule::Interface, TypeRef::Interface(class), None) => {
                    // Raw pointers carry no reference; scoped classes cross this way.
                    self.adapter_class(class)?;
                    return Ok(CrossingStrategy::Interface { class: class.clone() });
                }
                (ShapeRule::Struct, TypeRef::Struct(name), None) => {
                    return Ok(CrossingStrategy::Struct { name: name.clone() });
                }
                _ => {}
            }
        }
        Err(match pointee {
            TypeRef::Primitive(p) => ClassificationError::new(format!(
                "raw pointer to primitive '{p}' needs a 'count=' attribute"
            )),
            TypeRef::String => ClassificationError::new("raw pointers to strings are not supported"),
            TypeRef::Enum(name) => ClassificationError::new(format!(
                "raw pointer to enum '{name}' needs a 'count=' attribute"
            )),
            other => ClassificationError::new(format!("raw pointer to {other:?} has no crossing")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_header, ParseOptions};

    const HEADER: &str = r#"
struct CefRect { int x; int y; };
enum CefState { STATE_A, STATE_B };

class CefTask {
 public:
  virtual void Execute() =0;
};

class CefFrame : public CefBase {
 public:
  virtual CefString GetName() =0;
};

class CefBrowser : public CefBase {
 public:
  virtual bool IsLoading() =0;
  virtual void GetFrames(std::vector<CefRefPtr<CefFrame> >& frames) =0;
  /*--cef(count=frames:frame_count)--*/
  virtual void SetFrames(const CefRefPtr<CefFrame>* frames, size_t frame_count) =0;
  /*--cef(count=rects:rect_count)--*/
  virtual void SetRects(const CefRect* rects, size_t rect_count) =0;
  virtual void GetRect(CefRect* rect) =0;
  virtual void Post(CefTask* task) =0;
  virtual CefState GetState() =0;
};

class CefSubBrowser : public CefBrowser {
 public:
  virtual int Depth() =0;
  static CefRefPtr<CefSubBrowser> Create() ;
};
"#;

    fn model() -> HeaderModel {
        parse_header(HEADER, &ParseOptions::default()).unwrap()
    }

    fn method<'m>(crossings: &'m ClassCrossings<'_>, name: &str) -> &'m MethodCrossings<'m> {
        crossings.methods.iter().find(|m| m.method.name == name).unwrap()
    }

    #[test]
    fn primitive_and_enum() {
        let model = model();
        let classifier = Classifier::new(&model, ClassifyPolicy::default());
        let browser = classifier.classify_class(model.class("CefBrowser").unwrap()).unwrap();
        assert_eq!(
            method(&browser, "IsLoading").ret,
            Some(CrossingStrategy::Primitive { primitive: Primitive::Bool })
        );
        assert_eq!(
            method(&browser, "GetState").ret,
            Some(CrossingStrategy::Enum { name: "CefState".into() })
        );
    }

    #[test]
    fn vector_of_interfaces_is_interface_array() {
        let model = model();
        let classifier = Classifier::new(&model, ClassifyPolicy::default());
        let browser = classifier.classify_class(model.class("CefBrowser").unwrap()).unwrap();
        let frames = &method(&browser, "GetFrames").params[0];
        assert_eq!(
            frames.crossing,
            CrossingStrategy::InterfaceArray {
                class: "CefFrame".into(),
                length: ArrayLength::Dynamic,
            }
        );
    }

    #[test]
    fn counted_pointer_absorbs_count() {
        let model = model();
        let classifier = Classifier::new(&model, ClassifyPolicy::default());
        let browser = classifier.classify_class(model.class("CefBrowser").unwrap()).unwrap();
        let set = method(&browser, "SetRects");
        assert_eq!(set.params.len(), 1);
        assert_eq!(set.params[0].count.map(|p| p.name.as_str()), Some("rect_count"));
        assert_eq!(
            set.params[0].crossing,
            CrossingStrategy::Array {
                element: ElementKind::Struct("CefRect".into()),
                length: ArrayLength::Counted("rect_count".into()),
            }
        );
    }

    #[test]
    fn tie_break_follows_policy_order() {
        let model = model();
        let browser = model.class("CefBrowser").unwrap();
        let set_frames = browser.methods.iter().find(|m| m.name == "SetFrames").unwrap();
        let set_rects = browser.methods.iter().find(|m| m.name == "SetRects").unwrap();

        let array_first = Classifier::new(&model, ClassifyPolicy::default());
        assert_eq!(
            array_first.classify_param(&set_frames.params[0]).unwrap().kind(),
            "InterfaceArray"
        );
        assert_eq!(array_first.classify_param(&set_rects.params[0]).unwrap().kind(), "Array");

        let policy = ClassifyPolicy::new(vec![ShapeRule::Interface, ShapeRule::Struct, ShapeRule::Array]).unwrap();
        let shape_first = Classifier::new(&model, policy);
        let err = shape_first.classify_param(&set_frames.params[0]).unwrap_err();
        assert!(err.to_string().contains("counted by"), "{err}");
        assert!(shape_first.classify_param(&set_rects.params[0]).is_err());
        assert!(shape_first.classify_method(browser, set_rects).is_err());
    }

    #[test]
    fn shape_first_policy_still_reads_uncounted_pointers() {
        let model = model();
        let policy = ClassifyPolicy::new(vec![ShapeRule::Struct, ShapeRule::Interface, ShapeRule::Array]).unwrap();
        let classifier = Classifier::new(&model, policy);
        let browser = model.class("CefBrowser").unwrap();
        let get_rect = browser.methods.iter().find(|m| m.name == "GetRect").unwrap();
        assert_eq!(
            classifier.classify_param(&get_rect.params[0]).unwrap(),
            CrossingStrategy::Struct { name: "CefRect".into() }
        );
    }

    #[test]
    fn struct_pointer_and_raw_scoped_interface() {
        let model = model();
        let classifier = Classifier::new(&model, ClassifyPolicy::default());
        let browser = classifier.classify_class(model.class("CefBrowser").unwrap()).unwrap();
        assert_eq!(
            method(&browser, "GetRect").params[0].crossing,
            CrossingStrategy::Struct { name: "CefRect".into() }
        );
        assert_eq!(
            method(&browser, "Post").params[0].crossing,
            CrossingStrategy::Interface { class: "CefTask".into() }
        );
    }

    #[test]
    fn ancestors_come_first() {
        let model = model();
        let classifier = Classifier::new(&model, ClassifyPolicy::default());
        let sub = classifier.classify_class(model.class("CefSubBrowser").unwrap()).unwrap();
        let names: Vec<_> = sub.methods.iter().map(|m| m.method.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"IsLoading"));
        assert_eq!(&names[names.len() - 2..], &["Depth", "Create"]);
        assert!(sub.methods[0].is_inherited(sub.class));
        assert_eq!(sub.static_methods().count(), 1);
    }

    #[test]
    fn rejects_ref_ptr_to_scoped_class() {
        let model = parse_header(
            "class CefTask { public: virtual void Run() =0; };\n\
             class CefA : public CefBase { public: virtual void Post(CefRefPtr<CefTask> t) =0; };",
            &ParseOptions::default(),
        )
        .unwrap();
        let classifier = Classifier::new(&model, ClassifyPolicy::default());
        let err = classifier.classify_class(model.class("CefA").unwrap()).unwrap_err();
        assert_eq!(err.param.as_deref(), Some("t"));
        assert!(err.detail.contains("non-ref-counted"));
    }

    #[test]
    fn rejects_array_return_and_fixed_string_arrays() {
        let model = parse_header(
            "class CefA : public CefBase { public:\n\
             virtual std::vector<int> Values() =0;\n\
             virtual void Names(const CefString names[2]) =0; };",
            &ParseOptions::default(),
        )
        .unwrap();
        let classifier = Classifier::new(&model, ClassifyPolicy::default());
        let a = model.class("CefA").unwrap();

        let err = classifier.classify_method(a, &a.methods[0]).unwrap_err();
        assert_eq!(err.param, None);
        assert!(err.detail.contains("returned by value"));

        let err = classifier.classify_method(a, &a.methods[1]).unwrap_err();
        assert!(err.detail.contains("fixed arrays of strings"));
    }

    #[test]
    fn rejects_uncounted_primitive_pointer() {
        let model = parse_header(
            "class CefA : public CefBase { public: virtual void Fill(int* out) =0; };",
            &ParseOptions::default(),
        )
        .unwrap();
        let classifier = Classifier::new(&model, ClassifyPolicy::default());
        let err = classifier.classify_class(model.class("CefA").unwrap()).unwrap_err();
        assert!(err.to_string().contains("parameter 'out' of CefA::Fill"));
    }

    #[test]
    fn policy_requires_every_rule_once() {
        assert!(ClassifyPolicy::new(vec![ShapeRule::Array, ShapeRule::Array, ShapeRule::Struct]).is_err());
        assert!(ClassifyPolicy::new(vec![ShapeRule::Struct, ShapeRule::Array, ShapeRule::Interface]).is_ok());
    }

    #[test]
    fn strategies_serialize_tagged() {
        let json = serde_json::to_value(CrossingStrategy::Interface { class: "CefFrame".into() }).unwrap();
        assert_eq!(json["strategy"], "interface");
        assert_eq!(json["class"], "CefFrame");

        let json = serde_json::to_value(CrossingStrategy::Array {
            element: ElementKind::String,
            length: ArrayLength::Dynamic,
        })
        .unwrap();
        assert_eq!(json["strategy"], "array");
        assert_eq!(json["element"]["kind"], "string");
        assert_eq!(json["length"], "Dynamic");

        let policy = serde_json::to_string(&ClassifyPolicy::default()).unwrap();
        assert_eq!(policy, r#"{"order":["array","interface","struct"]}"#);
    }
}
