//! Header Model Parser.
//!
//! Two passes: the first walks the token stream and records raw
//! declarations (type expressions unresolved), the second resolves every
//! name against the collected declarations and the built-in set, infers
//! direction and ownership, and validates attributes.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::attrs::{Attributes, CLASS_KEYS, METHOD_KEYS};
use crate::error::{Location, ParseError, Result};
use crate::lexer::{tokenize, Cursor, Token, TokenKind};
use crate::model::{
    ArrayLength, ClassDef, Direction, EnumDef, EnumValue, FieldDef, HeaderModel, MethodDef,
    Ownership, ParamDef, Passing, StructDef, TypeRef, TypedefDef,
};
use crate::naming::Naming;
use crate::types::{parse_type, BaseType, Primitive, TypeExpr};

/// Options controlling how a header is read.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub naming: Naming,
}

/// Parse a native-surface header into a [`HeaderModel`].
pub fn parse_header(src: &str, options: &ParseOptions) -> Result<HeaderModel> {
    let tokens = tokenize(src)?;
    let mut collector = Collector::default();
    let mut cur = Cursor::new(&tokens);
    collector.scope(&mut cur, false)?;

    let model = Resolver::new(&collector, &options.naming)?.resolve()?;
    debug!(
        classes = model.classes().len(),
        enums = model.enums().len(),
        structs = model.structs().len(),
        "parsed header"
    );
    Ok(model)
}

// ---------------------------------------------------------------------------
// Pass 1: collection
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct RawParam {
    ty: TypeExpr,
    name: String,
    array_len: Option<usize>,
    location: Location,
}

#[derive(Debug)]
struct RawMethod {
    name: String,
    doc: Vec<String>,
    attrs: Attributes,
    ret: TypeExpr,
    params: Vec<RawParam>,
    is_static: bool,
    is_const: bool,
    location: Location,
}

#[derive(Debug)]
struct RawClass {
    name: String,
    doc: Vec<String>,
    attrs: Attributes,
    base: Option<String>,
    methods: Vec<RawMethod>,
    location: Location,
}

#[derive(Debug)]
struct RawField {
    ty: TypeExpr,
    name: String,
    array_len: Option<usize>,
    doc: Vec<String>,
    location: Location,
}

#[derive(Debug)]
struct RawStruct {
    name: String,
    doc: Vec<String>,
    fields: Vec<RawField>,
    location: Location,
}

#[derive(Debug)]
struct RawTypedef {
    name: String,
    target: TypeExpr,
    location: Location,
}

#[derive(Debug, Default)]
struct Collector {
    classes: Vec<RawClass>,
    forward_classes: BTreeSet<String>,
    enums: Vec<EnumDef>,
    structs: Vec<RawStruct>,
    typedefs: Vec<RawTypedef>,
}

/// Attribute comments and doc comment seen before a declaration.
#[derive(Debug, Default)]
struct Pending {
    attrs: Attributes,
    doc: Vec<String>,
}

impl Pending {
    fn absorb(&mut self, tok: &Token, inner: &str) -> Result<()> {
        if self.attrs.is_empty() && !tok.comment.is_empty() {
            self.doc = clean_doc(&tok.comment);
        }
        self.attrs.merge(Attributes::parse(inner, tok.location)?);
        Ok(())
    }

    /// Doc comment for a declaration starting at `tok`.
    fn take_doc(&mut self, tok: &Token) -> Vec<String> {
        let doc = std::mem::take(&mut self.doc);
        if doc.is_empty() {
            clean_doc(&tok.comment)
        } else {
            doc
        }
    }

    fn reject_if_any(&self, construct: &str) -> Result<()> {
        if self.attrs.is_empty() {
            Ok(())
        } else {
            Err(self
                .attrs
                .error(format!("attribute comment cannot apply to {construct}")))
        }
    }
}

fn clean_doc(lines: &[String]) -> Vec<String> {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].to_vec(),
        _ => Vec::new(),
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

impl Collector {
    /// Read declarations until end of input, or until the closing `}` when
    /// `nested` is set.
    fn scope(&mut self, cur: &mut Cursor<'_>, nested: bool) -> Result<()> {
        let mut pending = Pending::default();
        loop {
            let Some(tok) = cur.peek() else {
                if nested {
                    return Err(ParseError::new(
                        "namespace",
                        cur.location(),
                        "missing closing '}'",
                    ));
                }
                pending.reject_if_any("end of input")?;
                return Ok(());
            };

            match &tok.kind {
                TokenKind::Attribute(inner) => {
                    cur.next();
                    pending.absorb(tok, inner)?;
                }
                TokenKind::Punct('}') if nested => {
                    cur.next();
                    pending.reject_if_any("a closing brace")?;
                    return Ok(());
                }
                TokenKind::Punct(';') => {
                    cur.next();
                }
                TokenKind::Ident(word) => match word.as_str() {
                    "namespace" => {
                        pending.reject_if_any("a namespace")?;
                        cur.next();
                        // Name is optional and may be qualified (`a::b`).
                        while !cur.peek().is_some_and(|t| t.is_punct('{')) {
                            if !cur.eat_scope() {
                                cur.expect_ident("namespace")?;
                            }
                        }
                        cur.expect_punct('{', "namespace")?;
                        self.scope(cur, true)?;
                    }
                    "extern" => {
                        cur.next();
                        if matches!(cur.peek().map(|t| &t.kind), Some(TokenKind::Str(_))) {
                            cur.next();
                        }
                        if cur.eat_punct('{') {
                            self.scope(cur, true)?;
                        } else {
                            skip_declaration(cur)?;
                        }
                    }
                    "using" | "template" | "static_assert" => {
                        pending.reject_if_any(&format!("a '{word}' declaration"))?;
                        skip_declaration(cur)?;
                    }
                    "typedef" => {
                        pending.reject_if_any("a typedef")?;
                        self.typedef(cur)?;
                    }
                    "enum" => {
                        pending.reject_if_any("an enum")?;
                        let doc = pending.take_doc(tok);
                        self.enumeration(cur, doc)?;
                    }
                    "struct" => {
                        pending.reject_if_any("a struct")?;
                        let doc = pending.take_doc(tok);
                        self.structure(cur, doc)?;
                    }
                    "class" => {
                        let doc = pending.take_doc(tok);
                        let attrs = std::mem::take(&mut pending.attrs);
                        self.class(cur, doc, attrs)?;
                    }
                    _ => {
                        return Err(ParseError::new(
                            "declaration",
                            tok.location,
                            format!("unrecognised syntax starting at '{word}'"),
                        ));
                    }
                },
                _ => {
                    return Err(ParseError::new(
                        "declaration",
                        tok.location,
                        format!("unrecognised syntax starting at '{}'", tok.text()),
                    ));
                }
            }
        }
    }

    fn typedef(&mut self, cur: &mut Cursor<'_>) -> Result<()> {
        let location = cur.location();
        cur.next();
        let target = parse_type(cur, "typedef")?;
        let name = cur.expect_ident("typedef")?;
        cur.expect_punct(';', "typedef")?;
        self.typedefs.push(RawTypedef {
            name,
            target,
            location,
        });
        Ok(())
    }

    fn enumeration(&mut self, cur: &mut Cursor<'_>, doc: Vec<String>) -> Result<()> {
        let location = cur.location();
        cur.next();
        if !cur.eat_ident("class") {
            cur.eat_ident("struct");
        }
        let name = cur.expect_ident("enum")?;
        if cur.eat_punct(':') {
            parse_type(cur, "enum")?;
        }
        if cur.eat_punct(';') {
            return Err(ParseError::new(
                "enum",
                location,
                format!("opaque enum declaration '{name}' is not supported"),
            ));
        }
        cur.expect_punct('{', "enum")?;

        let mut values = Vec::new();
        loop {
            if cur.eat_punct('}') {
                break;
            }
            let value_doc = cur.peek().map(|t| clean_doc(&t.comment)).unwrap_or_default();
            let value_name = cur.expect_ident("enum value")?;
            let mut value = None;
            if cur.eat_punct('=') {
                let mut parts = Vec::new();
                let mut depth = 0usize;
                while let Some(tok) = cur.peek() {
                    if depth == 0 && (tok.is_punct(',') || tok.is_punct('}')) {
                        break;
                    }
                    if tok.is_punct('(') {
                        depth += 1;
                    } else if tok.is_punct(')') {
                        depth = depth.saturating_sub(1);
                    }
                    parts.push(tok.text());
                    cur.next();
                }
                if parts.is_empty() {
                    return Err(cur.unexpected("enum value", "initializer"));
                }
                value = Some(parts.join(" "));
            }
            values.push(EnumValue {
                name: value_name,
                value,
                doc: value_doc,
            });
            if !cur.eat_punct(',') {
                cur.expect_punct('}', "enum")?;
                break;
            }
        }
        cur.expect_punct(';', "enum")?;

        self.enums.push(EnumDef {
            name,
            doc,
            values,
            location,
        });
        Ok(())
    }

    fn structure(&mut self, cur: &mut Cursor<'_>, doc: Vec<String>) -> Result<()> {
        let location = cur.location();
        cur.next();
        let name = cur.expect_ident("struct")?;
        if cur.eat_punct(';') {
            // Forward declaration; the definition must follow somewhere.
            return Ok(());
        }
        cur.expect_punct('{', "struct")?;

        let mut fields = Vec::new();
        while !cur.eat_punct('}') {
            let Some(first) = cur.peek() else {
                return Err(cur.unexpected("struct", "'}'"));
            };
            let field_doc = clean_doc(&first.comment);
            let field_location = first.location;
            let ty = parse_type(cur, "struct field")?;
            let field_name = cur.expect_ident("struct field")?;
            let array_len = parse_array_suffix(cur, "struct field")?;
            cur.expect_punct(';', "struct field")?;
            fields.push(RawField {
                ty,
                name: field_name,
                array_len,
                doc: field_doc,
                location: field_location,
            });
        }
        cur.expect_punct(';', "struct")?;

        self.structs.push(RawStruct {
            name,
            doc,
            fields,
            location,
        });
        Ok(())
    }

    fn class(&mut self, cur: &mut Cursor<'_>, doc: Vec<String>, attrs: Attributes) -> Result<()> {
        let location = cur.location();
        cur.next();
        let name = cur.expect_ident("class")?;

        if cur.eat_punct(';') {
            if !attrs.is_empty() {
                return Err(attrs.error("attribute comment cannot apply to a forward declaration"));
            }
            self.forward_classes.insert(name);
            return Ok(());
        }

        let mut base = None;
        if cur.eat_punct(':') {
            for keyword in ["public", "virtual", "protected", "private", "virtual"] {
                cur.eat_ident(keyword);
            }
            let mut base_name = String::new();
            if cur.eat_scope() {
                base_name.push_str("::");
            }
            base_name.push_str(&cur.expect_ident("class")?);
            while cur.eat_scope() {
                base_name.push_str("::");
                base_name.push_str(&cur.expect_ident("class")?);
            }
            if cur.peek().is_some_and(|t| t.is_punct(',')) {
                return Err(ParseError::new(
                    "class",
                    cur.location(),
                    format!("class '{name}' uses multiple inheritance"),
                ));
            }
            base = Some(last_segment(&base_name).to_string());
        }
        cur.expect_punct('{', "class")?;

        let methods = class_body(cur, &name)?;
        cur.expect_punct(';', "class")?;

        self.classes.push(RawClass {
            name,
            doc,
            attrs,
            base,
            methods,
            location,
        });
        Ok(())
    }
}

/// Members of a class body, after the opening `{`. Consumes the closing `}`.
fn class_body(cur: &mut Cursor<'_>, class_name: &str) -> Result<Vec<RawMethod>> {
    let mut methods = Vec::new();
    let mut public = false;
    let mut pending = Pending::default();

    loop {
        let Some(tok) = cur.peek() else {
            return Err(ParseError::new(
                "class",
                cur.location(),
                format!("missing closing '}}' for class '{class_name}'"),
            ));
        };

        if tok.is_punct('}') {
            cur.next();
            return Ok(methods);
        }
        if let TokenKind::Attribute(inner) = &tok.kind {
            cur.next();
            pending.absorb(tok, inner)?;
            continue;
        }
        if let Some(word @ ("public" | "protected" | "private")) = tok.ident() {
            if cur.peek_at(1).is_some_and(|t| t.is_punct(':')) {
                public = word == "public";
                cur.next();
                cur.next();
                continue;
            }
        }

        let is_virtual = tok.is_ident("virtual");
        let is_static = tok.is_ident("static");
        let is_special = cur.peek_at(1).is_some_and(|t| t.is_punct('~'))
            || (cur.peek_at(1).is_some_and(|t| t.is_ident(class_name))
                && cur.peek_at(2).is_some_and(|t| t.is_punct('(')));

        if public && (is_virtual || is_static) && !is_special {
            let doc = pending.take_doc(tok);
            let attrs = std::mem::take(&mut pending.attrs);
            let m = method(cur, doc, attrs, is_static)?;
            methods.push(m);
        } else {
            pending = Pending::default();
            skip_declaration(cur)?;
        }
    }
}

fn method(cur: &mut Cursor<'_>, doc: Vec<String>, attrs: Attributes, is_static: bool) -> Result<RawMethod> {
    let location = cur.location();
    cur.next();
    while cur.eat_ident("inline") || cur.eat_ident("virtual") || cur.eat_ident("static") {}

    let ret = parse_type(cur, "method")?;
    let name = cur.expect_ident("method")?;
    cur.expect_punct('(', "method")?;

    let mut params = Vec::new();
    let empty_void = cur.peek().is_some_and(|t| t.is_ident("void"))
        && cur.peek_at(1).is_some_and(|t| t.is_punct(')'));
    if empty_void {
        cur.next();
    }
    if !cur.eat_punct(')') {
        loop {
            let param_location = cur.location();
            let ty = parse_type(cur, "parameter")?;
            if cur.peek().is_some_and(|t| t.is_punct(',') || t.is_punct(')')) {
                return Err(ParseError::new(
                    "parameter",
                    param_location,
                    format!("unnamed parameter of type '{}' in '{name}'", ty.spelling),
                ));
            }
            let param_name = cur.expect_ident("parameter")?;
            let array_len = parse_array_suffix(cur, "parameter")?;
            if cur.eat_punct('=') {
                skip_default_argument(cur)?;
            }
            params.push(RawParam {
                ty,
                name: param_name,
                array_len,
                location: param_location,
            });
            if cur.eat_punct(',') {
                continue;
            }
            cur.expect_punct(')', "parameter list")?;
            break;
        }
    }

    let is_const = cur.eat_ident("const");
    while cur.eat_ident("OVERRIDE") || cur.eat_ident("override") || cur.eat_ident("final") {}
    if cur.eat_punct('=') {
        let pure = cur.peek().is_some_and(|t| t.kind == TokenKind::Number("0".into()));
        if !pure {
            return Err(cur.unexpected("method", "'0'"));
        }
        cur.next();
    }
    if cur.eat_punct('{') {
        cur.skip_group('{', '}', "method body")?;
        cur.eat_punct(';');
    } else {
        cur.expect_punct(';', "method")?;
    }

    Ok(RawMethod {
        name,
        doc,
        attrs,
        ret,
        params,
        is_static,
        is_const,
        location,
    })
}

fn parse_array_suffix(cur: &mut Cursor<'_>, construct: &str) -> Result<Option<usize>> {
    if !cur.eat_punct('[') {
        return Ok(None);
    }
    let location = cur.location();
    let len = match cur.next().map(|t| &t.kind) {
        Some(TokenKind::Number(n)) => n.parse::<usize>().map_err(|_| {
            ParseError::new(construct, location, format!("invalid array length '{n}'"))
        })?,
        _ => {
            return Err(ParseError::new(
                construct,
                location,
                "array length must be an integer literal",
            ))
        }
    };
    cur.expect_punct(']', construct)?;
    if cur.peek().is_some_and(|t| t.is_punct('[')) {
        return Err(ParseError::new(
            construct,
            cur.location(),
            "multi-dimensional arrays are not supported",
        ));
    }
    Ok(Some(len))
}

fn skip_default_argument(cur: &mut Cursor<'_>) -> Result<()> {
    let mut depth = 0usize;
    while let Some(tok) = cur.peek() {
        if depth == 0 && (tok.is_punct(',') || tok.is_punct(')')) {
            return Ok(());
        }
        if tok.is_punct('(') || tok.is_punct('<') {
            depth += 1;
        } else if tok.is_punct(')') || tok.is_punct('>') {
            depth = depth.saturating_sub(1);
        }
        cur.next();
    }
    Err(cur.unexpected("parameter", "')'"))
}

/// Skip one declaration: up to `;`, or through a braced body.
fn skip_declaration(cur: &mut Cursor<'_>) -> Result<()> {
    let start = cur.location();
    while let Some(tok) = cur.next() {
        if tok.is_punct(';') {
            return Ok(());
        }
        if tok.is_punct('(') {
            cur.skip_group('(', ')', "declaration")?;
        } else if tok.is_punct('{') {
            cur.skip_group('{', '}', "declaration")?;
            cur.eat_punct(';');
            return Ok(());
        }
    }
    Err(ParseError::new("declaration", start, "missing ';'"))
}

// ---------------------------------------------------------------------------
// Pass 2: resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Class,
    Enum,
    Struct,
    Typedef,
}

struct Resolver<'a> {
    raw: &'a Collector,
    naming: &'a Naming,
    kinds: BTreeMap<&'a str, Kind>,
    typedefs: BTreeMap<&'a str, TypeRef>,
}

impl<'a> Resolver<'a> {
    fn new(raw: &'a Collector, naming: &'a Naming) -> Result<Self> {
        let mut kinds = BTreeMap::new();
        let entries = raw
            .classes
            .iter()
            .map(|c| (c.name.as_str(), Kind::Class, c.location, "class"))
            .chain(raw.enums.iter().map(|e| (e.name.as_str(), Kind::Enum, e.location, "enum")))
            .chain(raw.structs.iter().map(|s| (s.name.as_str(), Kind::Struct, s.location, "struct")))
            .chain(
                raw.typedefs
                    .iter()
                    .map(|t| (t.name.as_str(), Kind::Typedef, t.location, "typedef")),
            );
        for (name, kind, location, construct) in entries {
            if name == naming.root_class || name == naming.string_type || name == naming.ref_ptr {
                return Err(ParseError::new(
                    construct,
                    location,
                    format!("'{name}' is a built-in name"),
                ));
            }
            if kinds.insert(name, kind).is_some() {
                return Err(ParseError::new(
                    construct,
                    location,
                    format!("duplicate definition of '{name}'"),
                ));
            }
        }

        let mut resolver = Resolver {
            raw,
            naming,
            kinds,
            typedefs: BTreeMap::new(),
        };
        resolver.resolve_typedefs()?;
        Ok(resolver)
    }

    fn resolve_typedefs(&mut self) -> Result<()> {
        // Typedefs may name later typedefs; resolve until a fixed point.
        let raw = self.raw;
        let mut remaining: Vec<&RawTypedef> = raw.typedefs.iter().collect();
        while !remaining.is_empty() {
            let before = remaining.len();
            let mut still = Vec::new();
            for td in remaining {
                match self.typedef_target(td) {
                    Ok(target) => {
                        self.typedefs.insert(td.name.as_str(), target);
                    }
                    Err(_) if self.waits_on_typedef(&td.target) => still.push(td),
                    Err(e) => return Err(e),
                }
            }
            if still.len() == before {
                let td = still[0];
                return Err(ParseError::new(
                    "typedef",
                    td.location,
                    format!("typedef '{}' cannot be resolved", td.name),
                ));
            }
            remaining = still;
        }
        Ok(())
    }

    fn waits_on_typedef(&self, expr: &TypeExpr) -> bool {
        match &expr.base {
            BaseType::Named(n) => {
                let n = last_segment(n);
                self.kinds.get(n) == Some(&Kind::Typedef) && !self.typedefs.contains_key(n)
            }
            _ => false,
        }
    }

    fn typedef_target(&self, td: &RawTypedef) -> Result<TypeRef> {
        let expr = &td.target;
        let err = |detail: String| ParseError::new("typedef", td.location, detail);
        if expr.reference {
            return Err(err(format!("typedef '{}' cannot name a reference", td.name)));
        }
        if expr.base == BaseType::Void && expr.pointers == 1 {
            return Ok(TypeRef::Primitive(Primitive::VoidPtr));
        }
        if expr.pointers > 0 {
            return Err(err(format!("typedef '{}' cannot name a pointer", td.name)));
        }
        let target = self.resolve_base(&expr.base, td.location)?;
        match target {
            TypeRef::Primitive(_) | TypeRef::Enum(_) | TypeRef::Struct(_) => Ok(target),
            _ => Err(err(format!(
                "typedef '{}' must name a primitive, enum or struct",
                td.name
            ))),
        }
    }

    /// Resolve a base type without declarators.
    fn resolve_base(&self, base: &BaseType, location: Location) -> Result<TypeRef> {
        match base {
            BaseType::Void => Ok(TypeRef::Void),
            BaseType::Primitive(p) => Ok(TypeRef::Primitive(*p)),
            BaseType::Named(name) => self.resolve_name(name, location),
            BaseType::Template { name, args } => {
                let short = last_segment(name);
                if short == self.naming.ref_ptr {
                    let class = match args.as_slice() {
                        [arg] if arg.pointers == 0 && !arg.reference => match &arg.base {
                            BaseType::Named(n) => self.resolve_name(n, location)?,
                            _ => TypeRef::Void,
                        },
                        _ => TypeRef::Void,
                    };
                    match class {
                        TypeRef::Interface(c) => Ok(TypeRef::Interface(c)),
                        _ => Err(ParseError::new(
                            "parameter",
                            location,
                            format!("'{}' must hold a class", self.naming.ref_ptr),
                        )),
                    }
                } else if name == "std::vector" || name == "vector" {
                    let [arg] = args.as_slice() else {
                        return Err(ParseError::new(
                            "parameter",
                            location,
                            "std::vector takes exactly one type argument",
                        ));
                    };
                    let element = self.resolve_element(arg, location)?;
                    Ok(TypeRef::Array {
                        element: Box::new(element),
                        length: ArrayLength::Dynamic,
                    })
                } else {
                    Err(ParseError::new(
                        "parameter",
                        location,
                        format!("unsupported template type '{name}'"),
                    ))
                }
            }
        }
    }

    fn resolve_element(&self, arg: &TypeExpr, location: Location) -> Result<TypeRef> {
        if arg.pointers > 0 || arg.reference {
            return Err(ParseError::new(
                "parameter",
                location,
                format!("vector element '{}' must be a value type", arg.spelling),
            ));
        }
        let element = self.resolve_base(&arg.base, location)?;
        match &element {
            TypeRef::Array { .. } => Err(ParseError::new(
                "parameter",
                location,
                "nested vectors are not supported",
            )),
            TypeRef::Void => Err(ParseError::new(
                "parameter",
                location,
                "vector of void is not supported",
            )),
            TypeRef::Interface(_) if !matches!(arg.base, BaseType::Template { .. }) => {
                Err(ParseError::new(
                    "parameter",
                    location,
                    format!(
                        "vector of interfaces must hold '{}<...>' elements",
                        self.naming.ref_ptr
                    ),
                ))
            }
            _ => Ok(element),
        }
    }

    fn resolve_name(&self, name: &str, location: Location) -> Result<TypeRef> {
        if name == self.naming.string_type || name == "std::wstring" || name == "std::string" {
            return Ok(TypeRef::String);
        }
        let short = last_segment(name);
        if short == self.naming.root_class {
            return Ok(TypeRef::Interface(short.to_string()));
        }
        match self.kinds.get(short) {
            Some(Kind::Class) => Ok(TypeRef::Interface(short.to_string())),
            Some(Kind::Enum) => Ok(TypeRef::Enum(short.to_string())),
            Some(Kind::Struct) => Ok(TypeRef::Struct(short.to_string())),
            Some(Kind::Typedef) => self.typedefs.get(short).cloned().ok_or_else(|| {
                ParseError::new("type", location, format!("typedef '{short}' is not resolved"))
            }),
            None if self.raw.forward_classes.contains(short) => Err(ParseError::new(
                "type",
                location,
                format!("class '{short}' is declared but never defined"),
            )),
            None => Err(ParseError::new(
                "type",
                location,
                format!("unresolved type name '{name}'"),
            )),
        }
    }

    fn resolve(self) -> Result<HeaderModel> {
        let mut structs = Vec::new();
        for raw in &self.raw.structs {
            structs.push(self.structure(raw)?);
        }

        let mut typedefs = Vec::new();
        for td in &self.raw.typedefs {
            if let Some(target) = self.typedefs.get(td.name.as_str()) {
                typedefs.push(TypedefDef {
                    name: td.name.clone(),
                    target: target.clone(),
                    location: td.location,
                });
            }
        }

        let mut classes = Vec::new();
        for raw in &self.raw.classes {
            classes.push(self.class(raw)?);
        }

        Ok(HeaderModel::new(
            classes,
            self.raw.enums.clone(),
            structs,
            typedefs,
        ))
    }

    fn structure(&self, raw: &RawStruct) -> Result<StructDef> {
        let mut fields = Vec::new();
        for field in &raw.fields {
            let err = |detail: String| ParseError::new("struct field", field.location, detail);
            if field.ty.pointers > 0 || field.ty.reference {
                return Err(err(format!(
                    "field '{}' of '{}' must be a plain value",
                    field.name, raw.name
                )));
            }
            let mut ty = self.resolve_base(&field.ty.base, field.location)?;
            if !matches!(ty, TypeRef::Primitive(_) | TypeRef::Enum(_) | TypeRef::Struct(_)) {
                return Err(err(format!(
                    "field '{}' of '{}' must be a primitive, enum or struct",
                    field.name, raw.name
                )));
            }
            if ty == TypeRef::Struct(raw.name.clone()) {
                return Err(err(format!("struct '{}' contains itself", raw.name)));
            }
            // The C side spells bool as int, so the layouts would differ.
            if ty == TypeRef::Primitive(Primitive::Bool) {
                return Err(err(format!(
                    "field '{}' of '{}' is bool, which has no layout-compatible C type; use int",
                    field.name, raw.name
                )));
            }
            if let Some(n) = field.array_len {
                ty = TypeRef::Array {
                    element: Box::new(ty),
                    length: ArrayLength::Fixed(n),
                };
            }
            fields.push(FieldDef {
                name: field.name.clone(),
                ty,
                doc: field.doc.clone(),
            });
        }
        Ok(StructDef {
            name: raw.name.clone(),
            doc: raw.doc.clone(),
            fields,
            location: raw.location,
        })
    }

    /// Ref-counted status and in-model parent of a class.
    fn lineage(&self, raw: &RawClass) -> Result<(bool, Option<String>)> {
        let mut seen = vec![raw.name.as_str()];
        let mut current = raw;
        let mut parent = None;
        loop {
            let Some(base) = current.base.as_deref() else {
                return Ok((false, parent));
            };
            if base == self.naming.root_class {
                return Ok((true, parent));
            }
            let Some(next) = self.raw.classes.iter().find(|c| c.name == base) else {
                return Err(ParseError::new(
                    "class",
                    current.location,
                    format!("unknown base class '{base}' of '{}'", current.name),
                ));
            };
            if seen.contains(&next.name.as_str()) {
                return Err(ParseError::new(
                    "class",
                    raw.location,
                    format!("inheritance cycle through '{}'", next.name),
                ));
            }
            if parent.is_none() {
                parent = Some(next.name.clone());
            }
            seen.push(&next.name);
            current = next;
        }
    }

    fn class(&self, raw: &RawClass) -> Result<ClassDef> {
        raw.attrs.validate(CLASS_KEYS, "class")?;
        let capi_name = raw.attrs.get("capi_name").map(str::to_string);
        if let Some(name) = &capi_name {
            check_identifier(name, &raw.attrs)?;
        }
        let (ref_counted, base) = self.lineage(raw)?;

        let mut methods = Vec::new();
        for m in &raw.methods {
            if methods.iter().any(|existing: &MethodDef| existing.name == m.name) {
                return Err(ParseError::new(
                    "method",
                    m.location,
                    format!("overloaded method '{}::{}' is not supported", raw.name, m.name),
                ));
            }
            methods.push(self.method(raw, m)?);
        }

        Ok(ClassDef {
            name: raw.name.clone(),
            doc: raw.doc.clone(),
            methods,
            ref_counted,
            base,
            capi_name,
            location: raw.location,
        })
    }

    fn method(&self, class: &RawClass, raw: &RawMethod) -> Result<MethodDef> {
        let attrs = &raw.attrs;
        attrs.validate(METHOD_KEYS, "method")?;
        let site = format!("{}::{}", class.name, raw.name);

        for key in ["optional_param", "transfer", "borrow", "out"] {
            for value in attrs.all(key) {
                if !raw.params.iter().any(|p| p.name == value) {
                    return Err(attrs.error(format!(
                        "'{key}={value}' names no parameter of {site}"
                    )));
                }
            }
        }
        let counts = self.count_pairs(raw, &site)?;

        let mut params = Vec::new();
        for p in &raw.params {
            let count = counts.get(p.name.as_str()).map(|c| c.to_string());
            params.push(self.param(raw, p, count, &site)?);
        }

        let (ret, ret_ownership) = self.return_type(raw, &site)?;
        let capi_name = attrs.get("capi_name").map(str::to_string);
        if let Some(name) = &capi_name {
            check_identifier(name, attrs)?;
        }

        Ok(MethodDef {
            name: raw.name.clone(),
            doc: raw.doc.clone(),
            ret,
            ret_spelling: raw.ret.spelling.clone(),
            ret_ownership,
            params,
            is_static: raw.is_static,
            is_const: raw.is_const,
            capi_name,
            default_retval: attrs.get("default_retval").map(str::to_string),
            location: raw.location,
        })
    }

    /// `count=<array>:<count>` pairs, validated.
    fn count_pairs<'m>(&self, raw: &'m RawMethod, site: &str) -> Result<BTreeMap<&'m str, &'m str>> {
        let mut pairs = BTreeMap::new();
        for value in raw.attrs.all("count") {
            let Some((array, count)) = value.split_once(':') else {
                return Err(raw
                    .attrs
                    .error(format!("'count={value}' must have the form <param>:<count_param>")));
            };
            let (array, count) = (array.trim(), count.trim());
            let Some(array_param) = raw.params.iter().find(|p| p.name == array) else {
                return Err(raw.attrs.error(format!("'count={value}' names no parameter of {site}")));
            };
            let Some(count_param) = raw.params.iter().find(|p| p.name == count) else {
                return Err(raw
                    .attrs
                    .error(format!("count parameter '{count}' of {site} is missing")));
            };
            if array_param.ty.pointers != 1 || array_param.ty.reference {
                return Err(raw.attrs.error(format!(
                    "'count=' applies only to raw pointer parameters, '{array}' is '{}'",
                    array_param.ty.spelling
                )));
            }
            let count_ty = if count_param.ty.pointers == 0 {
                self.resolve_base(&count_param.ty.base, count_param.location)?
            } else {
                TypeRef::Void
            };
            let integer = matches!(count_ty, TypeRef::Primitive(p) if p.is_integer());
            if !integer || count_param.ty.reference {
                return Err(raw.attrs.error(format!(
                    "count parameter '{count}' of {site} must be an integer primitive"
                )));
            }
            if pairs.insert(array_param.name.as_str(), count_param.name.as_str()).is_some() {
                return Err(raw.attrs.error(format!("duplicate 'count=' for '{array}'")));
            }
        }
        Ok(pairs)
    }

    fn param(&self, method: &RawMethod, raw: &RawParam, count: Option<String>, site: &str) -> Result<ParamDef> {
        let attrs = &method.attrs;
        let named = |key: &str| attrs.all(key).any(|v| v == raw.name);
        let err = |detail: String| ParseError::new("parameter", raw.location, detail);
        let expr = &raw.ty;
        let base = self.resolve_base(&expr.base, raw.location)?;
        let is_template_ref = matches!(&expr.base, BaseType::Template { name, .. } if last_segment(name) == self.naming.ref_ptr);

        if base.is_void() && expr.pointers == 0 {
            return Err(err(format!("parameter '{}' of {site} has type void", raw.name)));
        }

        let (ty, passing) = if let Some(len) = raw.array_len {
            if expr.pointers > 0 || expr.reference {
                return Err(err(format!("fixed array '{}' must hold values", raw.name)));
            }
            if matches!(base, TypeRef::Array { .. }) {
                return Err(err(format!("fixed array '{}' of vectors is not supported", raw.name)));
            }
            let ty = TypeRef::Array {
                element: Box::new(base),
                length: ArrayLength::Fixed(len),
            };
            (ty, Passing::Value)
        } else {
            match (expr.pointers, expr.reference) {
                (0, reference) => {
                    if matches!(base, TypeRef::Interface(_)) && !is_template_ref {
                        return Err(err(format!(
                            "class '{}' cannot be passed by value or reference; use '{}<...>' or a pointer",
                            expr.spelling, self.naming.ref_ptr
                        )));
                    }
                    let passing = if reference { Passing::Reference } else { Passing::Value };
                    (base, passing)
                }
                (1, false) => match base {
                    TypeRef::Void => (TypeRef::Primitive(Primitive::VoidPtr), Passing::Value),
                    TypeRef::Array { .. } => {
                        return Err(err(format!("pointer to vector '{}' is not supported", raw.name)));
                    }
                    TypeRef::Interface(_) if !is_template_ref && count.is_some() => {
                        return Err(err(format!(
                            "counted interface arrays must be spelled '{}<...>*'",
                            self.naming.ref_ptr
                        )));
                    }
                    TypeRef::Interface(_) if is_template_ref && count.is_none() => {
                        return Err(err(format!(
                            "pointer to '{}' requires a 'count=' attribute",
                            self.naming.ref_ptr
                        )));
                    }
                    pointee => (
                        TypeRef::Pointer {
                            pointee: Box::new(pointee),
                            count: count.clone(),
                        },
                        Passing::Pointer,
                    ),
                },
                (1, true) => {
                    return Err(err(format!("reference to pointer '{}' is not supported", expr.spelling)));
                }
                _ => {
                    return Err(err(format!(
                        "pointer-to-pointer type '{}' is not supported",
                        expr.spelling
                    )));
                }
            }
        };

        let direction = match passing {
            Passing::Value if matches!(ty, TypeRef::Array { length: ArrayLength::Fixed(_), .. }) => {
                if expr.is_const { Direction::In } else { Direction::InOut }
            }
            Passing::Value => Direction::In,
            Passing::Reference if expr.is_const => Direction::In,
            Passing::Reference if named("out") => Direction::Out,
            Passing::Reference => Direction::InOut,
            Passing::Pointer => match &ty {
                TypeRef::Pointer { pointee, count: None }
                    if matches!(**pointee, TypeRef::Struct(_)) && !expr.is_const =>
                {
                    Direction::InOut
                }
                _ => Direction::In,
            },
        };
        if named("out") && !(passing == Passing::Reference && !expr.is_const) {
            return Err(attrs.error(format!(
                "'out={}' requires a non-const reference parameter",
                raw.name
            )));
        }

        let carries_interface = ty.interface().is_some();
        let (transfer, borrow) = (named("transfer"), named("borrow"));
        if transfer && borrow {
            return Err(attrs.error(format!(
                "'transfer' and 'borrow' both name '{}'",
                raw.name
            )));
        }
        if (transfer || borrow) && !carries_interface {
            return Err(attrs.error(format!(
                "ownership key on value-typed parameter '{}'",
                raw.name
            )));
        }
        if (transfer || borrow) && direction != Direction::In {
            return Err(attrs.error(format!(
                "ownership key on {} parameter '{}'",
                if direction == Direction::Out { "out" } else { "in-out" },
                raw.name
            )));
        }

        let is_string = match &ty {
            TypeRef::String => true,
            TypeRef::Array { element, .. } => **element == TypeRef::String,
            _ => false,
        };
        let ownership = if carries_interface {
            match direction {
                Direction::In if transfer => Ownership::Owned,
                Direction::In => Ownership::Borrowed,
                _ => Ownership::Owned,
            }
        } else if is_string && direction != Direction::In {
            Ownership::Owned
        } else {
            Ownership::Copied
        };

        let optional = named("optional_param");
        if optional && !(carries_interface || ty == TypeRef::String) {
            return Err(attrs.error(format!(
                "'optional_param={}' applies only to string and interface parameters",
                raw.name
            )));
        }

        Ok(ParamDef {
            name: raw.name.clone(),
            ty,
            spelling: expr.spelling.clone(),
            passing,
            direction,
            ownership,
            optional,
            count_param: count,
        })
    }

    fn return_type(&self, raw: &RawMethod, site: &str) -> Result<(TypeRef, Ownership)> {
        let expr = &raw.ret;
        let err = |detail: String| ParseError::new("method", raw.location, detail);
        let base = self.resolve_base(&expr.base, raw.location)?;
        let is_template_ref = matches!(&expr.base, BaseType::Template { name, .. } if last_segment(name) == self.naming.ref_ptr);

        let ty = match expr.pointers {
            0 => {
                if matches!(base, TypeRef::Interface(_)) && !is_template_ref {
                    return Err(err(format!("{site} returns class '{}' by value", expr.spelling)));
                }
                if expr.reference && !expr.is_const {
                    return Err(err(format!("{site} returns a non-const reference")));
                }
                base
            }
            1 if !expr.reference => match base {
                TypeRef::Void => TypeRef::Primitive(Primitive::VoidPtr),
                TypeRef::Interface(_) if is_template_ref => {
                    return Err(err(format!("{site} returns a pointer to '{}'", self.naming.ref_ptr)));
                }
                pointee => TypeRef::Pointer {
                    pointee: Box::new(pointee),
                    count: None,
                },
            },
            _ => {
                return Err(err(format!(
                    "{site} returns unsupported type '{}'",
                    expr.spelling
                )));
            }
        };

        let returns_interface = matches!(&ty, TypeRef::Interface(_))
            || matches!(&ty, TypeRef::Pointer { pointee, .. } if matches!(**pointee, TypeRef::Interface(_)));
        let ownership = match raw.attrs.get("return") {
            Some(value) if !returns_interface => {
                return Err(raw
                    .attrs
                    .error(format!("'return={value}' on {site}, which does not return an interface")));
            }
            Some("owned") => Ownership::Owned,
            Some("borrowed") if raw.is_static => {
                return Err(raw
                    .attrs
                    .error(format!("static method {site} cannot return a borrowed reference")));
            }
            Some("borrowed") => Ownership::Borrowed,
            Some(other) => {
                return Err(raw
                    .attrs
                    .error(format!("'return={other}' must be 'owned' or 'borrowed'")));
            }
            None if returns_interface || ty == TypeRef::String => Ownership::Owned,
            None => Ownership::Copied,
        };
        Ok((ty, ownership))
    }
}

fn check_identifier(name: &str, attrs: &Attributes) -> Result<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(attrs.error(format!("'capi_name={name}' is not a C identifier")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> HeaderModel {
        parse_header(src, &ParseOptions::default()).unwrap()
    }

    fn parse_err(src: &str) -> ParseError {
        parse_header(src, &ParseOptions::default()).unwrap_err()
    }

    const BROWSER: &str = r#"
#ifndef _CEF_H
#define _CEF_H
#include "cef_base.h"

class CefFrame;

// Thread identifiers.
enum CefThreadId {
  TID_UI = 0,
  TID_IO,
};

struct CefRect {
  int x;
  int y;
  int width;
  int height;
};

typedef long int64;

///
// Class used to represent a browser window.
///
/*--cef(source=library)--*/
class CefBrowser : public virtual CefBase {
 public:
  ///
  // Create a new browser window.
  ///
  /*--cef(optional_param=url)--*/
  static CefRefPtr<CefBrowser> Create(const CefString& url);

  // Returns true if the browser can navigate backwards.
  virtual bool CanGoBack() =0;

  /*--cef(capi_name=get_main_frame)--*/
  virtual CefRefPtr<CefFrame> GetMainFrame() =0;

  virtual void GetFrameNames(std::vector<CefString>& names) =0;

  virtual int64 GetIdentifier() const =0;

 protected:
  virtual void Hidden() =0;

 private:
  int refct_;
};

class CefFrame : public CefBase {
 public:
  CefFrame() {}
  virtual ~CefFrame() {}
  virtual CefString GetURL() =0;
  void NotVirtual() { }
  virtual void SetRect(const CefRect& rect, CefRect* out_rect) =0;
};

#endif
"#;

    #[test]
    fn parses_classes_in_declaration_order() {
        let model = parse(BROWSER);
        let names: Vec<_> = model.classes().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["CefBrowser", "CefFrame"]);

        let browser = model.class("CefBrowser").unwrap();
        assert!(browser.ref_counted);
        assert_eq!(browser.base, None);
        let methods: Vec<_> = browser.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            methods,
            vec!["Create", "CanGoBack", "GetMainFrame", "GetFrameNames", "GetIdentifier"]
        );
    }

    #[test]
    fn keeps_doc_comments() {
        let model = parse(BROWSER);
        let browser = model.class("CefBrowser").unwrap();
        assert_eq!(browser.doc, vec!["Class used to represent a browser window."]);
        assert_eq!(browser.methods[0].doc, vec!["Create a new browser window."]);
        assert_eq!(
            browser.methods[1].doc,
            vec!["Returns true if the browser can navigate backwards."]
        );
        assert_eq!(model.enum_def("CefThreadId").unwrap().doc, vec!["Thread identifiers."]);
    }

    #[test]
    fn resolves_types_and_attributes() {
        let model = parse(BROWSER);
        let browser = model.class("CefBrowser").unwrap();

        let create = &browser.methods[0];
        assert!(create.is_static);
        assert_eq!(create.ret, TypeRef::Interface("CefBrowser".into()));
        assert_eq!(create.ret_ownership, Ownership::Owned);
        assert_eq!(create.params[0].ty, TypeRef::String);
        assert_eq!(create.params[0].direction, Direction::In);
        assert_eq!(create.params[0].ownership, Ownership::Copied);
        assert!(create.params[0].optional);

        assert_eq!(browser.methods[2].capi_name.as_deref(), Some("get_main_frame"));

        let names = &browser.methods[3].params[0];
        assert_eq!(names.direction, Direction::InOut);
        assert_eq!(names.ownership, Ownership::Owned);
        assert!(matches!(names.ty, TypeRef::Array { length: ArrayLength::Dynamic, .. }));

        let id = &browser.methods[4];
        assert!(id.is_const);
        assert_eq!(id.ret, TypeRef::Primitive(Primitive::Long));
        assert_eq!(id.ret_spelling, "int64");
    }

    #[test]
    fn struct_pointer_is_in_out() {
        let model = parse(BROWSER);
        let frame = model.class("CefFrame").unwrap();
        let set_rect = frame.methods.iter().find(|m| m.name == "SetRect").unwrap();
        assert_eq!(set_rect.params[0].direction, Direction::In);
        assert_eq!(set_rect.params[0].passing, Passing::Reference);
        assert_eq!(set_rect.params[1].direction, Direction::InOut);
        assert_eq!(set_rect.params[1].passing, Passing::Pointer);
    }

    #[test]
    fn skips_non_public_and_special_members() {
        let model = parse(BROWSER);
        let frame = model.class("CefFrame").unwrap();
        let methods: Vec<_> = frame.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["GetURL", "SetRect"]);
        let browser = model.class("CefBrowser").unwrap();
        assert!(browser.methods.iter().all(|m| m.name != "Hidden"));
    }

    #[test]
    fn enum_values_keep_initializers() {
        let model = parse(BROWSER);
        let e = model.enum_def("CefThreadId").unwrap();
        assert_eq!(e.values[0].value.as_deref(), Some("0"));
        assert_eq!(e.values[1].value, None);
    }

    #[test]
    fn non_ref_counted_class() {
        let model = parse("class CefTask { public: virtual void Execute() =0; };");
        assert!(!model.class("CefTask").unwrap().ref_counted);
    }

    #[test]
    fn inherited_base_recorded() {
        let model = parse(
            "class CefA : public CefBase { public: virtual int A() =0; };\n\
             class CefB : public CefA { public: virtual int B() =0; };",
        );
        let b = model.class("CefB").unwrap();
        assert!(b.ref_counted);
        assert_eq!(b.base.as_deref(), Some("CefA"));
    }

    #[test]
    fn namespaces_are_transparent() {
        let model = parse("namespace outer { namespace { class CefA : public CefBase { public: virtual void Go() =0; }; } }");
        assert!(model.class("CefA").is_some());
    }

    #[test]
    fn bool_struct_fields_are_rejected() {
        let err = parse_err("struct CefRect { int x; bool visible; };");
        assert_eq!(err.construct, "struct field");
        assert!(err.detail.contains("visible"), "{}", err.detail);

        let err = parse_err("typedef bool flag_t;\nstruct CefFlags { flag_t bits[4]; };");
        assert_eq!(err.construct, "struct field");
    }

    #[test]
    fn counted_pointer() {
        let model = parse(
            "struct CefRect { int x; };\n\
             class CefA : public CefBase { public:\n\
             /*--cef(count=rects:rect_count)--*/\n\
             virtual void Set(const CefRect* rects, size_t rect_count) =0; };",
        );
        let set = &model.class("CefA").unwrap().methods[0];
        assert_eq!(set.params[0].count_param.as_deref(), Some("rect_count"));
        assert!(set.is_count_param("rect_count"));
        assert_eq!(
            set.params[0].ty,
            TypeRef::Pointer {
                pointee: Box::new(TypeRef::Struct("CefRect".into())),
                count: Some("rect_count".into()),
            }
        );
    }

    #[test]
    fn interface_transfer_and_borrow() {
        let model = parse(
            "class CefB : public CefBase { public: };\n\
             class CefA : public CefBase { public:\n\
             /*--cef(transfer=b)--*/\n\
             virtual void Take(CefRefPtr<CefB> b, CefRefPtr<CefB> c) =0;\n\
             /*--cef(return=borrowed)--*/\n\
             virtual CefRefPtr<CefB> Peek() =0; };",
        );
        let a = model.class("CefA").unwrap();
        assert_eq!(a.methods[0].params[0].ownership, Ownership::Owned);
        assert_eq!(a.methods[0].params[1].ownership, Ownership::Borrowed);
        assert_eq!(a.methods[1].ret_ownership, Ownership::Borrowed);
    }

    #[test]
    fn fixed_array_parameter() {
        let model = parse("class CefA : public CefBase { public: virtual void Get(int values[4]) =0; };");
        let p = &model.class("CefA").unwrap().methods[0].params[0];
        assert_eq!(
            p.ty,
            TypeRef::Array {
                element: Box::new(TypeRef::Primitive(Primitive::Int)),
                length: ArrayLength::Fixed(4),
            }
        );
        assert_eq!(p.direction, Direction::InOut);
    }

    #[test]
    fn rejects_unresolved_type() {
        let err = parse_err("class CefA : public CefBase { public: virtual void F(CefMissing m) =0; };");
        assert!(err.detail.contains("unresolved type name 'CefMissing'"));
        assert_eq!(err.location.line, 1);
    }

    #[test]
    fn rejects_duplicate_class() {
        let err = parse_err("class CefA : public CefBase { };\nclass CefA : public CefBase { };");
        assert_eq!(err.construct, "class");
        assert_eq!(err.location, Location::new(2, 1));
    }

    #[test]
    fn rejects_unknown_attribute_key() {
        let err = parse_err(
            "class CefA : public CefBase { public:\n/*--cef(owner=x)--*/\nvirtual void F(int x) =0; };",
        );
        assert_eq!(err.construct, "attribute");
        assert!(err.detail.contains("unknown key 'owner'"));
    }

    #[test]
    fn rejects_attribute_naming_no_parameter() {
        let err = parse_err(
            "class CefA : public CefBase { public:\n/*--cef(optional_param=y)--*/\nvirtual void F(const CefString& x) =0; };",
        );
        assert!(err.detail.contains("names no parameter"));
    }

    #[test]
    fn rejects_transfer_and_borrow_together() {
        let err = parse_err(
            "class CefA : public CefBase { public:\n/*--cef(transfer=a,borrow=a)--*/\nvirtual void F(CefRefPtr<CefA> a) =0; };",
        );
        assert!(err.detail.contains("both name 'a'"));
    }

    #[test]
    fn rejects_ownership_on_value_param() {
        let err = parse_err(
            "class CefA : public CefBase { public:\n/*--cef(transfer=x)--*/\nvirtual void F(int x) =0; };",
        );
        assert!(err.detail.contains("value-typed"));
    }

    #[test]
    fn rejects_transfer_on_out_param() {
        let err = parse_err(
            "class CefA : public CefBase { public:\n/*--cef(transfer=a)--*/\nvirtual void F(CefRefPtr<CefA>& a) =0; };",
        );
        assert!(err.detail.contains("in-out parameter 'a'"));
    }

    #[test]
    fn rejects_bad_return_attribute() {
        let err = parse_err(
            "class CefA : public CefBase { public:\n/*--cef(return=shared)--*/\nvirtual CefRefPtr<CefA> F() =0; };",
        );
        assert!(err.detail.contains("must be 'owned' or 'borrowed'"));

        let err = parse_err(
            "class CefA : public CefBase { public:\n/*--cef(return=owned)--*/\nvirtual int F() =0; };",
        );
        assert!(err.detail.contains("does not return an interface"));
    }

    #[test]
    fn rejects_count_with_missing_or_non_integer_count() {
        let err = parse_err(
            "class CefA : public CefBase { public:\n/*--cef(count=v:n)--*/\nvirtual void F(const int* v) =0; };",
        );
        assert!(err.detail.contains("count parameter 'n'"));

        let err = parse_err(
            "class CefA : public CefBase { public:\n/*--cef(count=v:n)--*/\nvirtual void F(const int* v, double n) =0; };",
        );
        assert!(err.detail.contains("integer primitive"));
    }

    #[test]
    fn rejects_out_on_const_reference() {
        let err = parse_err(
            "class CefA : public CefBase { public:\n/*--cef(out=s)--*/\nvirtual void F(const CefString& s) =0; };",
        );
        assert!(err.detail.contains("non-const reference"));
    }

    #[test]
    fn rejects_unsupported_shapes() {
        for src in [
            "class CefA : public CefBase { public: virtual void F(void (*cb)(int)) =0; };",
            "class CefA : public CefBase { public: virtual void F(std::map<int, int> m) =0; };",
            "class CefA : public CefBase { public: virtual void F(int** p) =0; };",
            "class CefA : public CefBase { public: virtual void F(std::vector<std::vector<int>> v) =0; };",
        ] {
            assert_eq!(parse_err(src).construct, "parameter", "{src}");
        }
    }

    #[test]
    fn rejects_unnamed_parameter() {
        let err = parse_err("class CefA : public CefBase { public: virtual void F(int) =0; };");
        assert!(err.detail.contains("unnamed parameter"));
    }

    #[test]
    fn rejects_multiple_inheritance() {
        let err = parse_err("class CefB : public CefBase {};\nclass CefA : public CefBase, public CefB { };");
        assert!(err.detail.contains("multiple inheritance"));
    }

    #[test]
    fn rejects_unterminated_attribute() {
        let err = parse_err("/*--cef(source=library\nclass CefA : public CefBase { };");
        assert_eq!(err.construct, "attribute");
    }

    #[test]
    fn rejects_forward_declared_but_undefined_class() {
        let err = parse_err(
            "class CefB;\nclass CefA : public CefBase { public: virtual void F(CefRefPtr<CefB> b) =0; };",
        );
        assert!(err.detail.contains("declared but never defined"));
    }

    #[test]
    fn typedef_chains_resolve() {
        let model = parse(
            "typedef int base_t;\ntypedef base_t alias_t;\n\
             class CefA : public CefBase { public: virtual alias_t F() =0; };",
        );
        assert_eq!(
            model.class("CefA").unwrap().methods[0].ret,
            TypeRef::Primitive(Primitive::Int)
        );
        assert_eq!(model.typedefs().len(), 2);
    }
}
