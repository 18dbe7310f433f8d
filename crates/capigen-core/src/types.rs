//! Primitive scalar set and the syntactic form of a declared type.
//!
//! [`parse_type`] reads a declaration's type (qualifiers, base name,
//! template arguments, `*`/`&` declarators). Name resolution against the
//! model happens later in the parser's second pass.

use serde::Serialize;

use crate::error::{ParseError, Result};
use crate::lexer::{Cursor, TokenKind};

/// The closed set of C scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    SizeT,
    /// `void*` passed as an opaque handle.
    VoidPtr,
}

impl Primitive {
    /// Spelling on the C side of the boundary.
    pub fn c_name(&self) -> &'static str {
        match self {
            Primitive::Bool => "int",
            Primitive::VoidPtr => "void*",
            other => other.native_name(),
        }
    }

    /// Spelling on the native side.
    pub fn native_name(&self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::SignedChar => "signed char",
            Primitive::UnsignedChar => "unsigned char",
            Primitive::Short => "short",
            Primitive::UnsignedShort => "unsigned short",
            Primitive::Int => "int",
            Primitive::UnsignedInt => "unsigned int",
            Primitive::Long => "long",
            Primitive::UnsignedLong => "unsigned long",
            Primitive::LongLong => "long long",
            Primitive::UnsignedLongLong => "unsigned long long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Int8 => "int8_t",
            Primitive::Int16 => "int16_t",
            Primitive::Int32 => "int32_t",
            Primitive::Int64 => "int64_t",
            Primitive::UInt8 => "uint8_t",
            Primitive::UInt16 => "uint16_t",
            Primitive::UInt32 => "uint32_t",
            Primitive::UInt64 => "uint64_t",
            Primitive::SizeT => "size_t",
            Primitive::VoidPtr => "void*",
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            Primitive::Bool | Primitive::Float | Primitive::Double | Primitive::VoidPtr
        )
    }

    /// Value returned when a call cannot be made.
    pub fn empty_value(&self) -> &'static str {
        match self {
            Primitive::Bool => "false",
            Primitive::VoidPtr => "NULL",
            _ => "0",
        }
    }
}

impl std::fmt::Display for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.native_name())
    }
}

/// Base of a declared type before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseType {
    Void,
    Primitive(Primitive),
    /// Possibly qualified name, e.g. `CefRect` or `std::wstring`.
    Named(String),
    /// `Name<args>`, e.g. `CefRefPtr<CefFrame>` or `std::vector<CefString>`.
    Template { name: String, args: Vec<TypeExpr> },
}

/// A declared type as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub is_const: bool,
    pub base: BaseType,
    pub pointers: u8,
    pub reference: bool,
    /// Source spelling, normalised to single spaces.
    pub spelling: String,
}

impl TypeExpr {
    pub fn is_void(&self) -> bool {
        self.base == BaseType::Void && self.pointers == 0
    }
}

/// Parse a type starting at the cursor.
pub fn parse_type(cur: &mut Cursor<'_>, construct: &str) -> Result<TypeExpr> {
    let mut is_const = false;
    while cur.eat_ident("const") {
        is_const = true;
    }
    // Elaborated specifiers add nothing to the shape.
    for keyword in ["struct", "enum", "class", "typename"] {
        cur.eat_ident(keyword);
    }

    let base = parse_base(cur, construct)?;

    while cur.eat_ident("const") {
        is_const = true;
    }

    let mut pointers = 0u8;
    let mut reference = false;
    loop {
        if cur.eat_punct('*') {
            pointers += 1;
            // `T* const` qualifies the pointer itself.
            cur.eat_ident("const");
        } else if cur.eat_punct('&') {
            if reference {
                return Err(ParseError::new(
                    construct,
                    cur.location(),
                    "rvalue references are not supported",
                ));
            }
            reference = true;
        } else {
            break;
        }
    }

    let mut expr = TypeExpr {
        is_const,
        base,
        pointers,
        reference,
        spelling: String::new(),
    };
    expr.spelling = spell(&expr);
    Ok(expr)
}

fn parse_base(cur: &mut Cursor<'_>, construct: &str) -> Result<BaseType> {
    if let Some(p) = parse_primitive_keywords(cur) {
        return Ok(p);
    }

    let mut name = String::new();
    if cur.eat_scope() {
        name.push_str("::");
    }
    name.push_str(&cur.expect_ident(construct)?);
    while cur.eat_scope() {
        name.push_str("::");
        name.push_str(&cur.expect_ident(construct)?);
    }

    if let Some(p) = named_primitive(&name) {
        return Ok(BaseType::Primitive(p));
    }

    if !cur.eat_punct('<') {
        return Ok(BaseType::Named(name));
    }

    let mut args = Vec::new();
    loop {
        args.push(parse_type(cur, construct)?);
        if cur.eat_punct(',') {
            continue;
        }
        cur.expect_punct('>', construct)?;
        break;
    }
    Ok(BaseType::Template { name, args })
}

/// Multi-keyword builtin types (`unsigned long long`, `void` ...).
fn parse_primitive_keywords(cur: &mut Cursor<'_>) -> Option<BaseType> {
    fn word<'t>(cur: &Cursor<'t>, offset: usize) -> Option<&'t str> {
        cur.peek_at(offset).and_then(|t| match &t.kind {
            TokenKind::Ident(s) => Some(s.as_str()),
            _ => None,
        })
    }

    let first = word(cur, 0)?;
    let is_unsigned = first == "unsigned";
    let is_signed = first == "signed";

    if is_unsigned || is_signed {
        cur.next();
        let p = match word(cur, 0) {
            Some("char") => {
                cur.next();
                if is_unsigned { Primitive::UnsignedChar } else { Primitive::SignedChar }
            }
            Some("short") => {
                cur.next();
                cur.eat_ident("int");
                if is_unsigned { Primitive::UnsignedShort } else { Primitive::Short }
            }
            Some("int") => {
                cur.next();
                if is_unsigned { Primitive::UnsignedInt } else { Primitive::Int }
            }
            Some("long") => {
                cur.next();
                let long_long = cur.eat_ident("long");
                cur.eat_ident("int");
                match (long_long, is_unsigned) {
                    (true, true) => Primitive::UnsignedLongLong,
                    (true, false) => Primitive::LongLong,
                    (false, true) => Primitive::UnsignedLong,
                    (false, false) => Primitive::Long,
                }
            }
            _ => {
                if is_unsigned { Primitive::UnsignedInt } else { Primitive::Int }
            }
        };
        return Some(BaseType::Primitive(p));
    }

    let base = match first {
        "void" => {
            cur.next();
            BaseType::Void
        }
        "short" => {
            cur.next();
            cur.eat_ident("int");
            BaseType::Primitive(Primitive::Short)
        }
        "long" => {
            cur.next();
            if cur.eat_ident("long") {
                cur.eat_ident("int");
                BaseType::Primitive(Primitive::LongLong)
            } else {
                cur.eat_ident("int");
                BaseType::Primitive(Primitive::Long)
            }
        }
        _ => return None,
    };
    Some(base)
}

/// Single-word primitive names, including the stdint family.
pub fn named_primitive(name: &str) -> Option<Primitive> {
    let p = match name {
        "bool" => Primitive::Bool,
        "char" => Primitive::Char,
        "int" => Primitive::Int,
        "float" => Primitive::Float,
        "double" => Primitive::Double,
        "int8_t" => Primitive::Int8,
        "int16_t" => Primitive::Int16,
        "int32_t" => Primitive::Int32,
        "int64_t" => Primitive::Int64,
        "uint8_t" => Primitive::UInt8,
        "uint16_t" => Primitive::UInt16,
        "uint32_t" => Primitive::UInt32,
        "uint64_t" => Primitive::UInt64,
        "size_t" | "std::size_t" => Primitive::SizeT,
        _ => return None,
    };
    Some(p)
}

fn spell(expr: &TypeExpr) -> String {
    let mut out = String::new();
    if expr.is_const {
        out.push_str("const ");
    }
    out.push_str(&spell_base(&expr.base));
    for _ in 0..expr.pointers {
        out.push('*');
    }
    if expr.reference {
        out.push('&');
    }
    out
}

fn spell_base(base: &BaseType) -> String {
    match base {
        BaseType::Void => "void".to_string(),
        BaseType::Primitive(p) => p.native_name().to_string(),
        BaseType::Named(n) => n.clone(),
        BaseType::Template { name, args } => {
            let args: Vec<_> = args.iter().map(spell).collect();
            format!("{name}<{}>", args.join(", "))
        }
    }
}
