//! The type model.
//!
//! Types are small owned trees, cloned freely; the compiler works at a scale
//! where sharing buys nothing. Equality is structural for every variant
//! except product records, which are nominal: two products are the same type
//! iff they come from the same declaration, tracked by a stable id assigned
//! at registration. Aliases are transparent — equality and most inspection
//! happen on the alias-resolved form.
//!
//! `Result`, `Maybe`, `Either`, and `Array` are built-in generic
//! constructors; user code cannot re-declare them.

use std::fmt;

/// The primitive types of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Str,
    Void,
    /// The opaque type of closure values.
    Function,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Int8 => "int8",
            Builtin::Int16 => "int16",
            Builtin::Int32 => "int32",
            Builtin::Int64 => "int64",
            Builtin::Float32 => "float32",
            Builtin::Float64 => "float64",
            Builtin::Bool => "bool",
            Builtin::Str => "string",
            Builtin::Void => "void",
            Builtin::Function => "function",
        }
    }

    pub fn all() -> &'static [Builtin] {
        &[
            Builtin::Int8,
            Builtin::Int16,
            Builtin::Int32,
            Builtin::Int64,
            Builtin::Float32,
            Builtin::Float64,
            Builtin::Bool,
            Builtin::Str,
            Builtin::Void,
            Builtin::Function,
        ]
    }
}

/// A required operation of an interface: `fn name(params): ret` where the
/// interface's own name stands for "the implementing type".
#[derive(Debug, Clone, PartialEq)]
pub struct IfaceOp {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
}

/// A type.
#[derive(Debug, Clone)]
pub enum Type {
    Builtin(Builtin),
    /// A generic application such as `Array<int64>` or `Result<T>`.
    Generic { name: String, args: Vec<Type> },
    /// A user record. Nominal: identity is `decl_id`.
    Product {
        name: String,
        decl_id: u32,
        fields: Vec<(String, Type)>,
    },
    /// A transparent name for another type.
    Alias { name: String, target: Box<Type> },
    /// An interface: required operations plus required fields.
    Interface {
        name: String,
        ops: Vec<IfaceOp>,
        fields: Vec<(String, Type)>,
    },
    /// An unsolved generic parameter, bound during dispatch.
    Param(String),
}

/// Generic constructor names reserved by the language.
pub const BUILTIN_GENERICS: &[&str] = &["Array", "Result", "Maybe", "Either"];

impl Type {
    pub fn int64() -> Type {
        Type::Builtin(Builtin::Int64)
    }

    pub fn float64() -> Type {
        Type::Builtin(Builtin::Float64)
    }

    pub fn bool() -> Type {
        Type::Builtin(Builtin::Bool)
    }

    pub fn string() -> Type {
        Type::Builtin(Builtin::Str)
    }

    pub fn void() -> Type {
        Type::Builtin(Builtin::Void)
    }

    pub fn function() -> Type {
        Type::Builtin(Builtin::Function)
    }

    pub fn array_of(elem: Type) -> Type {
        Type::Generic { name: "Array".to_string(), args: vec![elem] }
    }

    pub fn result_of(elem: Type) -> Type {
        Type::Generic { name: "Result".to_string(), args: vec![elem] }
    }

    /// Unwraps alias chains. Aliases are transparent everywhere except in
    /// their display name.
    pub fn resolved(&self) -> &Type {
        match self {
            Type::Alias { target, .. } => target.resolved(),
            other => other,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.resolved(), Type::Builtin(Builtin::Void))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.resolved(),
            Type::Builtin(
                Builtin::Int8
                    | Builtin::Int16
                    | Builtin::Int32
                    | Builtin::Int64
                    | Builtin::Float32
                    | Builtin::Float64
            )
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.resolved(),
            Type::Builtin(Builtin::Int8 | Builtin::Int16 | Builtin::Int32 | Builtin::Int64)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self.resolved(), Type::Builtin(Builtin::Float32 | Builtin::Float64))
    }

    /// The inclusive value range of an integer type.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        match self.resolved() {
            Type::Builtin(Builtin::Int8) => Some((i8::MIN as i128, i8::MAX as i128)),
            Type::Builtin(Builtin::Int16) => Some((i16::MIN as i128, i16::MAX as i128)),
            Type::Builtin(Builtin::Int32) => Some((i32::MIN as i128, i32::MAX as i128)),
            Type::Builtin(Builtin::Int64) => Some((i64::MIN as i128, i64::MAX as i128)),
            _ => None,
        }
    }

    /// True if any generic parameter remains unsolved in this type.
    pub fn contains_param(&self) -> bool {
        match self {
            Type::Param(_) => true,
            Type::Builtin(_) => false,
            Type::Generic { args, .. } => args.iter().any(Type::contains_param),
            Type::Product { fields, .. } => fields.iter().any(|(_, t)| t.contains_param()),
            Type::Alias { target, .. } => target.contains_param(),
            Type::Interface { .. } => false,
        }
    }

    /// Substitutes bound generic parameters, recursively.
    pub fn substitute(&self, bindings: &[(String, Type)]) -> Type {
        match self {
            Type::Param(name) => bindings
                .iter()
                .find(|(param, _)| param == name)
                .map(|(_, ty)| ty.clone())
                .unwrap_or_else(|| self.clone()),
            Type::Generic { name, args } => Type::Generic {
                name: name.clone(),
                args: args.iter().map(|t| t.substitute(bindings)).collect(),
            },
            Type::Product { name, decl_id, fields } => Type::Product {
                name: name.clone(),
                decl_id: *decl_id,
                fields: fields
                    .iter()
                    .map(|(f, t)| (f.clone(), t.substitute(bindings)))
                    .collect(),
            },
            Type::Alias { name, target } => Type::Alias {
                name: name.clone(),
                target: Box::new(target.substitute(bindings)),
            },
            other => other.clone(),
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Type) -> bool {
        match (self.resolved(), other.resolved()) {
            (Type::Builtin(a), Type::Builtin(b)) => a == b,
            (Type::Generic { name: an, args: aa }, Type::Generic { name: bn, args: ba }) => {
                an == bn && aa == ba
            }
            // Nominal: same declaration. Field types still participate so
            // that two instantiations of one generic record stay distinct.
            (
                Type::Product { decl_id: a, fields: af, .. },
                Type::Product { decl_id: b, fields: bf, .. },
            ) => a == b && af == bf,
            (Type::Interface { name: a, .. }, Type::Interface { name: b, .. }) => a == b,
            (Type::Param(a), Type::Param(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Builtin(b) => write!(f, "{}", b.name()),
            Type::Generic { name, args } => {
                write!(f, "{}<", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            Type::Product { name, .. } => write!(f, "{}", name),
            Type::Alias { name, .. } => write!(f, "{}", name),
            Type::Interface { name, .. } => write!(f, "{}", name),
            Type::Param(name) => write!(f, "{}", name),
        }
    }
}
