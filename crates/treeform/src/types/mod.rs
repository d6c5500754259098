//! Core type vocabulary of the normalizer.
//!
//! This module holds the error taxonomy, the declared-type descriptors used
//! for transformer dispatch, and the `Signature` metadata every transformer
//! registration carries. Runtime values live in [`values`], declarations in
//! [`declare`].

pub mod declare;
pub mod values;

use std::fmt;

// Re-export everything at the types:: level.
pub use declare::{AttrInstance, EnumDecl, EnumVariant, FieldDecl, RecordDecl, VariantValue};
pub use values::{BagValue, EnumValue, IterValue, MapKey, Node, RecordValue, Value};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors that can occur while normalizing a value.
///
/// Every variant carries a stable numeric code (see [`NormalizeError::code`])
/// so callers can match on failures without parsing messages. All errors are
/// fatal for the `normalize` call that raised them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The default step reached a value kind it cannot represent as a node.
    TypeUnhandled { kind: String },
    /// An object was entered twice on the same traversal stack.
    CircularReference { type_name: String },
    /// A value transformer declares no parameters.
    TransformerMissingParameter { signature: String },
    /// A value transformer declares more than two parameters.
    TransformerTooManyParameters { signature: String, count: usize },
    /// A value transformer's second parameter is not a callable.
    TransformerSecondParameterNotCallable { signature: String },
    /// A key transformer declares more than one parameter.
    KeyTransformerTooManyParameters { signature: String, count: usize },
    /// A key transformer's parameter is not a string or integer.
    KeyTransformerInvalidParameterType { signature: String, declared: String },
}

impl NormalizeError {
    /// Stable error code, unique per variant.
    pub fn code(&self) -> u32 {
        match self {
            NormalizeError::TypeUnhandled { .. } => 1695062925,
            NormalizeError::CircularReference { .. } => 1695064016,
            NormalizeError::TransformerMissingParameter { .. } => 1695064946,
            NormalizeError::TransformerTooManyParameters { .. } => 1695065433,
            NormalizeError::TransformerSecondParameterNotCallable { .. } => 1695065710,
            NormalizeError::KeyTransformerTooManyParameters { .. } => 1701701102,
            NormalizeError::KeyTransformerInvalidParameterType { .. } => 1701706316,
        }
    }
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::TypeUnhandled { kind } => {
                write!(f, "value of kind `{}` cannot be normalized", kind)
            }
            NormalizeError::CircularReference { type_name } => {
                write!(
                    f,
                    "circular reference detected while normalizing object of type `{}`",
                    type_name
                )
            }
            NormalizeError::TransformerMissingParameter { signature } => {
                write!(
                    f,
                    "transformer `{}` must declare at least one parameter",
                    signature
                )
            }
            NormalizeError::TransformerTooManyParameters { signature, count } => {
                write!(
                    f,
                    "transformer `{}` declares {} parameters, at most 2 are allowed",
                    signature, count
                )
            }
            NormalizeError::TransformerSecondParameterNotCallable { signature } => {
                write!(
                    f,
                    "second parameter of transformer `{}` must be a callable",
                    signature
                )
            }
            NormalizeError::KeyTransformerTooManyParameters { signature, count } => {
                write!(
                    f,
                    "key transformer `{}` declares {} parameters, at most 1 is allowed",
                    signature, count
                )
            }
            NormalizeError::KeyTransformerInvalidParameterType { signature, declared } => {
                write!(
                    f,
                    "parameter of key transformer `{}` must be a string or integer, got `{}`",
                    signature, declared
                )
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

// ──────────────────────────────────────────────
// Type descriptors
// ──────────────────────────────────────────────

/// Refinement on the integer kind: the numeric predicate must also hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntRefinement {
    Positive,
    Negative,
}

/// Declared parameter type of a transformer, used to decide whether a
/// transformer applies to a runtime value.
///
/// Matching is shallow on container kinds: `Sequence`/`Mapping` only check
/// the outer kind, element correctness falls out of recursion.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// Matches every value.
    Any,
    /// Matches any object-shaped value (records, bags, enum variants,
    /// date/time values, time zones, callables).
    AnyObject,
    /// Matches anything that can be traversed, eagerly or lazily.
    Iterable,
    /// Matches opaque callables; also the required second-parameter type of
    /// two-parameter transformers.
    Callable,
    Null,
    Bool,
    Int(Option<IntRefinement>),
    Float,
    String,
    /// Ordered collection; the element descriptor is informational only.
    Sequence(Option<Box<TypeDescriptor>>),
    /// Key-preserving collection, `(key, value)` descriptors.
    Mapping(Box<TypeDescriptor>, Box<TypeDescriptor>),
    /// A record identity; matches the identity itself and its descendants.
    Record(String),
    /// An enumeration identity.
    Enum(String),
    /// Matches when any member matches.
    Union(Vec<TypeDescriptor>),
    /// Matches when all members match.
    Intersection(Vec<TypeDescriptor>),
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Any => write!(f, "any"),
            TypeDescriptor::AnyObject => write!(f, "object"),
            TypeDescriptor::Iterable => write!(f, "iterable"),
            TypeDescriptor::Callable => write!(f, "callable"),
            TypeDescriptor::Null => write!(f, "null"),
            TypeDescriptor::Bool => write!(f, "bool"),
            TypeDescriptor::Int(None) => write!(f, "int"),
            TypeDescriptor::Int(Some(IntRefinement::Positive)) => write!(f, "positive-int"),
            TypeDescriptor::Int(Some(IntRefinement::Negative)) => write!(f, "negative-int"),
            TypeDescriptor::Float => write!(f, "float"),
            TypeDescriptor::String => write!(f, "string"),
            TypeDescriptor::Sequence(None) => write!(f, "list"),
            TypeDescriptor::Sequence(Some(of)) => write!(f, "list<{}>", of),
            TypeDescriptor::Mapping(key, of) => write!(f, "map<{}, {}>", key, of),
            TypeDescriptor::Record(identity) | TypeDescriptor::Enum(identity) => {
                write!(f, "{}", identity)
            }
            TypeDescriptor::Union(members) => {
                let rendered: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "{}", rendered.join(" | "))
            }
            TypeDescriptor::Intersection(members) => {
                let rendered: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "{}", rendered.join(" & "))
            }
        }
    }
}

// ──────────────────────────────────────────────
// Declared signatures
// ──────────────────────────────────────────────

/// Declared parameter list of a transformer callable or attribute method.
///
/// Registrations carry signatures as data; the registry validates them and
/// the planner matches the first parameter against the visited value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<TypeDescriptor>,
}

impl Signature {
    pub fn of(params: impl IntoIterator<Item = TypeDescriptor>) -> Signature {
        Signature {
            params: params.into_iter().collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "({})", rendered.join(", "))
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
