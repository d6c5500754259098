//! Transformer callables and attribute abstractions.
//!
//! A free transformer is a registered callable with a declared signature and
//! a priority. Attribute transformers implement one of two abstractions:
//! [`ValueAttribute`] rewrites the normalized form of a value,
//! [`KeyAttribute`] rewrites the map key a record field is emitted under.
//! Attribute types declare which abstraction they implement; the registry
//! never probes for method presence at runtime.

use std::rc::Rc;

use crate::chain::Next;
use crate::types::values::{MapKey, Node, Value};
use crate::types::{NormalizeError, Signature};

/// A registered transformer callable. The subject is fixed at chain entry;
/// `next` re-enters the remainder of the chain for the same subject.
pub type TransformerFn = Rc<dyn Fn(&Value, Next<'_>) -> Result<Node, NormalizeError>>;

/// Which transformer abstraction an attribute binding contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum AttrKind {
    Value,
    Key,
}

/// A free transformer registration.
///
/// Insertion order is the position in the registry's stable vector; equal
/// priorities dispatch in registration order.
pub(crate) struct FreeTransformer {
    pub(crate) signature: Signature,
    pub(crate) priority: i32,
    pub(crate) callable: TransformerFn,
}

// ──────────────────────────────────────────────
// Attribute abstractions
// ──────────────────────────────────────────────

/// An attribute that customizes how the values it decorates are normalized.
///
/// `signature` is the declared parameter list of `normalize`: one or two
/// parameters, the second (if any) being the continuation. The first
/// parameter decides which values the attribute applies to.
pub trait ValueAttribute {
    /// Concrete identity this attribute registers under.
    fn identity(&self) -> &str;

    /// Abstractions this attribute declares; registering any of them makes
    /// the attribute eligible for dispatch.
    fn abstractions(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Declared parameters of `normalize`.
    fn signature(&self) -> Signature;

    fn normalize(&self, value: &Value, next: Next<'_>) -> Result<Node, NormalizeError>;
}

/// An attribute that rewrites the key a record field is emitted under.
///
/// `signature` is the declared parameter list of `normalize_key`: zero or one
/// parameter of string or integer type. A zero-parameter attribute ignores
/// the incoming key and substitutes its own configured name.
pub trait KeyAttribute {
    fn identity(&self) -> &str;

    fn abstractions(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Declared parameters of `normalize_key`.
    fn signature(&self) -> Signature;

    fn normalize_key(&self, key: &MapKey) -> MapKey;
}
