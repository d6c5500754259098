//! Descriptor-vs-value matching.
//!
//! Matching answers one question: does this runtime value satisfy this
//! declared parameter type? It is used only to select transformers; no
//! coercion ever happens. Container descriptors match shallowly on the
//! outer kind; element correctness falls out of recursion.

use crate::types::values::Value;
use crate::types::{IntRefinement, TypeDescriptor};

/// Whether `value` satisfies the declared `descriptor`.
pub fn matches(descriptor: &TypeDescriptor, value: &Value) -> bool {
    match descriptor {
        TypeDescriptor::Any => true,
        TypeDescriptor::AnyObject => matches!(
            value,
            Value::Record(_)
                | Value::Bag(_)
                | Value::Enum(_)
                | Value::DateTime(_)
                | Value::TimeZone(_)
                | Value::Callable(_)
        ),
        TypeDescriptor::Iterable => {
            matches!(value, Value::Seq(_) | Value::Map(_) | Value::Iter(_))
        }
        TypeDescriptor::Callable => matches!(value, Value::Callable(_)),
        TypeDescriptor::Null => matches!(value, Value::Null),
        TypeDescriptor::Bool => matches!(value, Value::Bool(_)),
        TypeDescriptor::Int(refinement) => match value {
            Value::Int(i) => match refinement {
                None => true,
                Some(IntRefinement::Positive) => *i > 0,
                Some(IntRefinement::Negative) => *i < 0,
            },
            _ => false,
        },
        TypeDescriptor::Float => matches!(value, Value::Float(_)),
        TypeDescriptor::String => matches!(value, Value::Str(_)),
        TypeDescriptor::Sequence(_) => matches!(value, Value::Seq(_)),
        TypeDescriptor::Mapping(_, _) => matches!(value, Value::Map(_)),
        TypeDescriptor::Record(identity) => match value {
            Value::Record(record) => record.decl().is_kind_of(identity),
            _ => false,
        },
        TypeDescriptor::Enum(identity) => match value {
            Value::Enum(e) => e.decl.name == *identity,
            _ => false,
        },
        TypeDescriptor::Union(members) => members.iter().any(|m| matches(m, value)),
        TypeDescriptor::Intersection(members) => members.iter().all(|m| matches(m, value)),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
