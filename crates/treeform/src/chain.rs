//! Dispatch chain assembly and the `next` continuation.
//!
//! For every visited value the planner produces an ordered list of links:
//! matching free transformers sorted by priority (descending) with ties
//! broken by registration order, then matching attribute transformers from
//! the nearest scope outward (field attributes before class attributes,
//! own class before ancestors). The default normalization step terminates
//! every chain implicitly.

use std::rc::Rc;

use crate::engine::{Context, Engine};
use crate::matcher::matches;
use crate::registry::{validate_key_signature, validate_transformer_signature, Registry};
use crate::transformer::{AttrKind, FreeTransformer, KeyAttribute, ValueAttribute};
use crate::types::declare::{AttrInstance, FieldDecl};
use crate::types::values::{Node, Value};
use crate::types::NormalizeError;

/// One resolved position of a dispatch chain.
pub(crate) enum Link {
    Free(Rc<FreeTransformer>),
    Attribute(Rc<dyn ValueAttribute>),
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Link::Free(t) => f.debug_tuple("Free").field(&t.priority).finish(),
            Link::Attribute(a) => f.debug_tuple("Attribute").field(&a.identity()).finish(),
        }
    }
}

// ──────────────────────────────────────────────
// Value chain assembly
// ──────────────────────────────────────────────

/// Build the transformer chain for `value`. `field_attrs` holds the
/// attribute instances of the record field the value was reached through
/// (empty at the root and inside plain containers).
pub(crate) fn value_chain(
    registry: &Registry,
    value: &Value,
    field_attrs: &[AttrInstance],
    ctx: &Context,
) -> Result<Vec<Link>, NormalizeError> {
    let mut free: Vec<Rc<FreeTransformer>> = registry
        .transformers
        .iter()
        .filter(|t| {
            t.signature
                .params
                .first()
                .map_or(false, |param| matches(param, value))
        })
        .cloned()
        .collect();
    // Stable sort: equal priorities keep registration order.
    free.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut links: Vec<Link> = free.into_iter().map(Link::Free).collect();

    for attr in field_attrs {
        push_value_attribute(registry, attr, value, ctx, &mut links)?;
    }

    if let Value::Record(record) = value {
        for decl in record.decl().lineage() {
            for attr in &decl.attributes {
                push_value_attribute(registry, attr, value, ctx, &mut links)?;
            }
        }
    }

    Ok(links)
}

fn push_value_attribute(
    registry: &Registry,
    attr: &AttrInstance,
    value: &Value,
    ctx: &Context,
    links: &mut Vec<Link>,
) -> Result<(), NormalizeError> {
    let attribute = match attr {
        AttrInstance::Value(a) => a,
        AttrInstance::Key(_) => return Ok(()),
    };
    if !registry.is_registered(attribute.identity(), &attribute.abstractions()) {
        return Ok(());
    }
    let signature = attribute.signature();
    if ctx.needs_validation(attribute.identity(), AttrKind::Value) {
        let symbol = format!("{}::normalize{}", attribute.identity(), signature);
        validate_transformer_signature(&symbol, &signature)?;
    }
    if signature
        .params
        .first()
        .map_or(false, |param| matches(param, value))
    {
        links.push(Link::Attribute(attribute.clone()));
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Key chain assembly
// ──────────────────────────────────────────────

/// Gather the registered key transformers of a field, in declaration order.
/// The emitted key is the field name folded through each of them.
pub(crate) fn key_chain(
    registry: &Registry,
    field: &FieldDecl,
    ctx: &Context,
) -> Result<Vec<Rc<dyn KeyAttribute>>, NormalizeError> {
    let mut chain = Vec::new();
    for attr in &field.attributes {
        let attribute = match attr {
            AttrInstance::Key(a) => a,
            AttrInstance::Value(_) => continue,
        };
        if !registry.is_registered(attribute.identity(), &attribute.abstractions()) {
            continue;
        }
        if ctx.needs_validation(attribute.identity(), AttrKind::Key) {
            let signature = attribute.signature();
            let symbol = format!("{}::normalize_key{}", attribute.identity(), signature);
            validate_key_signature(&symbol, &signature)?;
        }
        chain.push(attribute.clone());
    }
    Ok(chain)
}

// ──────────────────────────────────────────────
// Continuation
// ──────────────────────────────────────────────

/// The continuation handed to every transformer.
///
/// Bound to the remaining chain positions, the fixed subject, the engine and
/// the per-call context; `call` takes no arguments and may be invoked zero
/// or more times. The empty tail runs the default normalization step.
pub struct Next<'a> {
    pub(crate) links: &'a [Link],
    pub(crate) subject: &'a Value,
    pub(crate) engine: &'a Engine,
    pub(crate) ctx: &'a Context,
}

impl Next<'_> {
    /// Invoke the remainder of the chain for the subject.
    pub fn call(&self) -> Result<Node, NormalizeError> {
        match self.links.split_first() {
            None => self.engine.transform_default(self.subject, self.ctx),
            Some((head, rest)) => {
                let next = Next {
                    links: rest,
                    subject: self.subject,
                    engine: self.engine,
                    ctx: self.ctx,
                };
                match head {
                    Link::Free(transformer) => (transformer.callable)(self.subject, next),
                    Link::Attribute(attribute) => attribute.normalize(self.subject, next),
                }
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
