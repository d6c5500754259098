//! Transformer registry and signature validation.
//!
//! The registry stores free transformer registrations in a stable vector
//! (the position is the insertion index) and the set of registered attribute
//! identities. It is cheap to clone: callables and attribute instances are
//! `Rc`-shared, so the façade can hand each normalizer an independent frozen
//! snapshot.

use std::collections::HashSet;
use std::rc::Rc;

use crate::transformer::{FreeTransformer, TransformerFn};
use crate::types::{NormalizeError, Signature, TypeDescriptor};

#[derive(Clone, Default)]
pub(crate) struct Registry {
    pub(crate) transformers: Vec<Rc<FreeTransformer>>,
    attribute_identities: HashSet<String>,
}

impl Registry {
    pub(crate) fn new() -> Registry {
        Registry::default()
    }

    pub(crate) fn add_transformer(
        &mut self,
        signature: Signature,
        priority: i32,
        callable: TransformerFn,
    ) {
        self.transformers.push(Rc::new(FreeTransformer {
            signature,
            priority,
            callable,
        }));
    }

    pub(crate) fn add_attribute_identity(&mut self, identity: impl Into<String>) {
        self.attribute_identities.insert(identity.into());
    }

    /// Whether an attribute instance participates in dispatch: either its
    /// concrete identity or one of its declared abstractions is registered.
    /// An instance reachable through both resolves to one binding.
    pub(crate) fn is_registered(&self, identity: &str, abstractions: &[&str]) -> bool {
        self.attribute_identities.contains(identity)
            || abstractions
                .iter()
                .any(|a| self.attribute_identities.contains(*a))
    }

    /// Validate every free registration. Run at the start of each
    /// `normalize` call, before any dispatch; idempotent.
    pub(crate) fn validate(&self) -> Result<(), NormalizeError> {
        for transformer in &self.transformers {
            let symbol = format!("fn{}", transformer.signature);
            validate_transformer_signature(&symbol, &transformer.signature)?;
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Signature validation
// ──────────────────────────────────────────────

/// Validate the declared signature of a value transformer: one or two
/// parameters, the second (if any) being exactly a callable.
pub(crate) fn validate_transformer_signature(
    symbol: &str,
    signature: &Signature,
) -> Result<(), NormalizeError> {
    match signature.arity() {
        0 => Err(NormalizeError::TransformerMissingParameter {
            signature: symbol.to_string(),
        }),
        1 => Ok(()),
        2 => {
            if signature.params[1] == TypeDescriptor::Callable {
                Ok(())
            } else {
                Err(NormalizeError::TransformerSecondParameterNotCallable {
                    signature: symbol.to_string(),
                })
            }
        }
        count => Err(NormalizeError::TransformerTooManyParameters {
            signature: symbol.to_string(),
            count,
        }),
    }
}

/// Validate the declared signature of a key transformer: zero or one
/// parameter accepting only strings or integers.
pub(crate) fn validate_key_signature(
    symbol: &str,
    signature: &Signature,
) -> Result<(), NormalizeError> {
    match signature.arity() {
        0 => Ok(()),
        1 => {
            if is_key_type(&signature.params[0]) {
                Ok(())
            } else {
                Err(NormalizeError::KeyTransformerInvalidParameterType {
                    signature: symbol.to_string(),
                    declared: signature.params[0].to_string(),
                })
            }
        }
        count => Err(NormalizeError::KeyTransformerTooManyParameters {
            signature: symbol.to_string(),
            count,
        }),
    }
}

fn is_key_type(descriptor: &TypeDescriptor) -> bool {
    match descriptor {
        TypeDescriptor::String | TypeDescriptor::Int(_) => true,
        TypeDescriptor::Union(members) => {
            !members.is_empty() && members.iter().all(is_key_type)
        }
        _ => false,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
