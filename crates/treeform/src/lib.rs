//! treeform -- normalizes arbitrary runtime values into canonical trees of
//! primitive nodes.
//!
//! A [`Value`] enters the engine; user-registered transformers (free
//! callables and attribute-bound operations) are resolved into an ordered
//! dispatch chain, composed through a [`Next`] continuation that re-enters
//! the default per-kind normalization; the resulting [`Node`] tree is shaped
//! by an output [`Format`].
//!
//! ```
//! use treeform::{Node, NormalizerBuilder, TreeFormat, Value};
//!
//! let normalizer = NormalizerBuilder::new().normalizer(TreeFormat);
//! let node = normalizer.normalize(&Value::Int(42)).unwrap();
//! assert_eq!(node, Node::Int(42));
//! ```

mod chain;
mod engine;
pub mod format;
pub mod matcher;
mod registry;
pub mod transformer;
pub mod types;

use std::rc::Rc;

use engine::Engine;
use registry::Registry;

pub use chain::Next;
pub use format::{node_to_json, Format, JsonFormat, TreeFormat};
pub use matcher::matches;
pub use transformer::{KeyAttribute, TransformerFn, ValueAttribute};
pub use types::declare::{AttrInstance, EnumDecl, EnumVariant, FieldDecl, RecordDecl, VariantValue};
pub use types::values::{BagValue, EnumValue, IterValue, MapKey, Node, RecordValue, Value};
pub use types::{IntRefinement, NormalizeError, Signature, TypeDescriptor};

// ──────────────────────────────────────────────
// Builder façade
// ──────────────────────────────────────────────

/// Accumulates transformer registrations and hands out normalizers.
///
/// The builder is copy-on-write: cloning is cheap (registrations are
/// `Rc`-shared) and every [`Normalizer`] receives an independent frozen
/// snapshot of the registry, immutable for its lifetime.
#[derive(Clone, Default)]
pub struct NormalizerBuilder {
    registry: Registry,
}

impl NormalizerBuilder {
    pub fn new() -> NormalizerBuilder {
        NormalizerBuilder {
            registry: Registry::new(),
        }
    }

    /// Register a free transformer with its declared signature.
    ///
    /// The signature must declare one or two parameters, the second (if any)
    /// being the `next` continuation; violations surface at the first
    /// `normalize` call. Higher priorities wrap lower ones; equal priorities
    /// dispatch in registration order.
    pub fn register_transformer(
        mut self,
        signature: Signature,
        priority: i32,
        callable: impl Fn(&Value, Next<'_>) -> Result<Node, NormalizeError> + 'static,
    ) -> NormalizerBuilder {
        self.registry
            .add_transformer(signature, priority, Rc::new(callable));
        self
    }

    /// Register an attribute identity (a concrete attribute name or an
    /// abstraction attribute types declare). Attribute instances found on
    /// record types and fields participate in dispatch only when registered.
    pub fn register_attribute(mut self, identity: impl Into<String>) -> NormalizerBuilder {
        self.registry.add_attribute_identity(identity);
        self
    }

    /// Obtain a normalizer bound to an output format.
    pub fn normalizer<F: Format>(&self, format: F) -> Normalizer<F> {
        Normalizer {
            engine: Engine::new(self.registry.clone()),
            format,
        }
    }
}

// ──────────────────────────────────────────────
// Normalizer
// ──────────────────────────────────────────────

/// A normalizer bound to an output format, holding a frozen registry
/// snapshot.
pub struct Normalizer<F: Format> {
    engine: Engine,
    format: F,
}

impl<F: Format> Normalizer<F> {
    /// Normalize a value into the bound output form.
    pub fn normalize(&self, value: &Value) -> Result<F::Output, NormalizeError> {
        let node = self.engine.normalize_root(value)?;
        Ok(self.format.shape(node))
    }
}

// ──────────────────────────────────────────────
// Integration tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Appends a marker to whatever the rest of the chain produced.
    fn appending(
        marker: &'static str,
    ) -> impl Fn(&Value, Next<'_>) -> Result<Node, NormalizeError> {
        move |_value: &Value, next: Next<'_>| {
            let inner = next.call()?;
            match inner {
                Node::Str(s) => Ok(Node::Str(format!("{}{}", s, marker))),
                other => Ok(other),
            }
        }
    }

    #[test]
    fn normalize_without_transformers_is_default() {
        let normalizer = NormalizerBuilder::new().normalizer(TreeFormat);
        assert_eq!(normalizer.normalize(&Value::str("foo")).unwrap(), Node::str("foo"));
        assert_eq!(normalizer.normalize(&Value::Null).unwrap(), Node::Null);
    }

    #[test]
    fn higher_priority_wraps_lower() {
        let normalizer = NormalizerBuilder::new()
            .register_transformer(Signature::of([TypeDescriptor::String]), 0, appending("!"))
            .register_transformer(Signature::of([TypeDescriptor::String]), 10, appending("?"))
            .normalizer(TreeFormat);
        // Priority 10 runs outermost: it sees the priority-0 result.
        assert_eq!(
            normalizer.normalize(&Value::str("foo")).unwrap(),
            Node::str("foo!?")
        );
    }

    #[test]
    fn short_circuit_skips_rest_of_chain() {
        let normalizer = NormalizerBuilder::new()
            .register_transformer(Signature::of([TypeDescriptor::String]), 0, appending("!"))
            .register_transformer(Signature::of([TypeDescriptor::String]), 10, |_, _| {
                Ok(Node::str("fixed"))
            })
            .normalizer(TreeFormat);
        assert_eq!(
            normalizer.normalize(&Value::str("foo")).unwrap(),
            Node::str("fixed")
        );
    }

    #[test]
    fn next_can_be_called_more_than_once() {
        let normalizer = NormalizerBuilder::new()
            .register_transformer(Signature::of([TypeDescriptor::String]), 0, |_, next| {
                let first = next.call()?;
                let second = next.call()?;
                assert_eq!(first, second);
                Ok(first)
            })
            .normalizer(TreeFormat);
        assert_eq!(
            normalizer.normalize(&Value::str("foo")).unwrap(),
            Node::str("foo")
        );
    }

    #[test]
    fn builder_clone_is_copy_on_write() {
        let base = NormalizerBuilder::new()
            .register_transformer(Signature::of([TypeDescriptor::String]), 0, appending("!"));
        let extended = base
            .clone()
            .register_transformer(Signature::of([TypeDescriptor::String]), 0, appending("?"));

        let plain = base.normalizer(TreeFormat);
        let more = extended.normalizer(TreeFormat);
        assert_eq!(plain.normalize(&Value::str("x")).unwrap(), Node::str("x!"));
        assert_eq!(more.normalize(&Value::str("x")).unwrap(), Node::str("x!?"));
    }

    #[test]
    fn invalid_signature_surfaces_at_normalize_time() {
        let normalizer = NormalizerBuilder::new()
            .register_transformer(Signature::default(), 0, |_, next| next.call())
            .normalizer(TreeFormat);
        let err = normalizer.normalize(&Value::Int(1)).unwrap_err();
        assert_eq!(err.code(), 1695064946);
    }

    #[test]
    fn transformer_result_is_shaped_by_format() {
        let normalizer = NormalizerBuilder::new().normalizer(JsonFormat);
        let value = Value::map(vec![
            (MapKey::from("n"), Value::Int(1)),
            (MapKey::from("s"), Value::str("x")),
        ]);
        assert_eq!(
            normalizer.normalize(&value).unwrap(),
            serde_json::json!({ "n": 1, "s": "x" })
        );
    }

    #[test]
    fn transformers_see_normalized_children() {
        // The record's field values are already normalized when the
        // record-level transformer runs.
        let decl = RecordDecl::new("Wrapped")
            .with_field(FieldDecl::new("inner"))
            .declare();
        let instance = RecordValue::instance(&decl);
        instance.set("inner", Value::str("raw"));

        let normalizer = NormalizerBuilder::new()
            .register_transformer(
                Signature::of([TypeDescriptor::Record("Wrapped".to_string())]),
                0,
                |_, next| {
                    let node = next.call()?;
                    match node {
                        Node::Map(mut entries) => {
                            entries.insert(MapKey::from("extra"), Node::Bool(true));
                            Ok(Node::Map(entries))
                        }
                        other => Ok(other),
                    }
                },
            )
            .normalizer(TreeFormat);

        assert_eq!(
            normalizer.normalize(&Value::Record(instance)).unwrap(),
            Node::map(vec![
                (MapKey::from("inner"), Node::str("raw")),
                (MapKey::from("extra"), Node::Bool(true)),
            ])
        );
    }
}
