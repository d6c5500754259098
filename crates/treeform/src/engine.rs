//! Recursive normalization engine.
//!
//! The engine owns a frozen registry snapshot and drives the traversal:
//! for every value it builds a dispatch chain, invokes the head through the
//! continuation, and supplies the default per-kind step at the end of every
//! chain. A per-call context tracks which object identities are currently
//! on the traversal stack; entering one twice is fatal, while re-entering a
//! completed object is fine (shared graphs normalize, cycles do not).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::chain::{self, Next};
use crate::registry::Registry;
use crate::transformer::AttrKind;
use crate::types::declare::{AttrInstance, FieldDecl, VariantValue};
use crate::types::values::{MapKey, Node, RecordValue, Value};
use crate::types::NormalizeError;

/// Rendering of date/time values: six fractional digits and a signed
/// two-component UTC offset, e.g. `1971-11-08T00:00:00.000000+00:00`.
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

// ──────────────────────────────────────────────
// Per-call context
// ──────────────────────────────────────────────

/// State owned by a single `normalize` call.
pub(crate) struct Context {
    /// Identities of the objects currently on the traversal stack.
    on_stack: RefCell<HashSet<usize>>,
    /// Attribute signatures already validated during this call, keyed by
    /// `(identity, kind)`.
    validated_attrs: RefCell<HashSet<(String, AttrKind)>>,
}

impl Context {
    pub(crate) fn new() -> Context {
        Context {
            on_stack: RefCell::new(HashSet::new()),
            validated_attrs: RefCell::new(HashSet::new()),
        }
    }

    /// Mark an attribute signature for validation. Returns false when it was
    /// already validated during this call; each instance is checked at its
    /// first discovery only.
    pub(crate) fn needs_validation(&self, identity: &str, kind: AttrKind) -> bool {
        self.validated_attrs
            .borrow_mut()
            .insert((identity.to_string(), kind))
    }
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

pub(crate) struct Engine {
    registry: Registry,
    /// Flattened field lists memoized per record identity. Idempotent, so
    /// it may outlive individual calls.
    field_cache: RefCell<HashMap<String, Rc<Vec<FieldDecl>>>>,
}

impl Engine {
    pub(crate) fn new(registry: Registry) -> Engine {
        Engine {
            registry,
            field_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Entry point for one normalization call.
    pub(crate) fn normalize_root(&self, value: &Value) -> Result<Node, NormalizeError> {
        self.registry.validate()?;
        let ctx = Context::new();
        self.normalize_value(value, &[], &ctx)
    }

    /// Normalize one value through its dispatch chain. `field_attrs` carries
    /// the attributes of the record field the value was reached through.
    fn normalize_value(
        &self,
        value: &Value,
        field_attrs: &[AttrInstance],
        ctx: &Context,
    ) -> Result<Node, NormalizeError> {
        match value.identity() {
            Some(id) => {
                if !ctx.on_stack.borrow_mut().insert(id) {
                    return Err(NormalizeError::CircularReference {
                        type_name: value.type_label(),
                    });
                }
                let result = self.dispatch(value, field_attrs, ctx);
                ctx.on_stack.borrow_mut().remove(&id);
                result
            }
            None => self.dispatch(value, field_attrs, ctx),
        }
    }

    fn dispatch(
        &self,
        value: &Value,
        field_attrs: &[AttrInstance],
        ctx: &Context,
    ) -> Result<Node, NormalizeError> {
        let links = chain::value_chain(&self.registry, value, field_attrs, ctx)?;
        Next {
            links: &links,
            subject: value,
            engine: self,
            ctx,
        }
        .call()
    }

    // ──────────────────────────────────────────
    // Default step
    // ──────────────────────────────────────────

    /// The default normalization step, reached when a chain runs out of
    /// transformers. Recursion into children happens here, so transformers
    /// wrap already-normalized children.
    pub(crate) fn transform_default(
        &self,
        value: &Value,
        ctx: &Context,
    ) -> Result<Node, NormalizeError> {
        match value {
            Value::Null => Ok(Node::Null),
            Value::Bool(b) => Ok(Node::Bool(*b)),
            Value::Int(i) => Ok(Node::Int(*i)),
            Value::Float(f) => Ok(Node::Float(*f)),
            Value::Str(s) => Ok(Node::Str(s.clone())),
            Value::Enum(e) => Ok(match &e.decl.variants[e.variant].value {
                VariantValue::Pure => Node::Str(e.decl.variants[e.variant].name.clone()),
                VariantValue::Str(backing) => Node::Str(backing.clone()),
                VariantValue::Int(backing) => Node::Int(*backing),
            }),
            Value::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.normalize_value(item, &[], ctx)?);
                }
                Ok(Node::Seq(out))
            }
            Value::Map(entries) => {
                let mut out = IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    out.insert(key.clone(), self.normalize_value(item, &[], ctx)?);
                }
                Ok(Node::Map(out))
            }
            Value::Iter(iter) => self.transform_drained(iter.drain(), ctx),
            Value::Bag(bag) => {
                let mut out = IndexMap::new();
                for (name, item) in bag.snapshot() {
                    out.insert(MapKey::Str(name), self.normalize_value(&item, &[], ctx)?);
                }
                Ok(Node::Map(out))
            }
            Value::Record(record) => self.transform_record(record, ctx),
            Value::DateTime(dt) => Ok(Node::Str(dt.format(DATE_TIME_FORMAT).to_string())),
            Value::TimeZone(name) => Ok(Node::Str(name.clone())),
            Value::Callable(_) => Err(NormalizeError::TypeUnhandled {
                kind: value.kind().to_string(),
            }),
        }
    }

    /// A drained lazy producer becomes a list when every key is an integer
    /// (keys discarded), a key-preserving map as soon as one key is a
    /// string.
    fn transform_drained(
        &self,
        pairs: Vec<(MapKey, Value)>,
        ctx: &Context,
    ) -> Result<Node, NormalizeError> {
        let keyed = pairs.iter().any(|(key, _)| matches!(key, MapKey::Str(_)));
        if keyed {
            let mut out = IndexMap::with_capacity(pairs.len());
            for (key, item) in pairs {
                out.insert(key, self.normalize_value(&item, &[], ctx)?);
            }
            Ok(Node::Map(out))
        } else {
            let mut out = Vec::with_capacity(pairs.len());
            for (_, item) in pairs {
                out.push(self.normalize_value(&item, &[], ctx)?);
            }
            Ok(Node::Seq(out))
        }
    }

    /// Records emit one entry per declared field, ancestor-first. The key
    /// runs through the field's key-transformer chain; the value runs
    /// through the full dispatch pipeline with the field's attributes
    /// prepended. Declared fields with no stored value emit null.
    fn transform_record(
        &self,
        record: &Rc<RecordValue>,
        ctx: &Context,
    ) -> Result<Node, NormalizeError> {
        let fields = self.flat_fields(record);
        let mut out = IndexMap::with_capacity(fields.len());
        for field in fields.iter() {
            let mut key = MapKey::Str(field.name.clone());
            for attr in chain::key_chain(&self.registry, field, ctx)? {
                key = attr.normalize_key(&key);
            }
            let raw = record.get(&field.name).unwrap_or(Value::Null);
            let node = self.normalize_value(&raw, &field.attributes, ctx)?;
            out.insert(key, node);
        }
        Ok(Node::Map(out))
    }

    fn flat_fields(&self, record: &Rc<RecordValue>) -> Rc<Vec<FieldDecl>> {
        let decl = record.decl();
        if let Some(cached) = self.field_cache.borrow().get(&decl.name) {
            return cached.clone();
        }
        let computed = Rc::new(decl.flat_fields());
        self.field_cache
            .borrow_mut()
            .insert(decl.name.clone(), computed.clone());
        computed
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::declare::{EnumDecl, FieldDecl, RecordDecl};
    use crate::types::values::{BagValue, IterValue};

    fn engine() -> Engine {
        Engine::new(Registry::new())
    }

    fn normalize(value: &Value) -> Result<Node, NormalizeError> {
        engine().normalize_root(value)
    }

    #[test]
    fn primitives_normalize_to_themselves() {
        assert_eq!(normalize(&Value::Null).unwrap(), Node::Null);
        assert_eq!(normalize(&Value::Bool(true)).unwrap(), Node::Bool(true));
        assert_eq!(normalize(&Value::Int(-7)).unwrap(), Node::Int(-7));
        assert_eq!(normalize(&Value::Float(2.5)).unwrap(), Node::Float(2.5));
        assert_eq!(normalize(&Value::str("foo")).unwrap(), Node::str("foo"));
    }

    #[test]
    fn sequences_normalize_in_order() {
        let value = Value::seq(vec![Value::Int(1), Value::str("two"), Value::Null]);
        assert_eq!(
            normalize(&value).unwrap(),
            Node::seq(vec![Node::Int(1), Node::str("two"), Node::Null])
        );
    }

    #[test]
    fn maps_preserve_keys_and_insertion_order() {
        let value = Value::map(vec![
            (MapKey::from("b"), Value::Int(2)),
            (MapKey::from("a"), Value::Int(1)),
            (MapKey::from(3), Value::Int(3)),
        ]);
        let node = normalize(&value).unwrap();
        match node {
            Node::Map(entries) => {
                let keys: Vec<MapKey> = entries.keys().cloned().collect();
                assert_eq!(
                    keys,
                    vec![MapKey::from("b"), MapKey::from("a"), MapKey::from(3)]
                );
            }
            other => panic!("expected map node, got {:?}", other),
        }
    }

    #[test]
    fn integer_keyed_iterator_becomes_list() {
        let value = Value::Iter(IterValue::from_values(vec![
            Value::Int(10),
            Value::Int(20),
        ]));
        assert_eq!(
            normalize(&value).unwrap(),
            Node::seq(vec![Node::Int(10), Node::Int(20)])
        );
    }

    #[test]
    fn mixed_keyed_iterator_becomes_map() {
        let value = Value::Iter(IterValue::from_pairs(vec![
            (MapKey::from(0), Value::Int(10)),
            (MapKey::from("name"), Value::str("x")),
        ]));
        assert_eq!(
            normalize(&value).unwrap(),
            Node::map(vec![
                (MapKey::from(0), Node::Int(10)),
                (MapKey::from("name"), Node::str("x")),
            ])
        );
    }

    #[test]
    fn bag_fields_emit_in_insertion_order() {
        let bag = BagValue::new();
        bag.set("z", Value::Int(1));
        bag.set("a", Value::str("two"));
        let node = normalize(&Value::Bag(bag)).unwrap();
        assert_eq!(
            node,
            Node::map(vec![
                (MapKey::from("z"), Node::Int(1)),
                (MapKey::from("a"), Node::str("two")),
            ])
        );
    }

    #[test]
    fn record_fields_emit_ancestor_first() {
        let base = RecordDecl::new("Base")
            .with_field(FieldDecl::new("id"))
            .declare();
        let child = RecordDecl::extending("Child", &base)
            .with_field(FieldDecl::new("name"))
            .declare();
        let instance = RecordValue::instance(&child);
        instance.set("id", Value::Int(7));
        instance.set("name", Value::str("seven"));
        let node = normalize(&Value::Record(instance)).unwrap();
        match &node {
            Node::Map(entries) => {
                let keys: Vec<MapKey> = entries.keys().cloned().collect();
                assert_eq!(keys, vec![MapKey::from("id"), MapKey::from("name")]);
            }
            other => panic!("expected map node, got {:?}", other),
        }
        assert_eq!(
            node,
            Node::map(vec![
                (MapKey::from("id"), Node::Int(7)),
                (MapKey::from("name"), Node::str("seven")),
            ])
        );
    }

    #[test]
    fn unset_declared_field_normalizes_as_null() {
        let decl = RecordDecl::new("Sparse")
            .with_field(FieldDecl::new("present"))
            .with_field(FieldDecl::new("absent"))
            .declare();
        let instance = RecordValue::instance(&decl);
        instance.set("present", Value::Bool(true));
        assert_eq!(
            normalize(&Value::Record(instance)).unwrap(),
            Node::map(vec![
                (MapKey::from("present"), Node::Bool(true)),
                (MapKey::from("absent"), Node::Null),
            ])
        );
    }

    #[test]
    fn enum_backings() {
        let pure = EnumDecl::pure("Suit", &["HEARTS"]);
        assert_eq!(
            normalize(&pure.value("HEARTS").unwrap()).unwrap(),
            Node::str("HEARTS")
        );

        let strings = EnumDecl::str_backed("Color", &[("RED", "#ff0000")]);
        assert_eq!(
            normalize(&strings.value("RED").unwrap()).unwrap(),
            Node::str("#ff0000")
        );

        let ints = EnumDecl::int_backed("Level", &[("HIGH", 3)]);
        assert_eq!(
            normalize(&ints.value("HIGH").unwrap()).unwrap(),
            Node::Int(3)
        );
    }

    #[test]
    fn datetime_renders_with_microseconds_and_offset() {
        let dt = chrono::DateTime::parse_from_rfc3339("1971-11-08T00:00:00+00:00").unwrap();
        assert_eq!(
            normalize(&Value::DateTime(dt)).unwrap(),
            Node::str("1971-11-08T00:00:00.000000+00:00")
        );

        let dt = chrono::DateTime::parse_from_rfc3339("2024-06-01T12:34:56.789+02:00").unwrap();
        assert_eq!(
            normalize(&Value::DateTime(dt)).unwrap(),
            Node::str("2024-06-01T12:34:56.789000+02:00")
        );
    }

    #[test]
    fn timezone_renders_canonical_name() {
        let value = Value::TimeZone("Europe/Paris".to_string());
        assert_eq!(normalize(&value).unwrap(), Node::str("Europe/Paris"));
    }

    #[test]
    fn callable_is_unhandled_by_default() {
        let err = normalize(&Value::Callable("closure".to_string())).unwrap_err();
        assert_eq!(err.code(), 1695062925);
        assert!(err.to_string().contains("callable"));
    }

    #[test]
    fn cycle_through_records_is_fatal() {
        let decl_a = RecordDecl::new("A").with_field(FieldDecl::new("b")).declare();
        let decl_b = RecordDecl::new("B").with_field(FieldDecl::new("a")).declare();
        let a = RecordValue::instance(&decl_a);
        let b = RecordValue::instance(&decl_b);
        a.set("b", Value::Record(b.clone()));
        b.set("a", Value::Record(a.clone()));

        let err = normalize(&Value::Record(a)).unwrap_err();
        assert_eq!(err.code(), 1695064016);
        assert!(err.to_string().contains("`A`"));
    }

    #[test]
    fn self_cycle_through_bag_is_fatal() {
        let bag = BagValue::new();
        bag.set("me", Value::Bag(bag.clone()));
        let err = normalize(&Value::Bag(bag)).unwrap_err();
        assert_eq!(err.code(), 1695064016);
    }

    #[test]
    fn shared_objects_without_cycle_normalize() {
        let point = RecordDecl::new("Point")
            .with_field(FieldDecl::new("x"))
            .declare();
        let pair = RecordDecl::new("Pair")
            .with_field(FieldDecl::new("left"))
            .with_field(FieldDecl::new("right"))
            .declare();

        let shared = RecordValue::instance(&point);
        shared.set("x", Value::Int(1));
        let holder = RecordValue::instance(&pair);
        holder.set("left", Value::Record(shared.clone()));
        holder.set("right", Value::Record(shared));

        let expected_point = Node::map(vec![(MapKey::from("x"), Node::Int(1))]);
        assert_eq!(
            normalize(&Value::Record(holder)).unwrap(),
            Node::map(vec![
                (MapKey::from("left"), expected_point.clone()),
                (MapKey::from("right"), expected_point),
            ])
        );
    }

    #[test]
    fn attribute_validation_is_marked_once_per_call() {
        let ctx = Context::new();
        assert!(ctx.needs_validation("Uppercase", AttrKind::Value));
        assert!(!ctx.needs_validation("Uppercase", AttrKind::Value));
        // The two abstractions are tracked independently.
        assert!(ctx.needs_validation("Uppercase", AttrKind::Key));
        // A fresh call validates again.
        assert!(Context::new().needs_validation("Uppercase", AttrKind::Value));
    }

    #[test]
    fn field_list_is_memoized_per_declaration() {
        let decl = RecordDecl::new("Cached")
            .with_field(FieldDecl::new("x"))
            .declare();
        let engine = engine();
        let first = engine.flat_fields(&RecordValue::instance(&decl));
        let second = engine.flat_fields(&RecordValue::instance(&decl));
        assert!(Rc::ptr_eq(&first, &second));
    }
}
