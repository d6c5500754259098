//! Runtime value model and the normalized node tree.
//!
//! `Value` is what callers hand to the normalizer; `Node` is what comes out.
//! Records and bags are reference-counted so callers can build shared and
//! cyclic graphs; the engine uses the `Rc` pointer as object identity.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;

use super::declare::{EnumDecl, RecordDecl};

// ──────────────────────────────────────────────
// Map keys
// ──────────────────────────────────────────────

/// Key of a mapping entry, both on input values and output nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Int(i) => write!(f, "{}", i),
            MapKey::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for MapKey {
    fn from(i: i64) -> MapKey {
        MapKey::Int(i)
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> MapKey {
        MapKey::Str(s.to_string())
    }
}

impl From<String> for MapKey {
    fn from(s: String) -> MapKey {
        MapKey::Str(s)
    }
}

// ──────────────────────────────────────────────
// Runtime values
// ──────────────────────────────────────────────

/// A runtime value entering the normalizer.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered, index-keyed collection.
    Seq(Vec<Value>),
    /// Insertion-ordered, key-preserving collection.
    Map(IndexMap<MapKey, Value>),
    /// Lazily traversed producer of `(key, value)` pairs; drained once.
    Iter(IterValue),
    DateTime(DateTime<FixedOffset>),
    /// A time zone, carried by its canonical name (e.g. `Europe/Paris`).
    TimeZone(String),
    /// A variant of a declared enumeration.
    Enum(EnumValue),
    /// An instance of a declared record.
    Record(Rc<RecordValue>),
    /// An open object with dynamic insertion-ordered fields and no
    /// declaration.
    Bag(Rc<BagValue>),
    /// An opaque callable; unhandled unless a transformer matches it.
    Callable(String),
}

impl Value {
    /// Human-readable kind name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Seq(_) => "list",
            Value::Map(_) => "map",
            Value::Iter(_) => "iterator",
            Value::DateTime(_) => "datetime",
            Value::TimeZone(_) => "timezone",
            Value::Enum(_) => "enum",
            Value::Record(_) => "record",
            Value::Bag(_) => "object",
            Value::Callable(_) => "callable",
        }
    }

    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    pub fn seq(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Seq(items.into_iter().collect())
    }

    pub fn map(pairs: impl IntoIterator<Item = (MapKey, Value)>) -> Value {
        Value::Map(pairs.into_iter().collect())
    }

    /// Identity of the value for cycle detection. Only records and bags
    /// carry an identity; everything else is value-like and cannot cycle.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Value::Record(r) => Some(Rc::as_ptr(r) as usize),
            Value::Bag(b) => Some(Rc::as_ptr(b) as usize),
            _ => None,
        }
    }

    /// Type name reported when this value sits on a cycle boundary.
    pub(crate) fn type_label(&self) -> String {
        match self {
            Value::Record(r) => r.decl().name.clone(),
            _ => self.kind().to_string(),
        }
    }
}

// ──────────────────────────────────────────────
// Enum variants
// ──────────────────────────────────────────────

/// A specific variant of a declared enumeration.
#[derive(Debug, Clone)]
pub struct EnumValue {
    pub decl: Rc<EnumDecl>,
    /// Index into `decl.variants`; guaranteed valid by construction through
    /// [`EnumDecl::value`].
    pub variant: usize,
}

// ──────────────────────────────────────────────
// Record instances
// ──────────────────────────────────────────────

/// An instance of a declared record type.
///
/// Field values sit behind a `RefCell` so callers can wire up cyclic and
/// shared graphs after allocation. Declared fields with no stored value
/// normalize as null.
pub struct RecordValue {
    decl: Rc<RecordDecl>,
    values: RefCell<IndexMap<String, Value>>,
}

impl RecordValue {
    pub fn instance(decl: &Rc<RecordDecl>) -> Rc<RecordValue> {
        Rc::new(RecordValue {
            decl: decl.clone(),
            values: RefCell::new(IndexMap::new()),
        })
    }

    pub fn decl(&self) -> &Rc<RecordDecl> {
        &self.decl
    }

    pub fn set(&self, field: impl Into<String>, value: Value) {
        self.values.borrow_mut().insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.values.borrow().get(field).cloned()
    }
}

impl fmt::Debug for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow on purpose: record graphs may be cyclic.
        write!(f, "RecordValue({})", self.decl.name)
    }
}

// ──────────────────────────────────────────────
// Bags
// ──────────────────────────────────────────────

/// An open object holding dynamic fields in insertion order.
#[derive(Default)]
pub struct BagValue {
    fields: RefCell<IndexMap<String, Value>>,
}

impl BagValue {
    pub fn new() -> Rc<BagValue> {
        Rc::new(BagValue::default())
    }

    pub fn set(&self, field: impl Into<String>, value: Value) {
        self.fields.borrow_mut().insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.fields.borrow().get(field).cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<(String, Value)> {
        self.fields
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl fmt::Debug for BagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BagValue")
    }
}

// ──────────────────────────────────────────────
// Lazy iterators
// ──────────────────────────────────────────────

/// A shared, lazily traversed producer of `(key, value)` pairs.
///
/// Cloning shares the underlying cursor; the engine drains it once, so a
/// second traversal observes an exhausted producer.
#[derive(Clone)]
pub struct IterValue {
    inner: Rc<RefCell<Box<dyn Iterator<Item = (MapKey, Value)>>>>,
}

impl IterValue {
    pub fn from_pairs<I>(pairs: I) -> IterValue
    where
        I: IntoIterator<Item = (MapKey, Value)>,
        I::IntoIter: 'static,
    {
        IterValue {
            inner: Rc::new(RefCell::new(Box::new(pairs.into_iter()))),
        }
    }

    /// Produce values under implicit integer keys starting at zero.
    pub fn from_values<I>(values: I) -> IterValue
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: 'static,
    {
        IterValue::from_pairs(
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (MapKey::Int(i as i64), v)),
        )
    }

    pub(crate) fn drain(&self) -> Vec<(MapKey, Value)> {
        let mut cursor = self.inner.borrow_mut();
        let mut out = Vec::new();
        while let Some(pair) = cursor.next() {
            out.push(pair);
        }
        out
    }
}

impl fmt::Debug for IterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IterValue")
    }
}

// ──────────────────────────────────────────────
// Normalized nodes
// ──────────────────────────────────────────────

/// A node of the canonical output tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Node>),
    /// Insertion-ordered mapping with string or integer keys.
    Map(IndexMap<MapKey, Node>),
}

impl Node {
    pub fn str(s: impl Into<String>) -> Node {
        Node::Str(s.into())
    }

    pub fn seq(items: impl IntoIterator<Item = Node>) -> Node {
        Node::Seq(items.into_iter().collect())
    }

    pub fn map(pairs: impl IntoIterator<Item = (MapKey, Node)>) -> Node {
        Node::Map(pairs.into_iter().collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Str(s) => Some(s),
            _ => None,
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
