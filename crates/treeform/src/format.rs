//! Output adapters.
//!
//! A `Format` materializes the normalized node tree into its final container
//! shape. The tree format is the primary in-memory form; the JSON format
//! shapes the same tree into a `serde_json::Value` for downstream consumers.
//! No I/O happens here.

use crate::types::values::{MapKey, Node};

/// Shapes a normalized tree into a concrete output container.
pub trait Format {
    type Output;

    fn shape(&self, node: Node) -> Self::Output;
}

/// The in-memory tree form: insertion-ordered maps, integer-indexed
/// sequences.
pub struct TreeFormat;

impl Format for TreeFormat {
    type Output = Node;

    fn shape(&self, node: Node) -> Node {
        node
    }
}

/// The JSON value form. Map keys become object keys (integers rendered in
/// decimal), sequences become arrays.
pub struct JsonFormat;

impl Format for JsonFormat {
    type Output = serde_json::Value;

    fn shape(&self, node: Node) -> serde_json::Value {
        node_to_json(&node)
    }
}

/// Convert a normalized node to a JSON value.
pub fn node_to_json(node: &Node) -> serde_json::Value {
    match node {
        Node::Null => serde_json::Value::Null,
        Node::Bool(b) => serde_json::Value::Bool(*b),
        Node::Int(i) => serde_json::Value::from(*i),
        // Non-finite floats have no JSON representation; they become null.
        Node::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Node::Str(s) => serde_json::Value::String(s.clone()),
        Node::Seq(items) => serde_json::Value::Array(items.iter().map(node_to_json).collect()),
        Node::Map(entries) => {
            let mut out = serde_json::Map::with_capacity(entries.len());
            for (key, item) in entries {
                let rendered = match key {
                    MapKey::Str(s) => s.clone(),
                    MapKey::Int(i) => i.to_string(),
                };
                out.insert(rendered, node_to_json(item));
            }
            serde_json::Value::Object(out)
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
