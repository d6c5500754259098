//! Record and enumeration declarations.
//!
//! Declarations are the reflection surface the engine consumes: they carry
//! field lists (including inherited fields), the attributes attached to a
//! type and to each field, and enumeration variants with their backing
//! values. Declarations are shared via `Rc` and never mutated after
//! [`RecordDecl::declare`].

use std::fmt;
use std::rc::Rc;

use super::values::{EnumValue, Value};
use super::TypeDescriptor;
use crate::transformer::{KeyAttribute, ValueAttribute};

// ──────────────────────────────────────────────
// Attribute instances
// ──────────────────────────────────────────────

/// An attribute instance attached to a record type or field.
///
/// The variant records which transformer abstraction the attribute
/// implements; an attribute type implementing both contributes one instance
/// per abstraction.
#[derive(Clone)]
pub enum AttrInstance {
    Value(Rc<dyn ValueAttribute>),
    Key(Rc<dyn KeyAttribute>),
}

impl AttrInstance {
    pub fn identity(&self) -> &str {
        match self {
            AttrInstance::Value(a) => a.identity(),
            AttrInstance::Key(a) => a.identity(),
        }
    }
}

impl fmt::Debug for AttrInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrInstance::Value(a) => write!(f, "ValueAttribute({})", a.identity()),
            AttrInstance::Key(a) => write!(f, "KeyAttribute({})", a.identity()),
        }
    }
}

// ──────────────────────────────────────────────
// Record declarations
// ──────────────────────────────────────────────

/// A declared record field.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    /// Declared type, informational for callers; dispatch is value-directed.
    pub declared: Option<TypeDescriptor>,
    /// Attribute instances in source order.
    pub attributes: Vec<AttrInstance>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>) -> FieldDecl {
        FieldDecl {
            name: name.into(),
            declared: None,
            attributes: Vec::new(),
        }
    }

    pub fn typed(mut self, declared: TypeDescriptor) -> FieldDecl {
        self.declared = Some(declared);
        self
    }

    pub fn with_attribute(mut self, attribute: AttrInstance) -> FieldDecl {
        self.attributes.push(attribute);
        self
    }
}

/// A declared record type: named fields, optional parent, attached
/// attributes.
#[derive(Debug)]
pub struct RecordDecl {
    pub name: String,
    pub parent: Option<Rc<RecordDecl>>,
    /// Class-level attribute instances in source order.
    pub attributes: Vec<AttrInstance>,
    /// Fields declared on this type (not inherited ones), in source order.
    pub fields: Vec<FieldDecl>,
}

impl RecordDecl {
    pub fn new(name: impl Into<String>) -> RecordDecl {
        RecordDecl {
            name: name.into(),
            parent: None,
            attributes: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn extending(name: impl Into<String>, parent: &Rc<RecordDecl>) -> RecordDecl {
        RecordDecl {
            name: name.into(),
            parent: Some(parent.clone()),
            attributes: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: AttrInstance) -> RecordDecl {
        self.attributes.push(attribute);
        self
    }

    pub fn with_field(mut self, field: FieldDecl) -> RecordDecl {
        self.fields.push(field);
        self
    }

    /// Finish the declaration.
    pub fn declare(self) -> Rc<RecordDecl> {
        Rc::new(self)
    }

    /// All fields including inherited ones, ancestor-first, declaration
    /// order within each type. A field redeclared on a descendant keeps the
    /// ancestor's position but carries the descendant's declaration.
    pub fn flat_fields(&self) -> Vec<FieldDecl> {
        let mut out = match &self.parent {
            Some(parent) => parent.flat_fields(),
            None => Vec::new(),
        };
        for field in &self.fields {
            match out.iter_mut().find(|existing| existing.name == field.name) {
                Some(existing) => *existing = field.clone(),
                None => out.push(field.clone()),
            }
        }
        out
    }

    /// This type followed by its ancestors, nearest first.
    pub fn lineage(&self) -> Vec<&RecordDecl> {
        let mut out = vec![self];
        let mut current = self.parent.as_deref();
        while let Some(parent) = current {
            out.push(parent);
            current = parent.parent.as_deref();
        }
        out
    }

    /// Covariant identity check: true for this type's own identity and any
    /// ancestor identity.
    pub fn is_kind_of(&self, identity: &str) -> bool {
        self.lineage().iter().any(|decl| decl.name == identity)
    }
}

// ──────────────────────────────────────────────
// Enumeration declarations
// ──────────────────────────────────────────────

/// Backing value of an enumeration variant.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantValue {
    /// Pure variant; normalizes to its declared name.
    Pure,
    Str(String),
    Int(i64),
}

#[derive(Debug, Clone)]
pub struct EnumVariant {
    pub name: String,
    pub value: VariantValue,
}

/// A declared enumeration.
#[derive(Debug)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<EnumVariant>,
}

impl EnumDecl {
    pub fn pure(name: impl Into<String>, variants: &[&str]) -> Rc<EnumDecl> {
        Rc::new(EnumDecl {
            name: name.into(),
            variants: variants
                .iter()
                .map(|v| EnumVariant {
                    name: v.to_string(),
                    value: VariantValue::Pure,
                })
                .collect(),
        })
    }

    pub fn str_backed(name: impl Into<String>, variants: &[(&str, &str)]) -> Rc<EnumDecl> {
        Rc::new(EnumDecl {
            name: name.into(),
            variants: variants
                .iter()
                .map(|(v, backing)| EnumVariant {
                    name: v.to_string(),
                    value: VariantValue::Str(backing.to_string()),
                })
                .collect(),
        })
    }

    pub fn int_backed(name: impl Into<String>, variants: &[(&str, i64)]) -> Rc<EnumDecl> {
        Rc::new(EnumDecl {
            name: name.into(),
            variants: variants
                .iter()
                .map(|(v, backing)| EnumVariant {
                    name: v.to_string(),
                    value: VariantValue::Int(*backing),
                })
                .collect(),
        })
    }

    /// Look up a variant by name and wrap it as a runtime value.
    pub fn value(self: &Rc<Self>, variant: &str) -> Option<Value> {
        self.variants
            .iter()
            .position(|v| v.name == variant)
            .map(|index| {
                Value::Enum(EnumValue {
                    decl: self.clone(),
                    variant: index,
                })
            })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_fields_are_ancestor_first() {
        let base = RecordDecl::new("Base")
            .with_field(FieldDecl::new("id"))
            .with_field(FieldDecl::new("created"))
            .declare();
        let child = RecordDecl::extending("Child", &base)
            .with_field(FieldDecl::new("name"))
            .declare();
        let names: Vec<String> = child
            .flat_fields()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["id", "created", "name"]);
    }

    #[test]
    fn redeclared_field_keeps_ancestor_position() {
        let base = RecordDecl::new("Base")
            .with_field(FieldDecl::new("id"))
            .with_field(FieldDecl::new("label"))
            .declare();
        let child = RecordDecl::extending("Child", &base)
            .with_field(FieldDecl::new("label").typed(TypeDescriptor::String))
            .with_field(FieldDecl::new("extra"))
            .declare();
        let fields = child.flat_fields();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "label", "extra"]);
        assert_eq!(fields[1].declared, Some(TypeDescriptor::String));
    }

    #[test]
    fn lineage_and_kind_of() {
        let base = RecordDecl::new("Base").declare();
        let mid = RecordDecl::extending("Mid", &base).declare();
        let leaf = RecordDecl::extending("Leaf", &mid).declare();
        let names: Vec<&str> = leaf.lineage().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Leaf", "Mid", "Base"]);
        assert!(leaf.is_kind_of("Leaf"));
        assert!(leaf.is_kind_of("Base"));
        assert!(!base.is_kind_of("Leaf"));
    }

    #[test]
    fn enum_variant_lookup() {
        let status = EnumDecl::pure("Status", &["ACTIVE", "CLOSED"]);
        assert!(status.value("ACTIVE").is_some());
        assert!(status.value("UNKNOWN").is_none());
    }
}
