//! Model elements traded through the persistence contract
//!
//! The full digital-twin metamodel is out of scope; elements are carried as
//! opaque, typed, addressable nodes.

use crate::reference::Reference;
use crate::value::{Datatype, TypedValue};
use serde::{Deserialize, Serialize};

/// Structural kind of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Property,
    Operation,
    Collection,
}

/// One addressable node in the model tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmodelElement {
    pub id_short: String,
    pub reference: Reference,
    pub kind: ElementKind,
    pub datatype: Datatype,
    pub value: TypedValue,
    #[serde(default)]
    pub children: Vec<SubmodelElement>,
}

impl SubmodelElement {
    /// A value-carrying property element
    pub fn property(
        id_short: impl Into<String>,
        reference: Reference,
        value: TypedValue,
    ) -> Self {
        Self {
            id_short: id_short.into(),
            reference,
            kind: ElementKind::Property,
            datatype: value.datatype(),
            value,
            children: Vec::new(),
        }
    }

    /// An invocable operation element
    pub fn operation(id_short: impl Into<String>, reference: Reference) -> Self {
        Self {
            id_short: id_short.into(),
            reference,
            kind: ElementKind::Operation,
            datatype: Datatype::String,
            value: TypedValue::String(String::new()),
            children: Vec::new(),
        }
    }

    /// A collection element with nested children
    pub fn collection(
        id_short: impl Into<String>,
        reference: Reference,
        children: Vec<SubmodelElement>,
    ) -> Self {
        Self {
            id_short: id_short.into(),
            reference,
            kind: ElementKind::Collection,
            datatype: Datatype::String,
            value: TypedValue::String(String::new()),
            children,
        }
    }

    /// Copy of this element with the value replaced
    #[must_use]
    pub fn with_value(&self, value: TypedValue) -> Self {
        let mut element = self.clone();
        element.datatype = value.datatype();
        element.value = value;
        element
    }
}
