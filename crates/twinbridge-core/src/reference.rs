//! References identify addressable model elements
//!
//! A reference is an ordered list of (key type, value) pairs. Equality is
//! structural and case-insensitive on the value strings, so references are
//! usable as lookup keys across configuration, caches and persistence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of entity a reference key points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    AssetAdministrationShell,
    Submodel,
    SubmodelElement,
    Property,
    Operation,
    GlobalReference,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AssetAdministrationShell => "AssetAdministrationShell",
            Self::Submodel => "Submodel",
            Self::SubmodelElement => "SubmodelElement",
            Self::Property => "Property",
            Self::Operation => "Operation",
            Self::GlobalReference => "GlobalReference",
        };
        write!(f, "{name}")
    }
}

/// One (type, value) pair in a reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceKey {
    pub key_type: KeyType,
    pub value: String,
}

impl ReferenceKey {
    pub fn new(key_type: KeyType, value: impl Into<String>) -> Self {
        Self {
            key_type,
            value: value.into(),
        }
    }
}

impl PartialEq for ReferenceKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_type == other.key_type && self.value.eq_ignore_ascii_case(&other.value)
    }
}

impl Eq for ReferenceKey {}

impl Hash for ReferenceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_type.hash(state);
        for b in self.value.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.key_type, self.value)
    }
}

/// Ordered key list identifying one model element, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    keys: Vec<ReferenceKey>,
}

impl Reference {
    pub fn new(keys: Vec<ReferenceKey>) -> Self {
        Self { keys }
    }

    /// Single-key reference
    pub fn key(key_type: KeyType, value: impl Into<String>) -> Self {
        Self {
            keys: vec![ReferenceKey::new(key_type, value)],
        }
    }

    /// Reference to a property inside a submodel
    pub fn submodel_property(submodel_id: impl Into<String>, id_short: impl Into<String>) -> Self {
        Self {
            keys: vec![
                ReferenceKey::new(KeyType::Submodel, submodel_id),
                ReferenceKey::new(KeyType::Property, id_short),
            ],
        }
    }

    /// New reference extending this one by a child key
    #[must_use]
    pub fn child(&self, key_type: KeyType, value: impl Into<String>) -> Self {
        let mut keys = self.keys.clone();
        keys.push(ReferenceKey::new(key_type, value));
        Self { keys }
    }

    pub fn keys(&self) -> &[ReferenceKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// True if `other` is nested below this reference
    pub fn is_prefix_of(&self, other: &Reference) -> bool {
        other.keys.len() > self.keys.len()
            && self
                .keys
                .iter()
                .zip(other.keys.iter())
                .all(|(a, b)| a == b)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}
