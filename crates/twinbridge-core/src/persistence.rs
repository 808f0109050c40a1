//! Persistence contract and in-memory backend
//!
//! The storage engine itself is out of scope; the runtime only relies on
//! this CRUD contract. Reads must never observe a half-written element, so
//! the memory backend replaces whole elements atomically.

use crate::error::{Error, Result};
use crate::model::SubmodelElement;
use crate::reference::Reference;
use crate::value::{Datatype, TypedValue};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Traversal depth for nested element retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Depth {
    /// Element itself, children omitted
    Core,
    /// Element with its full subtree
    Deep,
}

/// Shaping options applied to retrieved elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryModifier {
    pub depth: Depth,
    pub include_blobs: bool,
}

impl Default for QueryModifier {
    /// Deep, without binary blobs
    fn default() -> Self {
        Self {
            depth: Depth::Deep,
            include_blobs: false,
        }
    }
}

impl QueryModifier {
    /// Deep, blobs included: the unshaped form. Mutating paths must fetch
    /// their write-back basis with this modifier; shaping is for reads only.
    pub fn full() -> Self {
        Self {
            depth: Depth::Deep,
            include_blobs: true,
        }
    }

    /// Apply this modifier to a copy of the element
    pub fn apply(&self, element: &SubmodelElement) -> SubmodelElement {
        let mut shaped = element.clone();
        if self.depth == Depth::Core {
            shaped.children.clear();
        }
        if !self.include_blobs {
            strip_blobs(&mut shaped);
        }
        shaped
    }
}

fn strip_blobs(element: &mut SubmodelElement) {
    if element.datatype == Datatype::Base64Binary {
        element.value = TypedValue::Base64Binary(Vec::new());
    }
    for child in &mut element.children {
        strip_blobs(child);
    }
}

/// CRUD contract consumed by the request handlers
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Fetch one element, shaped by the modifier
    async fn get(&self, reference: &Reference, modifier: &QueryModifier)
        -> Result<SubmodelElement>;

    /// Insert or replace one element atomically
    async fn put(&self, element: SubmodelElement) -> Result<()>;

    /// Remove and return one element
    async fn remove(&self, reference: &Reference) -> Result<SubmodelElement>;

    /// All elements nested under `parent`, or all elements when `None`
    async fn list(
        &self,
        parent: Option<&Reference>,
        modifier: &QueryModifier,
    ) -> Result<Vec<SubmodelElement>>;
}

/// In-memory persistence (non-durable)
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    elements: DashMap<Reference, SubmodelElement>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn get(
        &self,
        reference: &Reference,
        modifier: &QueryModifier,
    ) -> Result<SubmodelElement> {
        self.elements
            .get(reference)
            .map(|e| modifier.apply(&e))
            .ok_or_else(|| Error::NotFound(format!("element {reference}")))
    }

    async fn put(&self, element: SubmodelElement) -> Result<()> {
        self.elements.insert(element.reference.clone(), element);
        Ok(())
    }

    async fn remove(&self, reference: &Reference) -> Result<SubmodelElement> {
        self.elements
            .remove(reference)
            .map(|(_, e)| e)
            .ok_or_else(|| Error::NotFound(format!("element {reference}")))
    }

    async fn list(
        &self,
        parent: Option<&Reference>,
        modifier: &QueryModifier,
    ) -> Result<Vec<SubmodelElement>> {
        let mut elements: Vec<SubmodelElement> = self
            .elements
            .iter()
            .filter(|entry| match parent {
                Some(parent) => parent.is_prefix_of(entry.key()),
                None => true,
            })
            .map(|entry| modifier.apply(entry.value()))
            .collect();
        elements.sort_by(|a, b| a.reference.to_string().cmp(&b.reference.to_string()));
        Ok(elements)
    }
}
