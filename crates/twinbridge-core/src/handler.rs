//! Request dispatch core
//!
//! One handling path per API operation kind, sharing the same contract:
//! resolve the reference through persistence, delegate live value access to
//! the bound asset provider when one exists, perform the persistence
//! mutation, and publish exactly one event per successful mutation. Errors
//! never escape as lower-layer types; they are mapped here onto the fixed
//! status taxonomy.

use crate::bus::{EventMessage, MessageBus};
use crate::error::{Error, Result, StatusCode};
use crate::manager::AssetConnectionManager;
use crate::model::{ElementKind, SubmodelElement};
use crate::persistence::{Persistence, QueryModifier};
use crate::reference::Reference;
use crate::value::TypedValue;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One inbound API operation
#[derive(Debug, Clone)]
pub enum Request {
    /// Read an element's value, live from the asset when bound
    GetElementValue { reference: Reference },

    /// Write an element's value, through the asset when bound
    SetElementValue {
        reference: Reference,
        value: TypedValue,
    },

    /// Invoke an asset-side operation with named arguments
    InvokeOperation {
        reference: Reference,
        inputs: BTreeMap<String, TypedValue>,
    },

    /// List elements below a parent, or all elements
    ListElements {
        parent: Option<Reference>,
        modifier: QueryModifier,
    },

    /// Create a new element
    CreateElement { element: SubmodelElement },

    /// Delete an element
    DeleteElement { reference: Reference },
}

/// Successful response payload
#[derive(Debug, Clone)]
pub enum Payload {
    Value(TypedValue),
    Element(SubmodelElement),
    Elements(Vec<SubmodelElement>),
    OutputArguments(BTreeMap<String, TypedValue>),
}

/// Outcome of one request: a success payload or a classified failure,
/// never both
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub payload: Option<Payload>,
    pub message: Option<String>,
}

impl Response {
    fn success(payload: Payload) -> Self {
        Self {
            status: StatusCode::Success,
            payload: Some(payload),
            message: None,
        }
    }

    fn failure(error: &Error) -> Self {
        Self {
            status: error.status(),
            payload: None,
            message: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Dispatch core shared by all API operation kinds
pub struct RequestHandler {
    persistence: Arc<dyn Persistence>,
    connections: Arc<AssetConnectionManager>,
    bus: Arc<MessageBus>,
    // At most one in-flight write per reference
    write_locks: DashMap<Reference, Arc<Mutex<()>>>,
}

impl RequestHandler {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        connections: Arc<AssetConnectionManager>,
        bus: Arc<MessageBus>,
    ) -> Self {
        Self {
            persistence,
            connections,
            bus,
            write_locks: DashMap::new(),
        }
    }

    /// Handle one request, mapping any failure onto the status taxonomy
    pub async fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::GetElementValue { reference } => self.get_element_value(reference).await,
            Request::SetElementValue { reference, value } => {
                self.set_element_value(reference, value).await
            }
            Request::InvokeOperation { reference, inputs } => {
                self.invoke_operation(reference, inputs).await
            }
            Request::ListElements { parent, modifier } => {
                self.list_elements(parent, modifier).await
            }
            Request::CreateElement { element } => self.create_element(element).await,
            Request::DeleteElement { reference } => self.delete_element(reference).await,
        };
        match result {
            Ok(payload) => Response::success(payload),
            Err(e) => {
                tracing::debug!(error = %e, status = %e.status(), "request failed");
                Response::failure(&e)
            }
        }
    }

    async fn get_element_value(&self, reference: Reference) -> Result<Payload> {
        // The unshaped copy is the write-back basis for the refresh; shaping
        // only applies to what leaves the handler.
        let mut element = self
            .persistence
            .get(&reference, &QueryModifier::full())
            .await?;

        // Prefer the live asset value when a provider is bound; refresh the
        // stored copy so the model tracks the asset.
        if self.connections.has_value_provider(&reference) {
            let provider = self.connections.get_value_provider(&reference)?;
            let live = provider.read().await?;
            if live != element.value {
                element = element.with_value(live);
                self.persistence.put(element.clone()).await?;
            }
        }

        let shaped = QueryModifier::default().apply(&element);
        self.bus.publish(&EventMessage::ElementRead {
            reference,
            element: shaped.clone(),
        });
        Ok(Payload::Value(shaped.value))
    }

    async fn set_element_value(&self, reference: Reference, value: TypedValue) -> Result<Payload> {
        let lock = self
            .write_locks
            .entry(reference.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _serialized = lock.lock().await;

        let element = self
            .persistence
            .get(&reference, &QueryModifier::full())
            .await?;
        if element.datatype != value.datatype() {
            return Err(Error::InvalidRequest(format!(
                "element {reference} has datatype {}, got {}",
                element.datatype,
                value.datatype()
            )));
        }

        if self.connections.has_value_provider(&reference) {
            let provider = self.connections.get_value_provider(&reference)?;
            provider.write(value.clone()).await?;
        }

        let old = element.value.clone();
        self.persistence
            .put(element.with_value(value.clone()))
            .await?;

        self.bus.publish(&EventMessage::ValueChange {
            reference,
            old: Some(old),
            new: value.clone(),
        });
        Ok(Payload::Value(value))
    }

    async fn invoke_operation(
        &self,
        reference: Reference,
        inputs: BTreeMap<String, TypedValue>,
    ) -> Result<Payload> {
        let element = self
            .persistence
            .get(&reference, &QueryModifier::default())
            .await?;
        if element.kind != ElementKind::Operation {
            return Err(Error::InvalidRequest(format!(
                "element {reference} is not an operation"
            )));
        }

        let provider = self.connections.get_operation_provider(&reference)?;
        let outputs = provider.invoke(&inputs).await?;

        self.bus.publish(&EventMessage::OperationInvoked {
            reference,
            inputs,
            outputs: outputs.clone(),
        });
        Ok(Payload::OutputArguments(outputs))
    }

    async fn list_elements(
        &self,
        parent: Option<Reference>,
        modifier: QueryModifier,
    ) -> Result<Payload> {
        let elements = self.persistence.list(parent.as_ref(), &modifier).await?;
        for element in &elements {
            self.bus.publish(&EventMessage::ElementRead {
                reference: element.reference.clone(),
                element: element.clone(),
            });
        }
        Ok(Payload::Elements(elements))
    }

    async fn create_element(&self, element: SubmodelElement) -> Result<Payload> {
        let reference = element.reference.clone();
        if self
            .persistence
            .get(&reference, &QueryModifier::default())
            .await
            .is_ok()
        {
            return Err(Error::InvalidRequest(format!(
                "element {reference} already exists"
            )));
        }

        self.persistence.put(element.clone()).await?;
        self.bus.publish(&EventMessage::ElementCreated {
            reference,
            element: element.clone(),
        });
        Ok(Payload::Element(element))
    }

    async fn delete_element(&self, reference: Reference) -> Result<Payload> {
        let removed = self.persistence.remove(&reference).await?;
        // An in-flight write keeps its own Arc clone; the map entry can go.
        self.write_locks.remove(&reference);
        self.bus.publish(&EventMessage::ElementDeleted {
            reference,
            element: removed.clone(),
        });
        Ok(Payload::Element(removed))
    }
}
