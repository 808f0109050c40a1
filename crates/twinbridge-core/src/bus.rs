//! In-process publish/subscribe bus for event messages
//!
//! Delivery is at-most-once and best-effort: messages are not persisted,
//! subscribers registered after a publish never see it. Dispatch runs
//! against a snapshot of the subscriber table in subscription order, so a
//! handler that subscribes or unsubscribes reentrantly never deadlocks, and
//! a handler that panics cannot affect the publisher or other subscribers.

use crate::model::SubmodelElement;
use crate::reference::Reference;
use crate::value::TypedValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Discriminant of an event message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ElementRead,
    ValueChange,
    OperationInvoked,
    ElementCreated,
    ElementDeleted,
}

/// Immutable record of a state transition, published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventMessage {
    /// An element was read through the API
    ElementRead {
        reference: Reference,
        element: SubmodelElement,
    },

    /// An element's value was written, by the API or by an asset push
    ValueChange {
        reference: Reference,
        old: Option<TypedValue>,
        new: TypedValue,
    },

    /// An asset-side operation was invoked
    OperationInvoked {
        reference: Reference,
        inputs: BTreeMap<String, TypedValue>,
        outputs: BTreeMap<String, TypedValue>,
    },

    /// An element was created
    ElementCreated {
        reference: Reference,
        element: SubmodelElement,
    },

    /// An element was deleted
    ElementDeleted {
        reference: Reference,
        element: SubmodelElement,
    },
}

impl EventMessage {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ElementRead { .. } => EventKind::ElementRead,
            Self::ValueChange { .. } => EventKind::ValueChange,
            Self::OperationInvoked { .. } => EventKind::OperationInvoked,
            Self::ElementCreated { .. } => EventKind::ElementCreated,
            Self::ElementDeleted { .. } => EventKind::ElementDeleted,
        }
    }

    /// The reference this event applies to
    pub fn reference(&self) -> &Reference {
        match self {
            Self::ElementRead { reference, .. }
            | Self::ValueChange { reference, .. }
            | Self::OperationInvoked { reference, .. }
            | Self::ElementCreated { reference, .. }
            | Self::ElementDeleted { reference, .. } => reference,
        }
    }
}

/// Unique token handed out per subscription, never reused within the
/// process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Predicate = Arc<dyn Fn(&EventMessage) -> bool + Send + Sync>;

/// Declarative filter deciding which messages a subscriber receives
#[derive(Clone, Default)]
pub struct SubscriptionFilter {
    kinds: Option<HashSet<EventKind>>,
    predicate: Option<Predicate>,
}

impl SubscriptionFilter {
    /// Match every message
    pub fn any() -> Self {
        Self::default()
    }

    /// Match one event kind
    pub fn kind(kind: EventKind) -> Self {
        Self {
            kinds: Some(HashSet::from([kind])),
            predicate: None,
        }
    }

    /// Match a set of event kinds
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
            predicate: None,
        }
    }

    /// Additionally require the predicate to hold
    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EventMessage) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn matches(&self, message: &EventMessage) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&message.kind()) {
                return false;
            }
        }
        match &self.predicate {
            Some(predicate) => predicate(message),
            None => true,
        }
    }
}

impl fmt::Debug for SubscriptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionFilter")
            .field("kinds", &self.kinds)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

type Handler = Arc<dyn Fn(&EventMessage) + Send + Sync>;

struct Subscriber {
    filter: SubscriptionFilter,
    handler: Handler,
}

/// Process-wide publish/subscribe hub, owned by the service root
#[derive(Default)]
pub struct MessageBus {
    subscribers: RwLock<BTreeMap<u64, Subscriber>>,
    next_id: AtomicU64,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every published message matching the filter
    pub fn subscribe<F>(&self, filter: SubscriptionFilter, handler: F) -> SubscriptionId
    where
        F: Fn(&EventMessage) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.write().unwrap().insert(
            id,
            Subscriber {
                filter,
                handler: Arc::new(handler),
            },
        );
        SubscriptionId(id)
    }

    /// Remove a subscription. Idempotent: unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().unwrap().remove(&id.0);
    }

    /// Deliver the message to every currently registered matching
    /// subscriber, in subscription order. A subscriber snapshotted by an
    /// in-flight publish may still receive one message after a concurrent
    /// unsubscribe returns; that race is benign.
    pub fn publish(&self, message: &EventMessage) {
        let matched: Vec<(u64, Handler)> = {
            let subscribers = self.subscribers.read().unwrap();
            subscribers
                .iter()
                .filter(|(_, s)| s.filter.matches(message))
                .map(|(id, s)| (*id, s.handler.clone()))
                .collect()
        };

        for (id, handler) in matched {
            if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                tracing::warn!(
                    subscriber = %SubscriptionId(id),
                    kind = ?message.kind(),
                    "subscriber panicked while handling event"
                );
            }
        }
    }

    /// Number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }
}
