//! Service root wiring persistence, asset connections and the event bus
//!
//! `start()` brings up every configured connection (partial failures are
//! reported per endpoint and tolerated) and bridges each bound subscription
//! provider into the bus: asset pushes flow through one forwarder task per
//! reference, which keeps asset-side ordering, updates the stored element,
//! and publishes the value change.

use crate::bus::{EventMessage, MessageBus};
use crate::error::{Error, Result};
use crate::handler::{Request, RequestHandler, Response};
use crate::manager::AssetConnectionManager;
use crate::persistence::{Persistence, QueryModifier};
use crate::provider::{AssetSubscriptionProvider, NewValueListener, SubscriptionHandle};
use crate::reference::Reference;
use crate::value::TypedValue;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

struct ActiveSubscription {
    reference: Reference,
    provider: Arc<dyn AssetSubscriptionProvider>,
    handle: SubscriptionHandle,
    forwarder: JoinHandle<()>,
}

/// The runtime core of the service: owns the model store, the asset
/// connections and the message bus, and dispatches API requests
pub struct Service {
    persistence: Arc<dyn Persistence>,
    connections: Arc<AssetConnectionManager>,
    bus: Arc<MessageBus>,
    handler: RequestHandler,
    subscriptions: Mutex<Vec<ActiveSubscription>>,
}

impl Service {
    pub fn new(persistence: Arc<dyn Persistence>, connections: AssetConnectionManager) -> Self {
        let connections = Arc::new(connections);
        let bus = Arc::new(MessageBus::new());
        let handler = RequestHandler::new(persistence.clone(), connections.clone(), bus.clone());
        Self {
            persistence,
            connections,
            bus,
            handler,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn connections(&self) -> &Arc<AssetConnectionManager> {
        &self.connections
    }

    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    /// Dispatch one API request
    pub async fn execute(&self, request: Request) -> Response {
        self.handler.handle(request).await
    }

    /// Connect all endpoints and wire asset-side subscriptions into the
    /// bus. Fails only if connections were configured and none came up.
    pub async fn start(&self) -> Result<()> {
        let results = self.connections.connect_all().await;
        if !results.is_empty() && results.iter().all(|(_, r)| r.is_err()) {
            return Err(Error::Connection(
                "no configured asset connection could be established".into(),
            ));
        }

        let mut subscriptions = self.subscriptions.lock().await;
        for (reference, connection) in self.connections.subscription_bindings() {
            let provider = match connection.subscription_provider(&reference) {
                Ok(provider) => provider,
                Err(e) => {
                    tracing::warn!(
                        reference = %reference,
                        endpoint = %connection.endpoint(),
                        error = %e,
                        "skipping subscription wiring"
                    );
                    continue;
                }
            };

            let (listener, forwarder) = self.forwarder(reference.clone());
            match provider.subscribe(listener).await {
                Ok(handle) => {
                    tracing::debug!(reference = %reference, "asset subscription active");
                    subscriptions.push(ActiveSubscription {
                        reference,
                        provider,
                        handle,
                        forwarder,
                    });
                }
                Err(e) => {
                    forwarder.abort();
                    tracing::warn!(reference = %reference, error = %e, "asset subscription failed");
                }
            }
        }
        Ok(())
    }

    /// One forwarder task per subscribed reference: values arrive from the
    /// protocol callback in asset order, get written to persistence, and
    /// are published as value changes.
    fn forwarder(&self, reference: Reference) -> (NewValueListener, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<TypedValue>();
        let persistence = self.persistence.clone();
        let bus = self.bus.clone();
        let task_reference = reference.clone();

        let forwarder = tokio::spawn(async move {
            while let Some(value) = rx.recv().await {
                // Unshaped fetch: the stored copy is written back whole
                let element = match persistence
                    .get(&task_reference, &QueryModifier::full())
                    .await
                {
                    Ok(element) => element,
                    Err(e) => {
                        tracing::warn!(
                            reference = %task_reference,
                            error = %e,
                            "dropping asset value change for unknown element"
                        );
                        continue;
                    }
                };
                if element.value == value {
                    continue;
                }
                let old = element.value.clone();
                if let Err(e) = persistence.put(element.with_value(value.clone())).await {
                    tracing::warn!(reference = %task_reference, error = %e, "failed to store asset value change");
                    continue;
                }
                bus.publish(&EventMessage::ValueChange {
                    reference: task_reference.clone(),
                    old: Some(old),
                    new: value,
                });
            }
        });

        let listener: NewValueListener = Arc::new(move |value| {
            // Receiver gone means the service stopped; drop silently.
            let _ = tx.send(value);
        });
        (listener, forwarder)
    }

    /// Cancel all asset subscriptions and disconnect every endpoint
    pub async fn stop(&self) {
        let mut subscriptions = self.subscriptions.lock().await;
        for subscription in subscriptions.drain(..) {
            if let Err(e) = subscription.provider.unsubscribe(subscription.handle).await {
                tracing::warn!(
                    reference = %subscription.reference,
                    error = %e,
                    "failed to unsubscribe from asset"
                );
            }
            subscription.forwarder.abort();
        }
        drop(subscriptions);
        self.connections.disconnect_all().await;
    }
}
