//! Routing and lifecycle for the configured set of asset connections
//!
//! The manager indexes references to their owning connection eagerly at
//! construction time. A reference is claimed by at most one connection per
//! capability; a second claim is a configuration error, not a runtime one.

use crate::connection::AssetConnection;
use crate::error::{Error, Result};
use crate::provider::{AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider};
use crate::reference::Reference;
use std::collections::HashMap;
use std::sync::Arc;

/// Owns all configured asset connections and routes references to them
pub struct AssetConnectionManager {
    connections: Vec<Arc<dyn AssetConnection>>,
    value_index: HashMap<Reference, usize>,
    operation_index: HashMap<Reference, usize>,
    subscription_index: HashMap<Reference, usize>,
}

impl AssetConnectionManager {
    /// Build the reference index over the configured connections.
    /// Fails eagerly if two connections claim the same reference for the
    /// same capability.
    pub fn new(connections: Vec<Arc<dyn AssetConnection>>) -> Result<Self> {
        let mut value_index = HashMap::new();
        let mut operation_index = HashMap::new();
        let mut subscription_index = HashMap::new();

        for (i, connection) in connections.iter().enumerate() {
            Self::claim(&mut value_index, connection.value_references(), i, "value")?;
            Self::claim(
                &mut operation_index,
                connection.operation_references(),
                i,
                "operation",
            )?;
            Self::claim(
                &mut subscription_index,
                connection.subscription_references(),
                i,
                "subscription",
            )?;
        }

        Ok(Self {
            connections,
            value_index,
            operation_index,
            subscription_index,
        })
    }

    fn claim(
        index: &mut HashMap<Reference, usize>,
        references: Vec<Reference>,
        connection: usize,
        capability: &str,
    ) -> Result<()> {
        for reference in references {
            if index.insert(reference.clone(), connection).is_some() {
                return Err(Error::Configuration(format!(
                    "reference {reference} is claimed by more than one connection \
                     for capability '{capability}'"
                )));
            }
        }
        Ok(())
    }

    /// Value provider bound to the reference, or a not-registered error
    pub fn get_value_provider(&self, reference: &Reference) -> Result<Arc<dyn AssetValueProvider>> {
        let i = self.value_index.get(reference).ok_or_else(|| {
            Error::ProviderNotRegistered {
                capability: "value",
                reference: reference.to_string(),
            }
        })?;
        self.connections[*i].value_provider(reference)
    }

    /// Operation provider bound to the reference, or a not-registered error
    pub fn get_operation_provider(
        &self,
        reference: &Reference,
    ) -> Result<Arc<dyn AssetOperationProvider>> {
        let i = self.operation_index.get(reference).ok_or_else(|| {
            Error::ProviderNotRegistered {
                capability: "operation",
                reference: reference.to_string(),
            }
        })?;
        self.connections[*i].operation_provider(reference)
    }

    /// Subscription provider bound to the reference, or a not-registered error
    pub fn get_subscription_provider(
        &self,
        reference: &Reference,
    ) -> Result<Arc<dyn AssetSubscriptionProvider>> {
        let i = self.subscription_index.get(reference).ok_or_else(|| {
            Error::ProviderNotRegistered {
                capability: "subscription",
                reference: reference.to_string(),
            }
        })?;
        self.connections[*i].subscription_provider(reference)
    }

    pub fn has_value_provider(&self, reference: &Reference) -> bool {
        self.value_index.contains_key(reference)
    }

    pub fn has_operation_provider(&self, reference: &Reference) -> bool {
        self.operation_index.contains_key(reference)
    }

    pub fn has_subscription_provider(&self, reference: &Reference) -> bool {
        self.subscription_index.contains_key(reference)
    }

    /// All (reference, connection) pairs configured for change subscription
    pub fn subscription_bindings(&self) -> Vec<(Reference, Arc<dyn AssetConnection>)> {
        self.subscription_index
            .iter()
            .map(|(reference, i)| (reference.clone(), self.connections[*i].clone()))
            .collect()
    }

    pub fn connections(&self) -> &[Arc<dyn AssetConnection>] {
        &self.connections
    }

    /// Connect every configured connection. Failures are isolated and
    /// reported per endpoint; one failing endpoint does not prevent the
    /// others from connecting.
    pub async fn connect_all(&self) -> Vec<(String, Result<()>)> {
        let mut results = Vec::with_capacity(self.connections.len());
        for connection in &self.connections {
            let endpoint = connection.endpoint();
            let result = connection.connect().await;
            if let Err(e) = &result {
                tracing::warn!(endpoint = %endpoint, error = %e, "asset connection failed to connect");
            } else {
                tracing::info!(endpoint = %endpoint, "asset connection established");
            }
            results.push((endpoint, result));
        }
        results
    }

    /// Disconnect every connection, reporting failures per endpoint
    pub async fn disconnect_all(&self) -> Vec<(String, Result<()>)> {
        let mut results = Vec::with_capacity(self.connections.len());
        for connection in &self.connections {
            let endpoint = connection.endpoint();
            let result = connection.disconnect().await;
            if let Err(e) = &result {
                tracing::warn!(endpoint = %endpoint, error = %e, "asset connection failed to disconnect");
            }
            results.push((endpoint, result));
        }
        results
    }
}
