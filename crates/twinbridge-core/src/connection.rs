//! Asset connection contract
//!
//! One connection bridges the model to one externally reachable endpoint
//! over one protocol. It owns the protocol session and a cache of providers,
//! at most one per reference per capability.

use crate::error::Result;
use crate::provider::{AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider};
use crate::reference::Reference;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Failed => "Failed",
        };
        write!(f, "{name}")
    }
}

/// One configured endpoint, implemented per protocol
#[async_trait]
pub trait AssetConnection: Send + Sync {
    /// Endpoint address this connection talks to
    fn endpoint(&self) -> String;

    /// Current lifecycle state
    fn state(&self) -> ConnectionState;

    /// Establish the protocol session. Reconnecting reuses the same
    /// configuration.
    async fn connect(&self) -> Result<()>;

    /// Release the session and cancel all active subscriptions owned by
    /// this connection's providers
    async fn disconnect(&self) -> Result<()>;

    /// References configured for value access on this connection
    fn value_references(&self) -> Vec<Reference>;

    /// References configured for operation invocation on this connection
    fn operation_references(&self) -> Vec<Reference>;

    /// References configured for change subscription on this connection
    fn subscription_references(&self) -> Vec<Reference>;

    /// Cached value provider for the reference; repeated calls return the
    /// same instance
    fn value_provider(&self, reference: &Reference) -> Result<Arc<dyn AssetValueProvider>>;

    /// Cached operation provider for the reference
    fn operation_provider(&self, reference: &Reference)
        -> Result<Arc<dyn AssetOperationProvider>>;

    /// Cached subscription provider for the reference
    fn subscription_provider(
        &self,
        reference: &Reference,
    ) -> Result<Arc<dyn AssetSubscriptionProvider>>;
}
