//! Provider SPI implemented by each protocol
//!
//! A provider is bound to exactly one reference and one asset connection.
//! The three capability roles are independently optional per reference;
//! the manager and the dispatch core only ever talk to these traits.

use crate::error::Result;
use crate::value::TypedValue;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Callback invoked with the converted model value whenever the asset-side
/// value changes
pub type NewValueListener = Arc<dyn Fn(TypedValue) + Send + Sync>;

/// Opaque token identifying one active protocol-side subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live read/write access to one asset-side data point
#[async_trait]
pub trait AssetValueProvider: Send + Sync {
    /// Fetch the current asset value, converted to the bound model datatype
    async fn read(&self) -> Result<TypedValue>;

    /// Convert and write a model value to the asset
    async fn write(&self, value: TypedValue) -> Result<()>;
}

impl fmt::Debug for dyn AssetValueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AssetValueProvider")
    }
}

/// Invocation of one asset-side operation
#[async_trait]
pub trait AssetOperationProvider: Send + Sync {
    /// Invoke with arguments bound by exact name. Missing required
    /// arguments fail before any protocol call is made.
    async fn invoke(
        &self,
        inputs: &BTreeMap<String, TypedValue>,
    ) -> Result<BTreeMap<String, TypedValue>>;
}

/// Asset-side change notifications for one data point
#[async_trait]
pub trait AssetSubscriptionProvider: Send + Sync {
    /// Establish the protocol-side push or poll mechanism and deliver each
    /// changed value to the listener
    async fn subscribe(&self, listener: NewValueListener) -> Result<SubscriptionHandle>;

    /// Stop delivery and release protocol-side resources. Idempotent:
    /// unsubscribing an unknown handle is a no-op.
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()>;
}
