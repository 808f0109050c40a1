//! HTTP asset connection for the twinbridge runtime
//!
//! Binds model references to HTTP resources with JSON payloads: value
//! access via GET/PUT, operation invocation via POST, and change
//! subscription via interval polling. Construct an
//! [`HttpAssetConnection`] from an [`HttpAssetConnectionConfig`] and hand
//! it to the core's connection manager.

pub mod config;
pub mod connection;
pub mod provider;

pub use config::{
    HttpAssetConnectionConfig, HttpOperationArgument, HttpOperationProviderConfig,
    HttpOperationResult, HttpSubscriptionProviderConfig, HttpValueProviderConfig,
};
pub use connection::{HttpAssetConnection, HttpSession};
pub use provider::{HttpOperationProvider, HttpSubscriptionProvider, HttpValueProvider};
