//! Twinbridge Core Runtime
//!
//! This crate provides the runtime core of a digital-twin service:
//! - Typed values with bidirectional protocol conversion
//! - Asset connections exposing value/operation/subscription providers
//! - An in-process publish/subscribe bus for typed event messages
//! - A request dispatch core coordinating persistence and live asset access

pub mod bus;
pub mod config;
pub mod connection;
pub mod conversion;
pub mod error;
pub mod handler;
pub mod manager;
pub mod model;
pub mod persistence;
pub mod provider;
pub mod reference;
pub mod service;
pub mod value;

pub use bus::{EventKind, EventMessage, MessageBus, SubscriptionFilter, SubscriptionId};
pub use config::Credentials;
pub use connection::{AssetConnection, ConnectionState};
pub use conversion::{
    ConversionKey, ProtocolDatatype, ProtocolValue, ValueConverter,
};
pub use error::{Error, Result, StatusCode};
pub use handler::{Payload, Request, RequestHandler, Response};
pub use manager::AssetConnectionManager;
pub use model::{ElementKind, SubmodelElement};
pub use persistence::{Depth, MemoryPersistence, Persistence, QueryModifier};
pub use provider::{
    AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider, NewValueListener,
    SubscriptionHandle,
};
pub use reference::{KeyType, Reference, ReferenceKey};
pub use service::Service;
pub use value::{Datatype, TypedValue};
