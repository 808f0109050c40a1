//! Configuration for HTTP asset connections
//!
//! Plain immutable structs assembled by the caller; per-reference provider
//! configuration is supplied up front and never changes after construction.

use std::collections::HashMap;
use std::time::Duration;
use twinbridge_core::{Credentials, Datatype, ProtocolDatatype, Reference};

/// One HTTP endpoint and the references it serves
#[derive(Debug, Clone)]
pub struct HttpAssetConnectionConfig {
    /// Base URL all provider paths are resolved against
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub request_timeout: Duration,
    pub value_providers: HashMap<Reference, HttpValueProviderConfig>,
    pub operation_providers: HashMap<Reference, HttpOperationProviderConfig>,
    pub subscription_providers: HashMap<Reference, HttpSubscriptionProviderConfig>,
}

impl HttpAssetConnectionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: None,
            request_timeout: Duration::from_secs(10),
            value_providers: HashMap::new(),
            operation_providers: HashMap::new(),
            subscription_providers: HashMap::new(),
        }
    }
}

/// Value access for one reference: GET to read, PUT to write
#[derive(Debug, Clone)]
pub struct HttpValueProviderConfig {
    pub path: String,
    pub datatype: Datatype,
    pub protocol_datatype: ProtocolDatatype,
    pub headers: Vec<(String, String)>,
}

impl HttpValueProviderConfig {
    pub fn new(path: impl Into<String>, datatype: Datatype, protocol_datatype: ProtocolDatatype) -> Self {
        Self {
            path: path.into(),
            datatype,
            protocol_datatype,
            headers: Vec::new(),
        }
    }
}

/// Declared input argument of an HTTP-backed operation
#[derive(Debug, Clone)]
pub struct HttpOperationArgument {
    pub name: String,
    pub protocol_datatype: ProtocolDatatype,
    pub required: bool,
}

/// Declared output of an HTTP-backed operation
#[derive(Debug, Clone)]
pub struct HttpOperationResult {
    pub name: String,
    pub datatype: Datatype,
    pub protocol_datatype: ProtocolDatatype,
}

/// Operation invocation for one reference: POST with a JSON argument object
#[derive(Debug, Clone)]
pub struct HttpOperationProviderConfig {
    pub path: String,
    pub arguments: Vec<HttpOperationArgument>,
    pub results: Vec<HttpOperationResult>,
}

/// Change subscription for one reference: poll-and-diff on an interval
#[derive(Debug, Clone)]
pub struct HttpSubscriptionProviderConfig {
    pub path: String,
    pub datatype: Datatype,
    pub protocol_datatype: ProtocolDatatype,
    pub interval: Duration,
}
