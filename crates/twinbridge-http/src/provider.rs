//! HTTP-backed providers
//!
//! Value access maps to GET/PUT on the configured path, operation
//! invocation to POST with a JSON argument object, and change subscription
//! to a poll-and-diff loop on a fixed interval. All payload conversion goes
//! through the connection's [`ValueConverter`].

use crate::config::{
    HttpOperationProviderConfig, HttpSubscriptionProviderConfig, HttpValueProviderConfig,
};
use crate::connection::HttpSession;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use twinbridge_core::{
    AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider, Error,
    NewValueListener, ProtocolValue, Result, SubscriptionHandle, TypedValue, ValueConverter,
};

/// GET/PUT value access to one HTTP resource
pub struct HttpValueProvider {
    session: Arc<HttpSession>,
    converter: Arc<ValueConverter>,
    config: HttpValueProviderConfig,
}

impl HttpValueProvider {
    pub(crate) fn new(
        session: Arc<HttpSession>,
        converter: Arc<ValueConverter>,
        config: HttpValueProviderConfig,
    ) -> Self {
        Self {
            session,
            converter,
            config,
        }
    }
}

#[async_trait]
impl AssetValueProvider for HttpValueProvider {
    async fn read(&self) -> Result<TypedValue> {
        let url = self.session.url(&self.config.path)?;
        let json = self.session.get_json(url, &self.config.headers).await?;
        let protocol = ProtocolValue::from_json(&self.config.protocol_datatype, &json)?;
        self.converter.from_protocol(&protocol, self.config.datatype)
    }

    async fn write(&self, value: TypedValue) -> Result<()> {
        let protocol = self
            .converter
            .to_protocol(&value, &self.config.protocol_datatype)?;
        let url = self.session.url(&self.config.path)?;
        self.session
            .put_json(url, &protocol.to_json(), &self.config.headers)
            .await
    }
}

/// POST invocation of one HTTP-backed operation
pub struct HttpOperationProvider {
    session: Arc<HttpSession>,
    converter: Arc<ValueConverter>,
    config: HttpOperationProviderConfig,
}

impl HttpOperationProvider {
    pub(crate) fn new(
        session: Arc<HttpSession>,
        converter: Arc<ValueConverter>,
        config: HttpOperationProviderConfig,
    ) -> Self {
        Self {
            session,
            converter,
            config,
        }
    }
}

#[async_trait]
impl AssetOperationProvider for HttpOperationProvider {
    async fn invoke(
        &self,
        inputs: &BTreeMap<String, TypedValue>,
    ) -> Result<BTreeMap<String, TypedValue>> {
        // Validate the full argument set before any request goes out
        for argument in &self.config.arguments {
            if argument.required && !inputs.contains_key(&argument.name) {
                return Err(Error::InvalidRequest(format!(
                    "missing required input argument '{}'",
                    argument.name
                )));
            }
        }
        for name in inputs.keys() {
            if !self.config.arguments.iter().any(|a| &a.name == name) {
                return Err(Error::InvalidRequest(format!(
                    "unknown input argument '{name}'"
                )));
            }
        }

        let mut body = serde_json::Map::new();
        for argument in &self.config.arguments {
            if let Some(value) = inputs.get(&argument.name) {
                let protocol = self
                    .converter
                    .to_protocol(value, &argument.protocol_datatype)?;
                body.insert(argument.name.clone(), protocol.to_json());
            }
        }

        let url = self.session.url(&self.config.path)?;
        let response = self
            .session
            .post_json(url, &serde_json::Value::Object(body))
            .await?;

        let mut outputs = BTreeMap::new();
        for result in &self.config.results {
            let json = response.get(&result.name).ok_or_else(|| {
                Error::Connection(format!(
                    "operation response missing declared result '{}'",
                    result.name
                ))
            })?;
            let protocol = ProtocolValue::from_json(&result.protocol_datatype, json)?;
            let value = self.converter.from_protocol(&protocol, result.datatype)?;
            outputs.insert(result.name.clone(), value);
        }
        Ok(outputs)
    }
}

/// Poll-and-diff change subscription on one HTTP resource.
///
/// Each subscription owns a polling task; the listener fires only when the
/// converted value differs from the previously delivered one. Poll failures
/// are logged and the loop keeps going.
pub struct HttpSubscriptionProvider {
    session: Arc<HttpSession>,
    converter: Arc<ValueConverter>,
    config: HttpSubscriptionProviderConfig,
    tasks: DashMap<SubscriptionHandle, JoinHandle<()>>,
}

impl HttpSubscriptionProvider {
    pub(crate) fn new(
        session: Arc<HttpSession>,
        converter: Arc<ValueConverter>,
        config: HttpSubscriptionProviderConfig,
    ) -> Self {
        Self {
            session,
            converter,
            config,
            tasks: DashMap::new(),
        }
    }

    /// Abort every polling task owned by this provider
    pub(crate) fn cancel_all(&self) {
        self.tasks.retain(|_, task| {
            task.abort();
            false
        });
    }
}

#[async_trait]
impl AssetSubscriptionProvider for HttpSubscriptionProvider {
    async fn subscribe(&self, listener: NewValueListener) -> Result<SubscriptionHandle> {
        let handle = SubscriptionHandle::new();
        let session = self.session.clone();
        let converter = self.converter.clone();
        let config = self.config.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last: Option<TypedValue> = None;
            loop {
                interval.tick().await;
                let url = match session.url(&config.path) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(path = %config.path, error = %e, "subscription path invalid, stopping poll");
                        return;
                    }
                };
                let value = session
                    .get_json(url, &[])
                    .await
                    .and_then(|json| ProtocolValue::from_json(&config.protocol_datatype, &json))
                    .and_then(|protocol| converter.from_protocol(&protocol, config.datatype));
                match value {
                    Ok(value) => {
                        if last.as_ref() != Some(&value) {
                            last = Some(value.clone());
                            listener(value);
                        }
                    }
                    Err(e) => {
                        debug!(path = %config.path, error = %e, "poll failed");
                    }
                }
            }
        });
        self.tasks.insert(handle, task);
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        if let Some((_, task)) = self.tasks.remove(&handle) {
            task.abort();
        }
        Ok(())
    }
}
