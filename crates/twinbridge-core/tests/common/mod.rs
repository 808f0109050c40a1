//! Simulated asset connection used by the integration tests
//!
//! Backs every provider role with an in-memory value table so the manager,
//! handler and service can be exercised without a real protocol stack.

#![allow(dead_code)]

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use twinbridge_core::{
    AssetConnection, AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider,
    ConnectionState, Error, MemoryPersistence, NewValueListener, Persistence, QueryModifier,
    Reference, Result, SubmodelElement, SubscriptionHandle, TypedValue,
};

pub struct SimulatedAssetConnection {
    endpoint: String,
    fail_connect: bool,
    state: Arc<RwLock<ConnectionState>>,
    values: Arc<DashMap<Reference, TypedValue>>,
    value_refs: Vec<Reference>,
    operation_refs: Vec<Reference>,
    subscription_refs: Vec<Reference>,
    required_args: Vec<String>,
    pub operation_calls: Arc<AtomicUsize>,
    value_providers: DashMap<Reference, Arc<SimulatedValueProvider>>,
    operation_providers: DashMap<Reference, Arc<SimulatedOperationProvider>>,
    subscription_providers: DashMap<Reference, Arc<SimulatedSubscriptionProvider>>,
}

impl SimulatedAssetConnection {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            fail_connect: false,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            values: Arc::new(DashMap::new()),
            value_refs: Vec::new(),
            operation_refs: Vec::new(),
            subscription_refs: Vec::new(),
            required_args: Vec::new(),
            operation_calls: Arc::new(AtomicUsize::new(0)),
            value_providers: DashMap::new(),
            operation_providers: DashMap::new(),
            subscription_providers: DashMap::new(),
        }
    }

    pub fn failing(endpoint: impl Into<String>) -> Self {
        let mut connection = Self::new(endpoint);
        connection.fail_connect = true;
        connection
    }

    pub fn bind_value(&mut self, reference: Reference, initial: TypedValue) {
        self.values.insert(reference.clone(), initial);
        self.value_refs.push(reference);
    }

    pub fn bind_operation(&mut self, reference: Reference, required_args: Vec<String>) {
        self.required_args = required_args;
        self.operation_refs.push(reference);
    }

    pub fn bind_subscription(&mut self, reference: Reference) {
        self.subscription_refs.push(reference);
    }

    /// Mutate the asset-side value directly (bypassing the providers)
    pub fn set_asset_value(&self, reference: &Reference, value: TypedValue) {
        self.values.insert(reference.clone(), value);
    }

    pub fn asset_value(&self, reference: &Reference) -> Option<TypedValue> {
        self.values.get(reference).map(|v| v.clone())
    }

    /// Concrete subscription provider, for pushing changes from tests
    pub fn simulated_subscription(&self, reference: &Reference) -> Arc<SimulatedSubscriptionProvider> {
        self.subscription_providers
            .entry(reference.clone())
            .or_insert_with(|| Arc::new(SimulatedSubscriptionProvider::default()))
            .clone()
    }
}

#[async_trait]
impl AssetConnection for SimulatedAssetConnection {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn state(&self) -> ConnectionState {
        *self.state.read().unwrap()
    }

    async fn connect(&self) -> Result<()> {
        *self.state.write().unwrap() = ConnectionState::Connecting;
        if self.fail_connect {
            *self.state.write().unwrap() = ConnectionState::Failed;
            return Err(Error::Connection(format!(
                "simulated endpoint {} refused the session",
                self.endpoint
            )));
        }
        *self.state.write().unwrap() = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        for provider in self.subscription_providers.iter() {
            provider.value().cancel_all();
        }
        *self.state.write().unwrap() = ConnectionState::Disconnected;
        Ok(())
    }

    fn value_references(&self) -> Vec<Reference> {
        self.value_refs.clone()
    }

    fn operation_references(&self) -> Vec<Reference> {
        self.operation_refs.clone()
    }

    fn subscription_references(&self) -> Vec<Reference> {
        self.subscription_refs.clone()
    }

    fn value_provider(&self, reference: &Reference) -> Result<Arc<dyn AssetValueProvider>> {
        if !self.value_refs.contains(reference) {
            return Err(Error::ProviderNotRegistered {
                capability: "value",
                reference: reference.to_string(),
            });
        }
        let provider = self
            .value_providers
            .entry(reference.clone())
            .or_insert_with(|| {
                Arc::new(SimulatedValueProvider {
                    reference: reference.clone(),
                    values: self.values.clone(),
                    state: self.state.clone(),
                })
            })
            .clone();
        Ok(provider)
    }

    fn operation_provider(&self, reference: &Reference) -> Result<Arc<dyn AssetOperationProvider>> {
        if !self.operation_refs.contains(reference) {
            return Err(Error::ProviderNotRegistered {
                capability: "operation",
                reference: reference.to_string(),
            });
        }
        let provider = self
            .operation_providers
            .entry(reference.clone())
            .or_insert_with(|| {
                Arc::new(SimulatedOperationProvider {
                    required_args: self.required_args.clone(),
                    calls: self.operation_calls.clone(),
                })
            })
            .clone();
        Ok(provider)
    }

    fn subscription_provider(
        &self,
        reference: &Reference,
    ) -> Result<Arc<dyn AssetSubscriptionProvider>> {
        if !self.subscription_refs.contains(reference) {
            return Err(Error::ProviderNotRegistered {
                capability: "subscription",
                reference: reference.to_string(),
            });
        }
        Ok(self.simulated_subscription(reference))
    }
}

pub struct SimulatedValueProvider {
    reference: Reference,
    values: Arc<DashMap<Reference, TypedValue>>,
    state: Arc<RwLock<ConnectionState>>,
}

impl SimulatedValueProvider {
    fn ensure_connected(&self) -> Result<()> {
        if *self.state.read().unwrap() == ConnectionState::Connected {
            Ok(())
        } else {
            Err(Error::Connection("simulated session not connected".into()))
        }
    }
}

#[async_trait]
impl AssetValueProvider for SimulatedValueProvider {
    async fn read(&self) -> Result<TypedValue> {
        self.ensure_connected()?;
        self.values
            .get(&self.reference)
            .map(|v| v.clone())
            .ok_or_else(|| Error::Connection("simulated asset has no such value".into()))
    }

    async fn write(&self, value: TypedValue) -> Result<()> {
        self.ensure_connected()?;
        self.values.insert(self.reference.clone(), value);
        Ok(())
    }
}

pub struct SimulatedOperationProvider {
    required_args: Vec<String>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl AssetOperationProvider for SimulatedOperationProvider {
    async fn invoke(
        &self,
        inputs: &BTreeMap<String, TypedValue>,
    ) -> Result<BTreeMap<String, TypedValue>> {
        for name in &self.required_args {
            if !inputs.contains_key(name) {
                return Err(Error::InvalidRequest(format!(
                    "missing required input argument '{name}'"
                )));
            }
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outputs = inputs.clone();
        outputs.insert("status".to_string(), TypedValue::from("ok"));
        Ok(outputs)
    }
}

#[derive(Default)]
pub struct SimulatedSubscriptionProvider {
    listeners: DashMap<SubscriptionHandle, NewValueListener>,
    cancelled: AtomicBool,
}

impl SimulatedSubscriptionProvider {
    /// Simulate the asset producing a new value
    pub fn push(&self, value: TypedValue) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        for listener in self.listeners.iter() {
            listener.value()(value.clone());
        }
    }

    pub fn cancel_all(&self) {
        self.listeners.clear();
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl AssetSubscriptionProvider for SimulatedSubscriptionProvider {
    async fn subscribe(&self, listener: NewValueListener) -> Result<SubscriptionHandle> {
        let handle = SubscriptionHandle::new();
        self.listeners.insert(handle, listener);
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        self.listeners.remove(&handle);
        Ok(())
    }
}

/// Persistence wrapper whose writes can be made to fail on demand
pub struct FlakyPersistence {
    inner: MemoryPersistence,
    pub fail_puts: AtomicBool,
}

impl FlakyPersistence {
    pub fn new() -> Self {
        Self {
            inner: MemoryPersistence::new(),
            fail_puts: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Persistence for FlakyPersistence {
    async fn get(
        &self,
        reference: &Reference,
        modifier: &QueryModifier,
    ) -> Result<SubmodelElement> {
        self.inner.get(reference, modifier).await
    }

    async fn put(&self, element: SubmodelElement) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::Internal("simulated storage failure".into()));
        }
        self.inner.put(element).await
    }

    async fn remove(&self, reference: &Reference) -> Result<SubmodelElement> {
        self.inner.remove(reference).await
    }

    async fn list(
        &self,
        parent: Option<&Reference>,
        modifier: &QueryModifier,
    ) -> Result<Vec<SubmodelElement>> {
        self.inner.list(parent, modifier).await
    }
}
