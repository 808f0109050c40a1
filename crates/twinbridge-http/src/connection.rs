//! HTTP asset connection
//!
//! One connection owns one [`HttpSession`] (a shared `reqwest` client plus
//! the endpoint's base URL and credentials) and hands out cached providers
//! for the references the configuration declares. Connecting probes the
//! base URL so a dead endpoint is reported at startup rather than on the
//! first provider call.

use crate::config::HttpAssetConnectionConfig;
use crate::provider::{HttpOperationProvider, HttpSubscriptionProvider, HttpValueProvider};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Url;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use twinbridge_core::{
    AssetConnection, AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider,
    ConnectionState, Credentials, Error, Reference, Result, ValueConverter,
};

/// Shared protocol session: one client, one base URL, one credential set.
///
/// Every provider of the owning connection holds an `Arc` to the same
/// session, so connection state is observed consistently across them.
pub struct HttpSession {
    client: reqwest::Client,
    base: Url,
    credentials: Option<Credentials>,
    state: RwLock<ConnectionState>,
}

impl HttpSession {
    fn new(config: &HttpAssetConnectionConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| Error::Configuration(format!("invalid base URL '{}': {e}", config.base_url)))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base,
            credentials: config.credentials.clone(),
            state: RwLock::new(ConnectionState::Disconnected),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Providers refuse to issue requests while the session is not connected
    pub fn ensure_connected(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            other => Err(Error::Connection(format!(
                "endpoint {} is {other}, not connected",
                self.base
            ))),
        }
    }

    /// Resolve a provider path against the base URL
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::Configuration(format!("invalid path '{path}': {e}")))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }
        builder
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(Error::Connection(format!(
                "endpoint returned HTTP {status} for {}",
                response.url()
            )))
        }
    }

    /// GET the URL and parse the body as JSON
    pub async fn get_json(
        &self,
        url: Url,
        headers: &[(String, String)],
    ) -> Result<serde_json::Value> {
        self.ensure_connected()?;
        let mut builder = self.request(reqwest::Method::GET, url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Connection(format!("GET failed: {e}")))?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Connection(format!("response body is not JSON: {e}")))
    }

    /// PUT a JSON body to the URL
    pub async fn put_json(
        &self,
        url: Url,
        body: &serde_json::Value,
        headers: &[(String, String)],
    ) -> Result<()> {
        self.ensure_connected()?;
        let mut builder = self.request(reqwest::Method::PUT, url).json(body);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Connection(format!("PUT failed: {e}")))?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// POST a JSON body to the URL and parse the response as JSON
    pub async fn post_json(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.ensure_connected()?;
        let response = self
            .request(reqwest::Method::POST, url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Connection(format!("POST failed: {e}")))?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Connection(format!("response body is not JSON: {e}")))
    }
}

/// Asset connection over plain HTTP with JSON payloads
pub struct HttpAssetConnection {
    config: HttpAssetConnectionConfig,
    session: Arc<HttpSession>,
    converter: Arc<ValueConverter>,
    value_providers: DashMap<Reference, Arc<HttpValueProvider>>,
    operation_providers: DashMap<Reference, Arc<HttpOperationProvider>>,
    subscription_providers: DashMap<Reference, Arc<HttpSubscriptionProvider>>,
}

impl HttpAssetConnection {
    pub fn new(config: HttpAssetConnectionConfig, converter: Arc<ValueConverter>) -> Result<Self> {
        let session = Arc::new(HttpSession::new(&config)?);
        Ok(Self {
            config,
            session,
            converter,
            value_providers: DashMap::new(),
            operation_providers: DashMap::new(),
            subscription_providers: DashMap::new(),
        })
    }
}

#[async_trait]
impl AssetConnection for HttpAssetConnection {
    fn endpoint(&self) -> String {
        self.config.base_url.clone()
    }

    fn state(&self) -> ConnectionState {
        self.session.state()
    }

    async fn connect(&self) -> Result<()> {
        self.session.set_state(ConnectionState::Connecting);
        debug!(endpoint = %self.config.base_url, "probing endpoint");
        let probe = self
            .session
            .request(reqwest::Method::GET, self.session.base.clone())
            .send()
            .await;
        match probe {
            Ok(_) => {
                self.session.set_state(ConnectionState::Connected);
                info!(endpoint = %self.config.base_url, "connected");
                Ok(())
            }
            Err(e) => {
                self.session.set_state(ConnectionState::Failed);
                warn!(endpoint = %self.config.base_url, error = %e, "connect failed");
                Err(Error::Connection(format!(
                    "endpoint {} unreachable: {e}",
                    self.config.base_url
                )))
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        for entry in self.subscription_providers.iter() {
            entry.value().cancel_all();
        }
        self.session.set_state(ConnectionState::Disconnected);
        info!(endpoint = %self.config.base_url, "disconnected");
        Ok(())
    }

    fn value_references(&self) -> Vec<Reference> {
        self.config.value_providers.keys().cloned().collect()
    }

    fn operation_references(&self) -> Vec<Reference> {
        self.config.operation_providers.keys().cloned().collect()
    }

    fn subscription_references(&self) -> Vec<Reference> {
        self.config.subscription_providers.keys().cloned().collect()
    }

    fn value_provider(&self, reference: &Reference) -> Result<Arc<dyn AssetValueProvider>> {
        let config = self.config.value_providers.get(reference).ok_or_else(|| {
            Error::ProviderNotRegistered {
                capability: "value",
                reference: reference.to_string(),
            }
        })?;
        let provider = self
            .value_providers
            .entry(reference.clone())
            .or_insert_with(|| {
                Arc::new(HttpValueProvider::new(
                    self.session.clone(),
                    self.converter.clone(),
                    config.clone(),
                ))
            })
            .clone();
        Ok(provider)
    }

    fn operation_provider(
        &self,
        reference: &Reference,
    ) -> Result<Arc<dyn AssetOperationProvider>> {
        let config = self
            .config
            .operation_providers
            .get(reference)
            .ok_or_else(|| Error::ProviderNotRegistered {
                capability: "operation",
                reference: reference.to_string(),
            })?;
        let provider = self
            .operation_providers
            .entry(reference.clone())
            .or_insert_with(|| {
                Arc::new(HttpOperationProvider::new(
                    self.session.clone(),
                    self.converter.clone(),
                    config.clone(),
                ))
            })
            .clone();
        Ok(provider)
    }

    fn subscription_provider(
        &self,
        reference: &Reference,
    ) -> Result<Arc<dyn AssetSubscriptionProvider>> {
        let config = self
            .config
            .subscription_providers
            .get(reference)
            .ok_or_else(|| Error::ProviderNotRegistered {
                capability: "subscription",
                reference: reference.to_string(),
            })?;
        let provider = self
            .subscription_providers
            .entry(reference.clone())
            .or_insert_with(|| {
                Arc::new(HttpSubscriptionProvider::new(
                    self.session.clone(),
                    self.converter.clone(),
                    config.clone(),
                ))
            })
            .clone();
        Ok(provider)
    }
}
