//! End-to-end tests against a stub HTTP asset

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use twinbridge_core::{
    AssetConnection, AssetOperationProvider, AssetSubscriptionProvider, AssetValueProvider,
    ConnectionState, Datatype, Error, ProtocolDatatype, Reference, TypedValue, ValueConverter,
};
use twinbridge_http::{
    HttpAssetConnection, HttpAssetConnectionConfig, HttpOperationArgument,
    HttpOperationProviderConfig, HttpOperationResult, HttpSubscriptionProviderConfig,
    HttpValueProviderConfig,
};

#[derive(Clone, Default)]
struct StubState {
    temperature: Arc<RwLock<serde_json::Value>>,
    invoke_count: Arc<AtomicUsize>,
}

async fn get_temperature(State(state): State<StubState>) -> Json<serde_json::Value> {
    Json(state.temperature.read().unwrap().clone())
}

async fn put_temperature(State(state): State<StubState>, Json(value): Json<serde_json::Value>) {
    *state.temperature.write().unwrap() = value;
}

async fn start_pump(
    State(state): State<StubState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    state.invoke_count.fetch_add(1, Ordering::SeqCst);
    let speed = body.get("speed").and_then(|v| v.as_i64()).unwrap_or(0);
    Json(serde_json::json!({ "status": "ok", "applied_speed": speed }))
}

async fn spawn_stub_asset() -> (SocketAddr, StubState) {
    let state = StubState::default();
    *state.temperature.write().unwrap() = serde_json::json!(20.0);
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/temperature", get(get_temperature).put(put_temperature))
        .route("/pump/start", post(start_pump))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn temperature_reference() -> Reference {
    Reference::submodel_property("urn:plant", "temperature")
}

fn pump_reference() -> Reference {
    Reference::submodel_property("urn:plant", "startPump")
}

fn connection_config(addr: SocketAddr) -> HttpAssetConnectionConfig {
    let mut config = HttpAssetConnectionConfig::new(format!("http://{addr}/"));
    config.value_providers.insert(
        temperature_reference(),
        HttpValueProviderConfig::new("/temperature", Datatype::Double, ProtocolDatatype::Double),
    );
    config.operation_providers.insert(
        pump_reference(),
        HttpOperationProviderConfig {
            path: "/pump/start".to_string(),
            arguments: vec![HttpOperationArgument {
                name: "speed".to_string(),
                protocol_datatype: ProtocolDatatype::Int32,
                required: true,
            }],
            results: vec![
                HttpOperationResult {
                    name: "status".to_string(),
                    datatype: Datatype::String,
                    protocol_datatype: ProtocolDatatype::String,
                },
                HttpOperationResult {
                    name: "applied_speed".to_string(),
                    datatype: Datatype::Int,
                    protocol_datatype: ProtocolDatatype::Int32,
                },
            ],
        },
    );
    config.subscription_providers.insert(
        temperature_reference(),
        HttpSubscriptionProviderConfig {
            path: "/temperature".to_string(),
            datatype: Datatype::Double,
            protocol_datatype: ProtocolDatatype::Double,
            interval: Duration::from_millis(20),
        },
    );
    config
}

async fn connected(addr: SocketAddr) -> HttpAssetConnection {
    let connection =
        HttpAssetConnection::new(connection_config(addr), Arc::new(ValueConverter::new()))
            .unwrap();
    connection.connect().await.unwrap();
    connection
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_connect_probes_endpoint() {
    let (addr, _state) = spawn_stub_asset().await;
    let connection = connected(addr).await;
    assert_eq!(connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_connect_failure_marks_failed() {
    // Bind and drop a listener so the port is (very likely) unreachable
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connection =
        HttpAssetConnection::new(connection_config(addr), Arc::new(ValueConverter::new()))
            .unwrap();
    assert!(connection.connect().await.is_err());
    assert_eq!(connection.state(), ConnectionState::Failed);

    // Providers refuse to issue requests on a failed session
    let provider = connection.value_provider(&temperature_reference()).unwrap();
    match provider.read().await {
        Err(Error::Connection(_)) => {}
        other => panic!("expected connection error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_base_url_is_configuration_error() {
    let config = HttpAssetConnectionConfig::new("not a url");
    match HttpAssetConnection::new(config, Arc::new(ValueConverter::new())) {
        Err(Error::Configuration(_)) => {}
        other => panic!("expected configuration error, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_value_read_and_write() {
    let (addr, state) = spawn_stub_asset().await;
    let connection = connected(addr).await;
    let provider = connection.value_provider(&temperature_reference()).unwrap();

    assert_eq!(provider.read().await.unwrap(), TypedValue::from(20.0f64));

    provider.write(TypedValue::from(23.5f64)).await.unwrap();
    assert_eq!(
        *state.temperature.read().unwrap(),
        serde_json::json!(23.5)
    );
    assert_eq!(provider.read().await.unwrap(), TypedValue::from(23.5f64));
}

#[tokio::test]
async fn test_unconfigured_reference_has_no_provider() {
    let (addr, _state) = spawn_stub_asset().await;
    let connection = connected(addr).await;
    let unknown = Reference::submodel_property("urn:plant", "unknown");
    match connection.value_provider(&unknown) {
        Err(Error::ProviderNotRegistered { capability, .. }) => assert_eq!(capability, "value"),
        other => panic!("expected provider-not-registered, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_operation_invoke_returns_declared_results() {
    let (addr, state) = spawn_stub_asset().await;
    let connection = connected(addr).await;
    let provider = connection.operation_provider(&pump_reference()).unwrap();

    let mut inputs = BTreeMap::new();
    inputs.insert("speed".to_string(), TypedValue::from(750i32));
    let outputs = provider.invoke(&inputs).await.unwrap();

    assert_eq!(outputs.get("status"), Some(&TypedValue::from("ok")));
    assert_eq!(outputs.get("applied_speed"), Some(&TypedValue::from(750i32)));
    assert_eq!(state.invoke_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_operation_argument_validation_precedes_request() {
    let (addr, state) = spawn_stub_asset().await;
    let connection = connected(addr).await;
    let provider = connection.operation_provider(&pump_reference()).unwrap();

    // Missing required argument
    let err = provider.invoke(&BTreeMap::new()).await.unwrap_err();
    match &err {
        Error::InvalidRequest(msg) => assert!(msg.contains("speed")),
        other => panic!("expected invalid request, got {other:?}"),
    }

    // Unknown argument
    let mut inputs = BTreeMap::new();
    inputs.insert("speed".to_string(), TypedValue::from(1i32));
    inputs.insert("bogus".to_string(), TypedValue::from(1i32));
    assert!(matches!(
        provider.invoke(&inputs).await,
        Err(Error::InvalidRequest(_))
    ));

    // Neither attempt reached the asset
    assert_eq!(state.invoke_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_subscription_polls_and_suppresses_duplicates() {
    let (addr, state) = spawn_stub_asset().await;
    let connection = connected(addr).await;
    let provider = connection
        .subscription_provider(&temperature_reference())
        .unwrap();

    let seen: Arc<Mutex<Vec<TypedValue>>> = Arc::new(Mutex::new(Vec::new()));
    let handle = {
        let seen = seen.clone();
        provider
            .subscribe(Arc::new(move |value| {
                seen.lock().unwrap().push(value);
            }))
            .await
            .unwrap()
    };

    wait_for(|| !seen.lock().unwrap().is_empty()).await;
    assert_eq!(seen.lock().unwrap()[0], TypedValue::from(20.0f64));

    *state.temperature.write().unwrap() = serde_json::json!(21.0);
    wait_for(|| seen.lock().unwrap().len() >= 2).await;

    // Value stays put; repeated polls must not redeliver it
    tokio::time::sleep(Duration::from_millis(100)).await;
    let delivered = seen.lock().unwrap().clone();
    assert_eq!(
        delivered,
        vec![TypedValue::from(20.0f64), TypedValue::from(21.0f64)]
    );

    provider.unsubscribe(handle).await.unwrap();
    *state.temperature.write().unwrap() = serde_json::json!(99.0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(seen.lock().unwrap().len(), 2);

    // Unsubscribing again is a no-op
    provider.unsubscribe(handle).await.unwrap();
}

#[tokio::test]
async fn test_disconnect_stops_polling_and_requests() {
    let (addr, state) = spawn_stub_asset().await;
    let connection = connected(addr).await;
    let provider = connection
        .subscription_provider(&temperature_reference())
        .unwrap();

    let seen: Arc<Mutex<Vec<TypedValue>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        provider
            .subscribe(Arc::new(move |value| {
                seen.lock().unwrap().push(value);
            }))
            .await
            .unwrap();
    }
    wait_for(|| !seen.lock().unwrap().is_empty()).await;

    connection.disconnect().await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    *state.temperature.write().unwrap() = serde_json::json!(42.0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    let value_provider = connection.value_provider(&temperature_reference()).unwrap();
    assert!(matches!(
        value_provider.read().await,
        Err(Error::Connection(_))
    ));
}
