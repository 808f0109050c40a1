//! Basic example: model elements, requests and the event bus

use std::sync::Arc;
use twinbridge_core::{
    AssetConnectionManager, MemoryPersistence, QueryModifier, Reference, Request, Service,
    SubmodelElement, SubscriptionFilter, TypedValue,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // No asset connections configured: values live in the model store only
    let persistence = Arc::new(MemoryPersistence::new());
    let manager = AssetConnectionManager::new(vec![])?;
    let service = Service::new(persistence, manager);

    println!("=== Twinbridge Basic Example ===\n");

    // Watch everything that happens on the bus
    service.bus().subscribe(SubscriptionFilter::any(), |event| {
        println!("  [event] {:?} on {}", event.kind(), event.reference());
    });

    service.start().await?;

    // Create a temperature property
    let reference = Reference::submodel_property("urn:example:boiler", "temperature");
    let response = service
        .execute(Request::CreateElement {
            element: SubmodelElement::property(
                "temperature",
                reference.clone(),
                TypedValue::from(20.5f64),
            ),
        })
        .await;
    println!("create: {}", response.status);

    // Write a new value
    let response = service
        .execute(Request::SetElementValue {
            reference: reference.clone(),
            value: TypedValue::from(23.0f64),
        })
        .await;
    println!("write: {}", response.status);

    // Read it back
    let response = service
        .execute(Request::GetElementValue {
            reference: reference.clone(),
        })
        .await;
    println!("read: {} payload={:?}", response.status, response.payload);

    // List the submodel
    let response = service
        .execute(Request::ListElements {
            parent: Some(Reference::key(
                twinbridge_core::KeyType::Submodel,
                "urn:example:boiler",
            )),
            modifier: QueryModifier::default(),
        })
        .await;
    println!("list: {} payload={:?}", response.status, response.payload);

    service.stop().await;
    Ok(())
}
