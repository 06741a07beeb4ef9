#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use store::{ContentStore, InMemoryTransport};

pub const CATALOG: &str = include_str!("../fixtures/catalog.json");

pub const HOMEPAGE: &str = "homepage";
pub const FEATURED_VIDEO: &str = "0db5528d4c3c7ae4d5f24cce1c9fae51";
pub const FEATURED_COLLECTION: &str = "51c12f4b70ff4a70925a1be26b8442af";

pub fn catalog_transport() -> InMemoryTransport {
    InMemoryTransport::from_json(CATALOG).expect("catalog fixture")
}

pub async fn ready_store() -> (Arc<InMemoryTransport>, Arc<ContentStore>) {
    store_over(catalog_transport()).await
}

pub async fn slow_store(latency: Duration) -> (Arc<InMemoryTransport>, Arc<ContentStore>) {
    store_over(catalog_transport().with_latency(latency)).await
}

pub async fn store_over(transport: InMemoryTransport) -> (Arc<InMemoryTransport>, Arc<ContentStore>) {
    let transport = Arc::new(transport);
    let store = Arc::new(ContentStore::new(transport.clone()));
    store.initialize().await.expect("initialize");
    (transport, store)
}
