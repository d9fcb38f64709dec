use policy_opensearch::store::memory::MemoryStore;
use policy_opensearch::{LoadOptions, PolicyAdapter};
use std::sync::Arc;

pub const INDEX: &str = "casbin_policies";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub async fn memory_adapter() -> PolicyAdapter {
    PolicyAdapter::connect(Arc::new(MemoryStore::new()), INDEX, LoadOptions::default())
        .await
        .expect("adapter")
}

pub fn rule(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|field| field.to_string()).collect()
}
