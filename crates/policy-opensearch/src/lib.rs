//! OpenSearch-backed persistence for access-control policies.
//!
//! Each policy rule is stored as one document of seven keyword fields
//! (`ptype`, `v0`..`v5`) keyed by `v0:v1:v2`. [`PolicyAdapter`] writes and
//! removes rules directly in the store and bulk-loads the whole index into a
//! [`PolicyModel`] through a scroll cursor.
//!
//! ```no_run
//! use std::sync::Arc;
//! use policy_opensearch::{LoadOptions, PolicyAdapter, PolicyModel};
//! use policy_opensearch::store::opensearch::{OpenSearchConfig, OpenSearchStore};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = OpenSearchStore::new(OpenSearchConfig::new(vec![
//!     "http://localhost:9200".to_string(),
//! ]))?;
//! let adapter = PolicyAdapter::connect(Arc::new(store), "casbin_policies", LoadOptions::default()).await?;
//! adapter
//!     .add_policy("p", "p", &["alice".into(), "reports".into(), "viewer".into()])
//!     .await?;
//! let mut model = PolicyModel::new();
//! adapter.load_policy(&mut model).await?;
//! # Ok(())
//! # }
//! ```
pub mod adapter;
pub mod errors;
pub mod loader;
pub mod model;
pub mod record;
pub mod store;

pub use adapter::PolicyAdapter;
pub use errors::{AdapterError, AdapterResult, ParseError, StoreError, StoreResult};
pub use loader::{LoadOptions, LoadReport, ScrollLoader};
pub use model::{GRANT_SECTION, GROUPING_SECTION, PolicyModel};
pub use record::{DecodeMode, PolicyRecord};
pub use store::DocumentStore;
