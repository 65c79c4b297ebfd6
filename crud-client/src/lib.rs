//! A [`ResourceStore`](crud_core::ResourceStore) that talks to a Kubernetes API server
//!
//! [`KubeStore`] maps the store contract onto `kube::Api`: fetches are GETs, updates are
//! PUTs carrying the fetched `resourceVersion`, and the API server's `409 Conflict`
//! becomes [`StoreError::Conflict`](crud_core::StoreError::Conflict), which is what
//! [`RetryOnConflict`](crud_core::RetryOnConflict) retries on.
//!
//! ```rust,no_run
//! use crud_client::{connect, ClientOptions, KubeStore};
//! use crud_core::{ObjectKey, RetryOnConflict, RetryPolicy};
//! use k8s_openapi::api::apps::v1::Deployment;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = connect(&ClientOptions::default()).await?;
//!     let store = KubeStore::<Deployment>::new(client);
//!
//!     let key = ObjectKey::new("default", "web");
//!     let updated = RetryOnConflict::new(&store, RetryPolicy::default())
//!         .update(&key, |d| {
//!             d.spec.get_or_insert_with(Default::default).replicas = Some(1);
//!         })
//!         .await?;
//!     println!("now at {:?}", updated.metadata.resource_version);
//!     Ok(())
//! }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
pub use config::{connect, ClientOptions};

mod error;
pub use error::Error;

mod store;
pub use store::KubeStore;

#[cfg(test)] mod mock_tests;
