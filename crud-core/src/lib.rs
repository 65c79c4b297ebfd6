//! Client-less building blocks for managing versioned Kubernetes resources
//!
//! This crate contains the store contract ([`ResourceStore`]), the error taxonomy shared by
//! every store, and the conflict-retrying read-modify-write loop ([`RetryOnConflict`]).
//!
//! Nothing in here talks to a cluster. The `crud-client` crate provides a [`ResourceStore`]
//! backed by `kube::Api`, and [`MemoryStore`] provides an in-process one with the same
//! optimistic concurrency semantics.
//!
//! ```
//! use crud_core::{deployment, MemoryStore, ObjectKey, ResourceStore, RetryOnConflict, RetryPolicy};
//! # async fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! store.create("default", deployment::deployment("web", "nginx:1.7.9")).await?;
//!
//! let key = ObjectKey::new("default", "web");
//! let updated = RetryOnConflict::new(&store, RetryPolicy::default())
//!     .update(&key, |d| {
//!         d.spec.get_or_insert_with(Default::default).replicas = Some(1);
//!     })
//!     .await?;
//! assert_eq!(updated.metadata.resource_version.as_deref(), Some("v2"));
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod deployment;

mod error;
pub use error::{BoxError, StoreError, UpdateError};

mod key;
pub use key::ObjectKey;

mod memory;
pub use memory::MemoryStore;

mod policy;
pub use policy::RetryPolicy;

pub mod retry;
pub use retry::RetryOnConflict;

mod store;
pub use store::ResourceStore;

pub mod unstructured;
pub use unstructured::FieldError;
