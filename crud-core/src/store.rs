use async_trait::async_trait;
use kube_core::{params::DeleteParams, Resource};

use crate::{ObjectKey, StoreError};

/// A remote (or local) store of versioned objects, keyed by namespace and name
///
/// Every stored object carries an opaque version token in `.metadata.resourceVersion`.
/// Implementations must uphold optimistic concurrency:
///
/// - [`update`](Self::update) only succeeds when the submitted token equals the stored one,
///   and reports [`StoreError::Conflict`] otherwise
/// - every successful write hands out a new token
/// - a failed write leaves the stored object untouched
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// The object type held by this store
    type Object: Resource + Clone + Send + Sync + 'static;

    /// Get the current state of an object, including its version token
    async fn fetch(&self, key: &ObjectKey) -> Result<Self::Object, StoreError>;

    /// Replace an object, guarded by the version token it carries
    ///
    /// The target is taken from `.metadata.namespace` and `.metadata.name`.
    async fn update(&self, object: Self::Object) -> Result<Self::Object, StoreError>;

    /// Store a new object in `namespace`
    async fn create(&self, namespace: &str, object: Self::Object) -> Result<Self::Object, StoreError>;

    /// Remove an object
    async fn delete(&self, key: &ObjectKey, params: &DeleteParams) -> Result<(), StoreError>;

    /// All objects in `namespace`
    async fn list(&self, namespace: &str) -> Result<Vec<Self::Object>, StoreError>;
}
