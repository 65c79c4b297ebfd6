use std::fmt::Debug;

use async_trait::async_trait;
use crud_core::{ObjectKey, ResourceStore, StoreError};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Api, ApiResource, DeleteParams, DynamicObject, ListParams, PostParams},
    Client, Resource,
};
use serde::{de::DeserializeOwned, Serialize};

/// A [`ResourceStore`] for namespaced objects of one kind, backed by the Kubernetes API
///
/// Updates are full replacements (`PUT`) carrying the object's `resourceVersion`, so the
/// API server refuses any write based on an outdated read with `409 Conflict`.
pub struct KubeStore<K: Resource> {
    client: Client,
    dyntype: K::DynamicType,
    scoped: fn(Client, &str, &K::DynamicType) -> Api<K>,
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    /// Store objects of a statically known type, such as `k8s_openapi`'s `Deployment`
    pub fn new(client: Client) -> Self {
        Self {
            client,
            dyntype: K::DynamicType::default(),
            scoped: |client, ns, _| Api::namespaced(client, ns),
        }
    }
}

impl KubeStore<DynamicObject> {
    /// Store untyped objects of the kind described by `resource`
    ///
    /// ```rust,no_run
    /// # use crud_client::KubeStore;
    /// # use kube::{api::ApiResource, Client};
    /// # use k8s_openapi::api::apps::v1::Deployment;
    /// # fn wrapper(client: Client) {
    /// let store = KubeStore::dynamic(client, ApiResource::erase::<Deployment>(&()));
    /// # }
    /// ```
    pub fn dynamic(client: Client, resource: ApiResource) -> Self {
        Self {
            client,
            dyntype: resource,
            scoped: |client, ns, resource| Api::namespaced_with(client, ns, resource),
        }
    }
}

impl<K: Resource> KubeStore<K> {
    fn api(&self, namespace: &str) -> Api<K> {
        (self.scoped)(self.client.clone(), namespace, &self.dyntype)
    }
}

impl<K> Clone for KubeStore<K>
where
    K: Resource,
    K::DynamicType: Clone,
{
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            dyntype: self.dyntype.clone(),
            scoped: self.scoped,
        }
    }
}

#[async_trait]
impl<K> ResourceStore for KubeStore<K>
where
    K: Resource + Clone + Debug + DeserializeOwned + Serialize + Send + Sync + 'static,
{
    type Object = K;

    async fn fetch(&self, key: &ObjectKey) -> Result<K, StoreError> {
        self.api(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|err| map_error(err, key))
    }

    async fn update(&self, object: K) -> Result<K, StoreError> {
        let key = ObjectKey::from_obj(&object).ok_or_else(|| StoreError::Invalid {
            message: "object has no namespace or name".into(),
        })?;
        // an unversioned PUT would overwrite unconditionally
        if object.meta().resource_version.is_none() {
            return Err(StoreError::Invalid {
                message: format!("{key} has no resourceVersion"),
            });
        }
        tracing::debug!(%key, version = ?object.meta().resource_version, "replacing");
        self.api(&key.namespace)
            .replace(&key.name, &PostParams::default(), &object)
            .await
            .map_err(|err| map_error(err, &key))
    }

    async fn create(&self, namespace: &str, object: K) -> Result<K, StoreError> {
        let key = ObjectKey::new(namespace, object.meta().name.as_deref().unwrap_or_default());
        self.api(namespace)
            .create(&PostParams::default(), &object)
            .await
            .map_err(|err| map_error(err, &key))
    }

    async fn delete(&self, key: &ObjectKey, params: &DeleteParams) -> Result<(), StoreError> {
        // either the object (deletion pending) or a Status (deleted), both are success
        self.api(&key.namespace)
            .delete(&key.name, params)
            .await
            .map(|_| ())
            .map_err(|err| map_error(err, key))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        self.api(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|err| {
                tracing::debug!(namespace, "list failed: {err}");
                StoreError::Backend(Box::new(err))
            })
    }
}

/// Sort an API failure on a single object into the store's error taxonomy
///
/// The API server reports both failed preconditions and name collisions as 409, told apart
/// by the status reason.
fn map_error(err: kube::Error, key: &ObjectKey) -> StoreError {
    let key = key.clone();
    match err {
        kube::Error::Api(response) if response.code == 409 && response.reason == "AlreadyExists" => {
            StoreError::AlreadyExists { key }
        }
        kube::Error::Api(response) if response.code == 409 => StoreError::Conflict {
            key,
            message: response.message,
        },
        kube::Error::Api(response) if response.code == 404 => StoreError::NotFound { key },
        kube::Error::Api(response) if matches!(response.code, 400 | 422) => StoreError::Invalid {
            message: response.message,
        },
        err => StoreError::Backend(Box::new(err)),
    }
}
