use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use kube_core::{params::DeleteParams, Resource};
use parking_lot::Mutex;

use crate::{ObjectKey, ResourceStore, StoreError};

struct Stored<K> {
    object: K,
    version: u64,
}

fn token(version: u64) -> String {
    format!("v{version}")
}

/// An in-process [`ResourceStore`] with optimistic concurrency
///
/// Version tokens are handed out per object as `v1`, `v2`, ... starting at creation.
/// Updates must carry the current token: a stale token is a [`StoreError::Conflict`],
/// a missing one is [`StoreError::Invalid`].
///
/// Cloning is cheap and clones share the same objects, so one store can be handed to
/// several concurrent writers.
pub struct MemoryStore<K> {
    objects: Arc<Mutex<BTreeMap<ObjectKey, Stored<K>>>>,
}

impl<K> Clone for MemoryStore<K> {
    fn clone(&self) -> Self {
        Self {
            objects: self.objects.clone(),
        }
    }
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Arc::default(),
        }
    }
}

impl<K> MemoryStore<K>
where
    K: Resource + Clone,
{
    /// An empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects across all namespaces
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Whether the store holds no objects
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    fn get(&self, key: &ObjectKey) -> Result<K, StoreError> {
        self.objects
            .lock()
            .get(key)
            .map(|stored| stored.object.clone())
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    fn replace(&self, mut object: K) -> Result<K, StoreError> {
        let key = ObjectKey::from_obj(&object).ok_or_else(|| StoreError::Invalid {
            message: "update requires .metadata.name and .metadata.namespace".into(),
        })?;
        let submitted = object.meta().resource_version.clone().ok_or_else(|| StoreError::Invalid {
            message: format!("update of {key} requires .metadata.resourceVersion"),
        })?;

        let mut objects = self.objects.lock();
        let stored = objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        let current = token(stored.version);
        if submitted != current {
            return Err(StoreError::Conflict {
                message: format!("submitted version {submitted}, stored version is {current}"),
                key,
            });
        }

        stored.version += 1;
        object.meta_mut().resource_version = Some(token(stored.version));
        stored.object = object.clone();
        Ok(object)
    }

    fn insert(&self, namespace: &str, mut object: K) -> Result<K, StoreError> {
        let name = object.meta().name.clone().ok_or_else(|| StoreError::Invalid {
            message: "create requires .metadata.name".into(),
        })?;
        let key = ObjectKey::new(namespace, &name);

        let mut objects = self.objects.lock();
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists { key });
        }
        let meta = object.meta_mut();
        meta.namespace = Some(namespace.to_string());
        meta.resource_version = Some(token(1));
        objects.insert(key, Stored {
            object: object.clone(),
            version: 1,
        });
        Ok(object)
    }

    fn remove(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.objects
            .lock()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    fn in_namespace(&self, namespace: &str) -> Vec<K> {
        self.objects
            .lock()
            .iter()
            .filter(|(key, _)| key.namespace == namespace)
            .map(|(_, stored)| stored.object.clone())
            .collect()
    }
}

#[async_trait]
impl<K> ResourceStore for MemoryStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    type Object = K;

    async fn fetch(&self, key: &ObjectKey) -> Result<K, StoreError> {
        self.get(key)
    }

    async fn update(&self, object: K) -> Result<K, StoreError> {
        self.replace(object)
    }

    async fn create(&self, namespace: &str, object: K) -> Result<K, StoreError> {
        self.insert(namespace, object)
    }

    // Dependents are not tracked, so the propagation policy has nothing to act on.
    async fn delete(&self, key: &ObjectKey, _params: &DeleteParams) -> Result<(), StoreError> {
        self.remove(key)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        Ok(self.in_namespace(namespace))
    }
}
