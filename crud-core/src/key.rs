use std::fmt::{self, Display};

use kube_core::Resource;

/// A namespaced reference to a stored object
///
/// Two keys are equal when both namespace and name match.
///
/// ```
/// use crud_core::ObjectKey;
/// assert_eq!(ObjectKey::new("default", "web").to_string(), "default/web");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// The namespace of the object
    pub namespace: String,
    /// The name of the object
    pub name: String,
}

impl ObjectKey {
    /// Build a key from a namespace and a name
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Build a key from the metadata of an object
    ///
    /// Returns `None` unless both `.metadata.name` and `.metadata.namespace` are set.
    pub fn from_obj<K: Resource>(obj: &K) -> Option<Self> {
        let meta = obj.meta();
        Some(Self {
            namespace: meta.namespace.clone()?,
            name: meta.name.clone()?,
        })
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
