//! Deployment objects in their typed and dynamic forms, and the edits applied to them
//!
//! [`deployment`] and [`dynamic_deployment`] build the same object: two web server replicas
//! selected by an `app=<name>` label, each exposing port 80 as `http`.
//!
//! [`DeploymentChange`] describes an edit once, and applies it to either form.
use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};
use kube_core::{dynamic::ApiResource, DynamicObject};
use serde_json::{json, Value};

use crate::unstructured::{self, FieldError};

/// Label key used for the selector and pod template
pub const APP_LABEL: &str = "app";

const CONTAINER_NAME: &str = "web";
const REPLICAS: i32 = 2;
const PORT: i32 = 80;

const REPLICAS_PATH: [&str; 2] = ["spec", "replicas"];
const CONTAINERS_PATH: [&str; 4] = ["spec", "template", "spec", "containers"];

fn labels(name: &str) -> BTreeMap<String, String> {
    [(APP_LABEL.to_string(), name.to_string())].into()
}

/// A typed Deployment running `image`
pub fn deployment(name: &str, image: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(REPLICAS),
            selector: LabelSelector {
                match_labels: Some(labels(name)),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(name)),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(image.to_string()),
                        ports: Some(vec![ContainerPort {
                            name: Some("http".to_string()),
                            protocol: Some("TCP".to_string()),
                            container_port: PORT,
                            ..ContainerPort::default()
                        }]),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

/// Type information for `apps/v1` Deployments, for use with dynamic objects
pub fn api_resource() -> ApiResource {
    ApiResource::erase::<Deployment>(&())
}

/// A dynamic Deployment running `image`, assembled as a plain JSON graph
pub fn dynamic_deployment(name: &str, image: &str) -> DynamicObject {
    DynamicObject::new(name, &api_resource()).data(json!({
        "spec": {
            "replicas": REPLICAS,
            "selector": {
                "matchLabels": { APP_LABEL: name },
            },
            "template": {
                "metadata": {
                    "labels": { APP_LABEL: name },
                },
                "spec": {
                    "containers": [{
                        "name": CONTAINER_NAME,
                        "image": image,
                        "ports": [{
                            "containerPort": PORT,
                            "name": "http",
                            "protocol": "TCP",
                        }],
                    }],
                },
            },
        },
    }))
}

/// Replica count of a dynamic Deployment
pub fn dynamic_replicas(obj: &DynamicObject) -> Result<Option<i64>, FieldError> {
    unstructured::nested_i64(&obj.data, &REPLICAS_PATH)
}

/// The containers of a dynamic Deployment's pod template
pub fn dynamic_containers(obj: &DynamicObject) -> Option<&Value> {
    unstructured::nested_field(&obj.data, &CONTAINERS_PATH)
}

/// An edit to a Deployment, applicable to the typed and dynamic forms alike
///
/// Image and port changes target the first container (and its first port), which is
/// where [`deployment`] and [`dynamic_deployment`] put them.
///
/// ```
/// use crud_core::deployment::{deployment, DeploymentChange};
/// let mut d = deployment("web", "nginx:1.7.9");
/// DeploymentChange::default().replicas(1).image("nginx:1.7.3").apply_typed(&mut d).unwrap();
/// assert_eq!(d.spec.unwrap().replicas, Some(1));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeploymentChange {
    /// New replica count
    pub replicas: Option<i32>,
    /// New image of the first container
    pub image: Option<String>,
    /// New port number of the first container's first port
    pub container_port: Option<i32>,
}

impl DeploymentChange {
    /// Set the replica count
    #[must_use]
    pub fn replicas(mut self, replicas: i32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    /// Set the image of the first container
    #[must_use]
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the first port of the first container
    #[must_use]
    pub fn container_port(mut self, port: i32) -> Self {
        self.container_port = Some(port);
        self
    }

    fn touches_container(&self) -> bool {
        self.image.is_some() || self.container_port.is_some()
    }

    /// Apply to a typed Deployment
    ///
    /// Fails, leaving the object unchanged, if a container or port edit has no container
    /// or port to land on.
    pub fn apply_typed(&self, d: &mut Deployment) -> Result<(), FieldError> {
        let missing = |path: &str| FieldError::NotFound { path: path.to_string() };
        if self.touches_container() {
            let container = d
                .spec
                .as_ref()
                .and_then(|s| s.template.spec.as_ref())
                .and_then(|p| p.containers.first())
                .ok_or_else(|| missing("spec.template.spec.containers[0]"))?;
            if self.container_port.is_some() && container.ports.as_ref().map_or(true, Vec::is_empty) {
                return Err(missing("spec.template.spec.containers[0].ports[0]"));
            }
        }

        let spec = d.spec.get_or_insert_with(DeploymentSpec::default);
        if let Some(replicas) = self.replicas {
            spec.replicas = Some(replicas);
        }
        if let Some(container) = spec.template.spec.as_mut().and_then(|p| p.containers.first_mut()) {
            if let Some(image) = &self.image {
                container.image = Some(image.clone());
            }
            if let Some(port) = container.ports.as_mut().and_then(|ports| ports.first_mut()) {
                if let Some(number) = self.container_port {
                    port.container_port = number;
                }
            }
        }
        Ok(())
    }

    /// Apply to a dynamic Deployment by editing its JSON body in place
    ///
    /// Fails, leaving the object unchanged, if a field along the way has the wrong shape.
    pub fn apply_dynamic(&self, obj: &mut DynamicObject) -> Result<(), FieldError> {
        let mut data = obj.data.clone();
        if let Some(replicas) = self.replicas {
            unstructured::set_nested_field(&mut data, replicas.into(), &REPLICAS_PATH)?;
        }
        if self.touches_container() {
            let container = unstructured::nested_item_mut(&mut data, &CONTAINERS_PATH, 0)?;
            if let Some(image) = &self.image {
                unstructured::set_nested_field(container, image.as_str().into(), &["image"])?;
            }
            if let Some(number) = self.container_port {
                let port = unstructured::nested_item_mut(container, &["ports"], 0)?;
                unstructured::set_nested_field(port, number.into(), &["containerPort"])?;
            }
        }
        obj.data = data;
        Ok(())
    }
}
