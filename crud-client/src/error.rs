//! Error handling in [`crud_client`][crate]
use kube::config::{InferConfigError, KubeconfigError};
use thiserror::Error;

/// Failures to set up a [`kube::Client`]
#[derive(Error, Debug)]
pub enum Error {
    /// Neither an in-cluster environment nor a local kubeconfig could be used
    #[error("failed to infer config: {0}")]
    InferConfig(#[source] InferConfigError),

    /// The requested kubeconfig could not be read or has no usable context
    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[source] KubeconfigError),

    /// The client could not be built from a loaded config
    #[error("failed to create client: {0}")]
    Client(#[source] kube::Error),
}
