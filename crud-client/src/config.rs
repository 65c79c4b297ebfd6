use std::path::PathBuf;

use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};

use crate::Error;

/// Where to find cluster credentials
///
/// With nothing set, the config is inferred: in-cluster environment first, then the
/// default kubeconfig (`$KUBECONFIG` or `~/.kube/config`).
#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    /// Read this kubeconfig file instead of the default one
    pub kubeconfig: Option<PathBuf>,
    /// Use this context instead of the kubeconfig's current context
    pub context: Option<String>,
}

impl ClientOptions {
    fn kubeconfig_options(&self) -> KubeConfigOptions {
        KubeConfigOptions {
            context: self.context.clone(),
            ..KubeConfigOptions::default()
        }
    }
}

/// Load a config as described by `options` and build a client from it
pub async fn connect(options: &ClientOptions) -> Result<Client, Error> {
    let config = match (&options.kubeconfig, &options.context) {
        (Some(path), _) => {
            tracing::debug!(path = %path.display(), "reading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path).map_err(Error::Kubeconfig)?;
            Config::from_custom_kubeconfig(kubeconfig, &options.kubeconfig_options())
                .await
                .map_err(Error::Kubeconfig)?
        }
        (None, Some(_)) => Config::from_kubeconfig(&options.kubeconfig_options())
            .await
            .map_err(Error::Kubeconfig)?,
        (None, None) => Config::infer().await.map_err(Error::InferConfig)?,
    };
    tracing::debug!(
        cluster_url = %config.cluster_url,
        namespace = %config.default_namespace,
        "loaded config"
    );
    Client::try_from(config).map_err(Error::Client)
}
