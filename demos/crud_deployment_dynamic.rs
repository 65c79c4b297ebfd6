//! The Deployment lifecycle again, through the untyped API
//!
//! Nothing here knows the Deployment schema: the object is a JSON graph and the update
//! walks field paths into it.
use anyhow::Context;
use clap::Parser;
use crud_core::{
    deployment::{api_resource, dynamic_containers, dynamic_deployment, dynamic_replicas, DeploymentChange},
    MemoryStore, ObjectKey, ResourceStore,
};
use kube::{
    api::{DeleteParams, DynamicObject},
    ResourceExt,
};
use tracing::*;

#[path = "util.rs"] mod util;
use util::Args;

const NAME: &str = "dynamic-client-speaking";
const IMAGE: &str = "nginx:1.12";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    util::init_tracing();
    let args = Args::parse();
    if args.in_memory {
        run(&MemoryStore::new(), &args).await
    } else {
        let client = crud_client::connect(&args.client_options()).await?;
        run(&crud_client::KubeStore::dynamic(client, api_resource()), &args).await
    }
}

async fn run<S: ResourceStore<Object = DynamicObject>>(store: &S, args: &Args) -> anyhow::Result<()> {
    let ns = &args.namespace;
    let name = args.name.as_deref().unwrap_or(NAME);
    let key = ObjectKey::new(ns, name);

    info!("Creating deployment...");
    let image = args.image.as_deref().unwrap_or(IMAGE);
    let created = store
        .create(ns, dynamic_deployment(name, image))
        .await
        .context("Create failed")?;
    info!("Created deployment {:?}", created.name_any());

    util::prompt(args.yes).await?;
    info!("Updating deployment...");
    let change = DeploymentChange::default()
        .replicas(1)
        .image("nginx:1.13")
        .container_port(88);
    args.retrying(store)
        .try_update(&key, |obj| {
            info!("Retrieved deployment: {}", serde_json::to_string(&*obj)?);
            let ports = dynamic_containers(obj).and_then(|c| c.get(0)).and_then(|c| c.get("ports"));
            info!("ports: {}", ports.unwrap_or(&serde_json::Value::Null));
            change.apply_dynamic(obj)?;
            info!(
                "containers after update: {}",
                dynamic_containers(obj).unwrap_or(&serde_json::Value::Null)
            );
            Ok::<_, anyhow::Error>(())
        })
        .await
        .context("Update failed")?;
    info!("Updated deployment {name:?}");

    util::prompt(args.yes).await?;
    info!("Listing deployments in {ns}");
    for obj in store.list(ns).await.context("List failed")? {
        let replicas = dynamic_replicas(&obj)?.unwrap_or_default();
        println!(" * {} ({replicas} replicas)", obj.name_any());
    }

    util::prompt(args.yes).await?;
    info!("Deleting deployment...");
    store
        .delete(&key, &DeleteParams::foreground())
        .await
        .context("Delete failed")?;
    info!("Deleted deployment {name:?}");
    Ok(())
}
