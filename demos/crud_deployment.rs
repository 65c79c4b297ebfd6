//! Walk a Deployment through create, update, list and delete
//!
//! The update goes through a conflict-retrying read-modify-write, so it is safe to edit the
//! deployment from elsewhere (e.g. `kubectl scale`) while the program waits for Return.
use anyhow::Context;
use clap::Parser;
use crud_core::{
    deployment::{deployment, DeploymentChange},
    MemoryStore, ObjectKey, ResourceStore,
};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{api::DeleteParams, ResourceExt};
use tracing::*;

#[path = "util.rs"] mod util;
use util::Args;

const NAME: &str = "client-go-speaking";
const IMAGE: &str = "nginx:1.7.9";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    util::init_tracing();
    let args = Args::parse();
    if args.in_memory {
        run(&MemoryStore::new(), &args).await
    } else {
        let client = crud_client::connect(&args.client_options()).await?;
        run(&crud_client::KubeStore::<Deployment>::new(client), &args).await
    }
}

async fn run<S: ResourceStore<Object = Deployment>>(store: &S, args: &Args) -> anyhow::Result<()> {
    let ns = &args.namespace;
    let name = args.name.as_deref().unwrap_or(NAME);
    let key = ObjectKey::new(ns, name);

    info!("Creating deployment...");
    let image = args.image.as_deref().unwrap_or(IMAGE);
    let created = store
        .create(ns, deployment(name, image))
        .await
        .context("Create failed")?;
    info!("Created deployment {:?}", created.name_any());

    util::prompt(args.yes).await?;
    info!("Updating deployment...");
    let change = DeploymentChange::default().replicas(1).image("nginx:1.7.3");
    let updated = args
        .retrying(store)
        .try_update(&key, |d| change.apply_typed(d))
        .await
        .context("Update failed")?;
    info!(
        "Updated deployment {:?} (resourceVersion {})",
        updated.name_any(),
        updated.resource_version().unwrap_or_default()
    );

    util::prompt(args.yes).await?;
    info!("Listing deployments in {ns}");
    for d in store.list(ns).await.context("List failed")? {
        let replicas = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or_default();
        println!(" * {} ({replicas} replicas)", d.name_any());
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
