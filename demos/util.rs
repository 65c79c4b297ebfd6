//! Plumbing shared by the lifecycle programs
use std::{path::PathBuf, time::Duration};

use crud_client::ClientOptions;
use crud_core::{ResourceStore, RetryOnConflict, RetryPolicy};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(clap::Parser, Debug)]
pub struct Args {
    /// Kubeconfig to read instead of inferring one from the environment
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current one
    #[arg(long)]
    pub context: Option<String>,
    /// Namespace to manage the deployment in
    #[arg(long, short, default_value = "default")]
    pub namespace: String,
    /// Name of the deployment
    #[arg(long)]
    pub name: Option<String>,
    /// Image to create the deployment with
    #[arg(long)]
    pub image: Option<String>,
    /// Continue without waiting for Return between steps
    #[arg(long, short)]
    pub yes: bool,
    /// Give up on the update after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
    /// Number of writes to try before giving up on conflicts
    #[arg(long, default_value_t = 5)]
    pub max_attempts: u32,
    /// Run against an in-process store instead of a cluster
    #[arg(long)]
    pub in_memory: bool,
}

impl Args {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
        }
    }

    /// The conflict-retrying updater configured by the flags
    pub fn retrying<'a, S: ResourceStore>(&self, store: &'a S) -> RetryOnConflict<'a, S> {
        let retrying = RetryOnConflict::new(store, RetryPolicy::new(self.max_attempts));
        match self.timeout {
            Some(secs) => retrying.timeout(Duration::from_secs(secs)),
            None => retrying,
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,kube=warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Wait for the user to press Return, unless `skip` is set
pub async fn prompt(skip: bool) -> anyhow::Result<()> {
    if skip {
        return Ok(());
    }
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"-> Press Return key to continue.").await?;
    stdout.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    println!();
    Ok(())
}
