//! ocne-capi - provision and upgrade OCNE clusters through Cluster API

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ocne_capi::capi::credentials::load_cloud_credentials;
use ocne_capi::capi::{load_version_defaults, ClusterLifecycle, KubeResourceClient, Removal};
use ocne_capi::catalog;
use ocne_capi::config::DriverConfig;
use ocne_capi::template::TemplateEngine;
use ocne_capi::variables::Variables;

/// ocne-capi - Cluster API reconciliation for OCNE clusters on OCI
#[derive(Parser, Debug)]
#[command(name = "ocne-capi", version, about, long_about = None)]
struct Cli {
    /// Path to the driver configuration file
    #[arg(short = 'f', long = "config", env = "OCNE_CAPI_CONFIG")]
    config_file: PathBuf,

    /// Admin cluster kubeconfig, overriding the config file
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every manifest applied on create without contacting a cluster
    Render,

    /// Create the cluster or re-apply all of its objects
    Apply {
        /// Wait for the cluster, then apply overlays and Verrazzano
        #[arg(long)]
        wait: bool,
    },

    /// Roll the control plane, then workers, then everything else
    Update,

    /// Check readiness once
    Status,

    /// Block until the cluster and its machines are ready
    Wait,

    /// Delete node pools that are no longer declared
    Prune,

    /// Remove Verrazzano and delete the cluster
    Delete,

    /// Print the workload cluster kubeconfig
    Kubeconfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = DriverConfig::load(&cli.config_file)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load config {:?}: {}", cli.config_file, e))?;
    let mut vars = config.resolved_cluster().await?;

    if let Commands::Render = cli.command {
        return run_render(&vars);
    }

    let kubeconfig = cli.kubeconfig.or_else(|| config.kubeconfig.clone());
    let admin = KubeResourceClient::new(admin_client(kubeconfig).await?);
    if let Some(defaults) = load_version_defaults(&admin).await? {
        if vars.apply_version_defaults(&defaults) {
            vars.set_hashes()?;
        }
    }
    let lifecycle = ClusterLifecycle::new(&admin).with_readiness(config.readiness());

    match cli.command {
        Commands::Render => Ok(()),
        Commands::Apply { wait } => {
            load_cloud_credentials(&admin, &mut vars).await?;
            let result = lifecycle.create_or_update_all(&vars).await?;
            println!("Applied {} objects for cluster {}", result.len(), vars.name);
            if wait {
                lifecycle.wait_for_cluster_ready(&vars).await?;
                finish_workload(&lifecycle, &mut vars).await?;
            }
            Ok(())
        }
        Commands::Update => {
            load_cloud_credentials(&admin, &mut vars).await?;
            let result = lifecycle.update_cluster(&vars).await?;
            println!("Updated {} objects for cluster {}", result.len(), vars.name);
            finish_workload(&lifecycle, &mut vars).await
        }
        Commands::Status => {
            match lifecycle.check_cluster_ready(&vars).await {
                Ok(()) => println!("Cluster {} is ready", vars.name),
                Err(e) if e.is_not_ready() => println!("{e}"),
                Err(e) => return Err(e.into()),
            }
            Ok(())
        }
        Commands::Wait => {
            lifecycle.wait_for_cluster_ready(&vars).await?;
            println!("Cluster {} is ready", vars.name);
            Ok(())
        }
        Commands::Prune => {
            let removed = lifecycle.delete_hanging_resources(&vars).await?;
            if removed.is_empty() {
                println!("No orphaned node pools");
            }
            for name in removed {
                println!("Deleted node pool {name}");
            }
            Ok(())
        }
        Commands::Delete => {
            if vars.install_verrazzano {
                match workload_client(&lifecycle, &vars).await {
                    Ok(workload) => {
                        if lifecycle.delete_verrazzano(&workload, &vars).await? == Removal::InProgress {
                            println!("Verrazzano removal in progress, re-run delete to continue");
                            return Ok(());
                        }
                    }
                    Err(e) => tracing::warn!(cluster = %vars.name, error = %e, "Workload cluster unreachable, skipping Verrazzano removal"),
                }
            }
            if lifecycle.delete_cluster(&vars).await? {
                println!("Deleting cluster {}", vars.name);
            } else {
                println!("Cluster {} already deleted", vars.name);
            }
            Ok(())
        }
        Commands::Kubeconfig => {
            let kubeconfig = lifecycle.kubeconfig(&vars).await?;
            let yaml = serde_yaml::to_string(&kubeconfig)
                .map_err(|e| anyhow::anyhow!("Failed to serialize kubeconfig: {}", e))?;
            print!("{yaml}");
            Ok(())
        }
    }
}

/// Print rendered manifests as one multi-document YAML stream
fn run_render(vars: &Variables) -> anyhow::Result<()> {
    let rendered = catalog::render(&TemplateEngine::new(), &catalog::create_objects(vars), vars)?;
    for (_, docs) in rendered.iter() {
        for doc in docs {
            let yaml = serde_yaml::to_string(doc.as_value())
                .map_err(|e| anyhow::anyhow!("Failed to serialize {}: {}", doc.name(), e))?;
            println!("---\n{}", yaml.trim_end());
        }
    }
    Ok(())
}

/// Post-provisioning steps that talk to the workload cluster
async fn finish_workload(lifecycle: &ClusterLifecycle<'_>, vars: &mut Variables) -> anyhow::Result<()> {
    if lifecycle.sync_quick_create_network(vars).await? {
        println!("Recorded VCN {} for cluster {}", vars.vcn_id, vars.name);
    }
    let workload = workload_client(lifecycle, vars).await?;
    let overlays = lifecycle.apply_yaml_overlays(&workload, vars).await?;
    if !overlays.is_empty() {
        println!("Applied {} overlay objects", overlays.len());
    }
    lifecycle.install_verrazzano(&workload, vars).await?;
    if vars.uninstall_verrazzano {
        lifecycle.delete_verrazzano(&workload, vars).await?;
    }
    Ok(())
}

async fn admin_client(kubeconfig: Option<PathBuf>) -> anyhow::Result<Client> {
    match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read kubeconfig {:?}: {}", path, e))?;
            client_from(kubeconfig).await
        }
        None => Ok(Client::try_default().await?),
    }
}

async fn workload_client(
    lifecycle: &ClusterLifecycle<'_>,
    vars: &Variables,
) -> anyhow::Result<KubeResourceClient> {
    let kubeconfig = lifecycle.kubeconfig(vars).await?;
    Ok(KubeResourceClient::new(client_from(kubeconfig).await?))
}

async fn client_from(kubeconfig: Kubeconfig) -> anyhow::Result<Client> {
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| anyhow::anyhow!("Invalid kubeconfig: {}", e))?;
    Ok(Client::try_from(config)?)
}
