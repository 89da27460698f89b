//! Readiness polling for CAPI clusters and add-on deployments
//!
//! A cluster is ready when its control plane and infrastructure report ready,
//! its phase is `Provisioned`, and at least one machine labelled with the
//! cluster name exists with every such machine `Running`. The polling wait
//! and the single-shot check evaluate exactly the same predicates.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::client::{ApiError, ResourceClient};
use crate::object::{gvr, Document};
use crate::Error;

/// Cluster phase once infrastructure and control plane are provisioned
pub const PROVISIONED_PHASE: &str = "Provisioned";
/// Machine phase once the node has joined
pub const RUNNING_PHASE: &str = "Running";
/// Label CAPI puts on every machine of a cluster
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// First predicate that failed during a readiness evaluation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotReadyReason {
    /// `status.controlPlaneReady` missing or false
    ControlPlaneNotReady,
    /// `status.infrastructureReady` missing or false
    InfrastructureNotReady,
    /// `status.phase` missing or not `Provisioned`
    PhaseNotProvisioned(Option<String>),
    /// No machines carry the cluster label yet
    NoMachines,
    /// A machine has not reached `Running`
    MachineNotRunning {
        /// Machine name
        name: String,
        /// Current phase, if reported
        phase: Option<String>,
    },
    /// Deployment replica counts have not converged
    ReplicasPending {
        /// Desired replicas
        desired: i64,
        /// Ready replicas
        ready: i64,
        /// Available replicas
        available: i64,
    },
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlPlaneNotReady => f.write_str("control plane not ready"),
            Self::InfrastructureNotReady => f.write_str("infrastructure not ready"),
            Self::PhaseNotProvisioned(Some(phase)) => write!(f, "phase is {phase}"),
            Self::PhaseNotProvisioned(None) => f.write_str("phase not reported"),
            Self::NoMachines => f.write_str("no machines found"),
            Self::MachineNotRunning {
                name,
                phase: Some(phase),
            } => write!(f, "machine {name} is {phase}"),
            Self::MachineNotRunning { name, phase: None } => {
                write!(f, "machine {name} has no phase")
            }
            Self::ReplicasPending {
                desired,
                ready,
                available,
            } => write!(
                f,
                "{ready} ready and {available} available of {desired} replicas"
            ),
        }
    }
}

/// Poll interval and overall deadline for a wait
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// Sleep between ticks
    pub poll_interval: Duration,
    /// Overall deadline
    pub timeout: Duration,
}

impl ReadinessConfig {
    /// Cluster provisioning: 30 seconds between ticks, one hour overall
    pub const CLUSTER: Self = Self {
        poll_interval: Duration::from_secs(30),
        timeout: Duration::from_secs(60 * 60),
    };

    /// Add-on operator rollout: 10 seconds between ticks, five minutes overall
    pub const DEPLOYMENT: Self = Self {
        poll_interval: Duration::from_secs(10),
        timeout: Duration::from_secs(5 * 60),
    };
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self::CLUSTER
    }
}

/// Evaluate the cluster-level predicates
pub fn evaluate_cluster(cluster: &Document) -> Result<(), NotReadyReason> {
    if !cluster
        .bool_field(&["status", "controlPlaneReady"])
        .unwrap_or(false)
    {
        return Err(NotReadyReason::ControlPlaneNotReady);
    }
    if !cluster
        .bool_field(&["status", "infrastructureReady"])
        .unwrap_or(false)
    {
        return Err(NotReadyReason::InfrastructureNotReady);
    }
    match cluster.str_field(&["status", "phase"]) {
        Ok(PROVISIONED_PHASE) => Ok(()),
        Ok(other) => Err(NotReadyReason::PhaseNotProvisioned(Some(other.to_string()))),
        Err(_) => Err(NotReadyReason::PhaseNotProvisioned(None)),
    }
}

/// Evaluate the machine predicate; an empty set is not ready
pub fn evaluate_machines(machines: &[Document]) -> Result<(), NotReadyReason> {
    if machines.is_empty() {
        return Err(NotReadyReason::NoMachines);
    }
    for machine in machines {
        match machine.str_field(&["status", "phase"]) {
            Ok(RUNNING_PHASE) => {}
            phase => {
                return Err(NotReadyReason::MachineNotRunning {
                    name: machine.name().to_string(),
                    phase: phase.ok().map(str::to_string),
                })
            }
        }
    }
    Ok(())
}

/// Evaluate deployment rollout: ready == available == desired replicas
pub fn evaluate_deployment(deployment: &Document) -> Result<(), NotReadyReason> {
    let desired = deployment.i64_field(&["spec", "replicas"]).unwrap_or(1);
    let ready = deployment
        .i64_field(&["status", "readyReplicas"])
        .unwrap_or(0);
    let available = deployment
        .i64_field(&["status", "availableReplicas"])
        .unwrap_or(0);
    if ready == desired && available == desired {
        Ok(())
    } else {
        Err(NotReadyReason::ReplicasPending {
            desired,
            ready,
            available,
        })
    }
}

/// Readiness checks against one API endpoint
pub struct Readiness<'a> {
    client: &'a dyn ResourceClient,
    config: ReadinessConfig,
}

impl<'a> Readiness<'a> {
    /// Readiness checks with the cluster defaults
    pub fn new(client: &'a dyn ResourceClient) -> Self {
        Self {
            client,
            config: ReadinessConfig::default(),
        }
    }

    /// Override interval and deadline
    pub fn with_config(mut self, config: ReadinessConfig) -> Self {
        self.config = config;
        self
    }

    /// Evaluate all four cluster predicates once
    ///
    /// API failures are errors; unmet predicates are the inner `Err`.
    pub async fn probe_cluster(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Result<(), NotReadyReason>, Error> {
        let cluster = self
            .client
            .get(&gvr::CLUSTER, namespace, name)
            .await
            .map_err(|source| Error::Fetch {
                resource: gvr::CLUSTER,
                name: name.to_string(),
                source,
            })?;
        if let Err(reason) = evaluate_cluster(&cluster) {
            return Ok(Err(reason));
        }

        let selector = format!("{CLUSTER_NAME_LABEL}={name}");
        let machines = self
            .client
            .list(&gvr::MACHINE, "", &selector)
            .await
            .map_err(|source| Error::List {
                resource: gvr::MACHINE,
                source,
            })?;
        Ok(evaluate_machines(&machines))
    }

    /// Single-shot readiness check
    ///
    /// Returns [`Error::NotReady`] while the cluster is still converging so
    /// callers can schedule their own retry.
    pub async fn check_cluster_ready(&self, name: &str, namespace: &str) -> Result<(), Error> {
        self.probe_cluster(name, namespace)
            .await?
            .map_err(|reason| Error::NotReady {
                cluster: name.to_string(),
                reason,
            })
    }

    /// Block until the cluster is ready or the deadline passes
    pub async fn wait_for_cluster_ready(&self, name: &str, namespace: &str) -> Result<(), Error> {
        info!(cluster = %name, timeout = ?self.config.timeout, "Waiting for cluster to be ready");
        poll(self.config, "cluster", name, move || async move {
            match self.probe_cluster(name, namespace).await? {
                Ok(()) => Ok(true),
                Err(reason) => {
                    debug!(cluster = %name, %reason, "Cluster not ready");
                    Ok(false)
                }
            }
        })
        .await?;
        info!(cluster = %name, "Cluster is ready");
        Ok(())
    }

    /// Block until a deployment has fully rolled out
    ///
    /// A deployment that does not exist yet counts as not ready.
    pub async fn wait_for_deployment(&self, name: &str, namespace: &str) -> Result<(), Error> {
        info!(deployment = %name, namespace, "Waiting for deployment to be ready");
        poll(self.config, "deployment", name, move || async move {
            let deployment = match self.client.get(&gvr::DEPLOYMENT, namespace, name).await {
                Ok(deployment) => deployment,
                Err(ApiError::NotFound) => {
                    debug!(deployment = %name, "Deployment not found yet");
                    return Ok(false);
                }
                Err(source) => {
                    return Err(Error::Fetch {
                        resource: gvr::DEPLOYMENT,
                        name: name.to_string(),
                        source,
                    })
                }
            };
            match evaluate_deployment(&deployment) {
                Ok(()) => Ok(true),
                Err(reason) => {
                    debug!(deployment = %name, %reason, "Deployment not ready");
                    Ok(false)
                }
            }
        })
        .await
    }
}

/// Sleep-then-check until `tick` reports done, an error, or the deadline
///
/// The last sleep is shortened so the final tick lands on the deadline.
async fn poll<F, Fut>(
    config: ReadinessConfig,
    target: &'static str,
    name: &str,
    mut tick: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
{
    let start = Instant::now();
    loop {
        let remaining = config.timeout.saturating_sub(start.elapsed());
        sleep(config.poll_interval.min(remaining)).await;

        if tick().await? {
            return Ok(());
        }
        if start.elapsed() >= config.timeout {
            return Err(Error::Timeout {
                target,
                name: name.to_string(),
                waited: config.timeout,
            });
        }
    }
}
