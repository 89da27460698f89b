//! CAPI (Cluster API) cluster lifecycle
//!
//! [`ClusterLifecycle`] sequences the lower-level pieces: the provider
//! credential secret, catalog reconciliation, readiness waits, node pool
//! garbage collection, overlays and Verrazzano. Every method takes the
//! configuration explicitly and can be re-run after a failure.

pub mod client;
pub mod credentials;
pub mod defaults;
pub mod gc;
pub mod ready;
pub mod reconcile;
pub mod verrazzano;

pub use client::{ApiError, KubeResourceClient, ResourceClient};
pub use defaults::{load_version_defaults, VersionDefaults};
pub use ready::{NotReadyReason, Readiness, ReadinessConfig};
pub use reconcile::{Descriptor, ReconcileResult, Reconciler};
pub use verrazzano::Removal;

use kube::config::Kubeconfig;
use tracing::info;

use crate::catalog;
use crate::merge::LockedFields;
use crate::object::{gvr, Document};
use crate::template::TemplateEngine;
use crate::variables::Variables;
use crate::Error;

/// Drives a cluster through create, update and delete against the admin
/// cluster
pub struct ClusterLifecycle<'a> {
    admin: &'a dyn ResourceClient,
    engine: TemplateEngine,
    readiness: ReadinessConfig,
}

impl<'a> ClusterLifecycle<'a> {
    /// Create with the default cluster readiness timing
    pub fn new(admin: &'a dyn ResourceClient) -> Self {
        Self {
            admin,
            engine: TemplateEngine::new(),
            readiness: ReadinessConfig::CLUSTER,
        }
    }

    /// Override the cluster readiness timing
    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.admin, &self.engine)
    }

    fn readiness(&self) -> Readiness<'_> {
        Readiness::new(self.admin).with_config(self.readiness)
    }

    async fn apply_credentials(&self, vars: &Variables) -> Result<Document, Error> {
        let secret = credentials::capi_credential_secret(vars)?;
        self.reconciler()
            .apply(secret, &gvr::SECRET, &LockedFields::EMPTY)
            .await
    }

    /// Apply the provider credentials and every create-time descriptor
    pub async fn create_or_update_all(&self, vars: &Variables) -> Result<ReconcileResult, Error> {
        let secret = self.apply_credentials(vars).await?;
        let mut result = ReconcileResult::default();
        result.add(gvr::SECRET, secret);
        result.merge(
            self.reconciler()
                .reconcile_all(&catalog::create_objects(vars), vars)
                .await?,
        );
        info!(cluster = %vars.name, objects = result.len(), "Cluster objects applied");
        Ok(result)
    }

    /// Roll an existing cluster forward one phase at a time
    ///
    /// Control plane first, then workers, each followed by a readiness
    /// wait. Node pools that are no longer declared are removed before the
    /// remaining objects are applied.
    pub async fn update_cluster(&self, vars: &Variables) -> Result<ReconcileResult, Error> {
        let secret = self.apply_credentials(vars).await?;
        let mut result = ReconcileResult::default();
        result.add(gvr::SECRET, secret);

        let reconciler = self.reconciler();
        result.merge(reconciler.reconcile_all(&catalog::control_plane(), vars).await?);
        info!(cluster = %vars.name, "Control plane updated, waiting for cluster");
        self.wait_for_cluster_ready(vars).await?;

        result.merge(reconciler.reconcile_all(&catalog::workers(), vars).await?);
        info!(cluster = %vars.name, "Workers updated, waiting for cluster");
        self.wait_for_cluster_ready(vars).await?;

        self.delete_hanging_resources(vars).await?;

        result.merge(reconciler.reconcile_all(&catalog::update_objects(vars), vars).await?);
        self.wait_for_cluster_ready(vars).await?;
        Ok(result)
    }

    /// Block until the cluster and all of its machines are ready
    pub async fn wait_for_cluster_ready(&self, vars: &Variables) -> Result<(), Error> {
        self.readiness()
            .wait_for_cluster_ready(&vars.name, &vars.namespace)
            .await
    }

    /// Check readiness once, returning [`Error::NotReady`] if converging
    pub async fn check_cluster_ready(&self, vars: &Variables) -> Result<(), Error> {
        self.readiness()
            .check_cluster_ready(&vars.name, &vars.namespace)
            .await
    }

    /// Remove node pools (and their machine templates) no longer declared
    pub async fn delete_hanging_resources(&self, vars: &Variables) -> Result<Vec<String>, Error> {
        gc::delete_orphaned_node_pools(self.admin, &vars.namespace, &vars.node_pool_names()).await
    }

    /// Delete the CAPI Cluster object; CAPI cascades to everything it owns
    ///
    /// Returns `true` when the cluster still existed.
    pub async fn delete_cluster(&self, vars: &Variables) -> Result<bool, Error> {
        let deleted = self
            .reconciler()
            .delete_rendered(&catalog::cluster(), vars)
            .await?;
        if deleted > 0 {
            info!(cluster = %vars.name, "Cluster deletion requested");
        }
        Ok(deleted > 0)
    }

    /// Copy network ids CAPI created for a quick-create VCN into `vars`
    ///
    /// Returns `true` when `vars` changed. Clusters with an existing VCN,
    /// or whose network ids are already known, are left untouched.
    pub async fn sync_quick_create_network(&self, vars: &mut Variables) -> Result<bool, Error> {
        if !vars.quick_create_vcn || !vars.is_networking_unset() {
            return Ok(false);
        }
        let oci_cluster = self
            .admin
            .get(&gvr::OCI_CLUSTER, &vars.namespace, &vars.name)
            .await
            .map_err(|source| Error::Fetch {
                resource: gvr::OCI_CLUSTER,
                name: vars.name.clone(),
                source,
            })?;
        let changed = vars.apply_quick_create_network(&oci_cluster);
        if changed {
            info!(cluster = %vars.name, vcn = %vars.vcn_id, "Recorded quick-create network");
        }
        Ok(changed)
    }

    /// Apply the user's raw YAML overlays to the workload cluster
    pub async fn apply_yaml_overlays(
        &self,
        workload: &dyn ResourceClient,
        vars: &Variables,
    ) -> Result<ReconcileResult, Error> {
        Reconciler::new(workload, &self.engine)
            .reconcile_all(&catalog::overlays(&vars.apply_yamls), vars)
            .await
    }

    /// Install or upgrade Verrazzano on the workload cluster and register it
    pub async fn install_verrazzano(
        &self,
        workload: &dyn ResourceClient,
        vars: &Variables,
    ) -> Result<(), Error> {
        verrazzano::Verrazzano::new(self.admin, workload, &self.engine)
            .install_and_register(vars)
            .await
    }

    /// Remove the Verrazzano registration and resource
    pub async fn delete_verrazzano(
        &self,
        workload: &dyn ResourceClient,
        vars: &Variables,
    ) -> Result<Removal, Error> {
        verrazzano::Verrazzano::new(self.admin, workload, &self.engine)
            .delete_resources(vars)
            .await
    }

    /// Read the workload cluster kubeconfig
    pub async fn kubeconfig(&self, vars: &Variables) -> Result<Kubeconfig, Error> {
        credentials::read_kubeconfig(self.admin, vars).await
    }
}

#[cfg(test)]
mod tests {
    use super::client::testing::InMemoryClient;
    use super::ready::CLUSTER_NAME_LABEL;
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    const FAST: ReadinessConfig = ReadinessConfig {
        poll_interval: Duration::from_secs(1),
        timeout: Duration::from_secs(5),
    };

    fn vars() -> Variables {
        let mut vars = Variables {
            name: "prod".to_string(),
            namespace: "prod".to_string(),
            kubernetes_version: "v1.26.6".to_string(),
            compartment_id: "ocid1.compartment.oc1..c".to_string(),
            actual_image: "ocid1.image.oc1..img".to_string(),
            capi_credential_name: "cc-abc".to_string(),
            install_calico: false,
            install_ccm: false,
            install_csi: false,
            raw_node_pools: vec![r#"{"name":"np-1","replicas":1}"#.to_string()],
            ..Variables::default()
        };
        vars.node_pools = vars.parse_node_pools().unwrap();
        vars.set_hashes().unwrap();
        vars
    }

    fn mark_ready(client: &InMemoryClient, vars: &Variables) {
        let mut cluster = client
            .stored(&gvr::CLUSTER, &vars.namespace, &vars.name)
            .unwrap();
        cluster
            .set_field(
                &["status"],
                json!({"controlPlaneReady": true, "infrastructureReady": true, "phase": "Provisioned"}),
            )
            .unwrap();
        client.insert(&gvr::CLUSTER, cluster);
        client.insert(
            &gvr::MACHINE,
            Document::from_value(json!({
                "apiVersion": "cluster.x-k8s.io/v1beta1",
                "kind": "Machine",
                "metadata": {
                    "name": "prod-cp-0",
                    "namespace": "prod",
                    "labels": {CLUSTER_NAME_LABEL: "prod"},
                },
                "status": {"phase": "Running"},
            }))
            .unwrap(),
        );
    }

    // ==========================================================================
    // Story Tests: Creating and updating a cluster
    // ==========================================================================

    #[tokio::test]
    async fn create_applies_credentials_before_cluster_objects() {
        let client = InMemoryClient::new();
        let lifecycle = ClusterLifecycle::new(&client);

        let result = lifecycle.create_or_update_all(&vars()).await.unwrap();

        let writes = client.writes();
        assert_eq!(writes[0].0, "create");
        assert_eq!(writes[0].1.0, gvr::SECRET.to_string());
        assert_eq!(result.names(&gvr::SECRET), vec!["cc-abc"]);
        assert_eq!(result.names(&gvr::CLUSTER), vec!["prod"]);
        assert_eq!(result.names(&gvr::MACHINE_DEPLOYMENT), vec!["np-1"]);
        assert!(client
            .stored(&gvr::OCNE_CONTROL_PLANE, "prod", "prod-control-plane")
            .is_some());
    }

    #[tokio::test]
    async fn create_without_credentials_applies_nothing() {
        let client = InMemoryClient::new();
        let mut vars = vars();
        vars.capi_credential_name.clear();

        let err = ClusterLifecycle::new(&client)
            .create_or_update_all(&vars)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(client.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn update_rolls_phases_and_prunes_removed_pools() {
        let client = InMemoryClient::new();
        let lifecycle = ClusterLifecycle::new(&client).with_readiness(FAST);
        let mut vars = vars();
        lifecycle.create_or_update_all(&vars).await.unwrap();
        mark_ready(&client, &vars);

        vars.raw_node_pools = vec![r#"{"name":"np-2","replicas":3}"#.to_string()];
        vars.node_pools = vars.parse_node_pools().unwrap();
        vars.set_hashes().unwrap();
        let result = lifecycle.update_cluster(&vars).await.unwrap();

        assert_eq!(result.names(&gvr::MACHINE_DEPLOYMENT), vec!["np-2"]);
        assert!(client.stored(&gvr::MACHINE_DEPLOYMENT, "prod", "np-1").is_none());
        let np2 = client.stored(&gvr::MACHINE_DEPLOYMENT, "prod", "np-2").unwrap();
        assert_eq!(np2.i64_field(&["spec", "replicas"]), Ok(3));
        // the merge keeps the status written by CAPI
        let cluster = client.stored(&gvr::CLUSTER, "prod", "prod").unwrap();
        assert_eq!(cluster.str_field(&["status", "phase"]), Ok("Provisioned"));
    }

    #[tokio::test(start_paused = true)]
    async fn update_stops_when_the_control_plane_never_settles() {
        let client = InMemoryClient::new();
        let lifecycle = ClusterLifecycle::new(&client).with_readiness(FAST);
        let vars = vars();
        lifecycle.create_or_update_all(&vars).await.unwrap();

        let err = lifecycle.update_cluster(&vars).await.unwrap_err();

        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn single_shot_check_reports_not_ready() {
        let client = InMemoryClient::new();
        let lifecycle = ClusterLifecycle::new(&client);
        let vars = vars();
        lifecycle.create_or_update_all(&vars).await.unwrap();

        assert!(lifecycle
            .check_cluster_ready(&vars)
            .await
            .unwrap_err()
            .is_not_ready());

        mark_ready(&client, &vars);
        lifecycle.check_cluster_ready(&vars).await.unwrap();
    }

    // ==========================================================================
    // Story Tests: Network sync, overlays and deletion
    // ==========================================================================

    #[tokio::test]
    async fn quick_create_network_is_copied_from_the_oci_cluster() {
        let client = InMemoryClient::new();
        client.insert(
            &gvr::OCI_CLUSTER,
            Document::from_value(json!({
                "apiVersion": "infrastructure.cluster.x-k8s.io/v1beta1",
                "kind": "OCICluster",
                "metadata": {"name": "prod", "namespace": "prod"},
                "spec": {"networkSpec": {"vcn": {
                    "id": "ocid1.vcn.oc1..v",
                    "subnets": [
                        {"role": "control-plane", "id": "cp"},
                        {"role": "service-lb", "id": "lb"},
                        {"role": "worker", "id": "w"},
                    ],
                }}},
            }))
            .unwrap(),
        );
        let lifecycle = ClusterLifecycle::new(&client);
        let mut vars = vars();
        vars.quick_create_vcn = true;

        assert!(lifecycle.sync_quick_create_network(&mut vars).await.unwrap());
        assert_eq!(vars.vcn_id, "ocid1.vcn.oc1..v");
        assert_eq!(vars.worker_node_subnet, "w");
        assert!(!lifecycle.sync_quick_create_network(&mut vars).await.unwrap());
    }

    #[tokio::test]
    async fn overlays_are_applied_to_the_workload_cluster() {
        let admin = InMemoryClient::new();
        let workload = InMemoryClient::new();
        let mut vars = vars();
        vars.apply_yamls = vec!["\
apiVersion: v1
kind: Namespace
metadata:
  name: {{ name }}-apps
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
  namespace: {{ name }}-apps
"
        .to_string()];

        let result = ClusterLifecycle::new(&admin)
            .apply_yaml_overlays(&workload, &vars)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(admin.len(), 0);
        assert!(workload
            .stored(&gvr::CONFIG_MAP, "prod-apps", "settings")
            .is_some());
    }

    #[tokio::test]
    async fn delete_cluster_is_idempotent() {
        let client = InMemoryClient::new();
        let lifecycle = ClusterLifecycle::new(&client);
        let vars = vars();
        lifecycle.create_or_update_all(&vars).await.unwrap();

        assert!(lifecycle.delete_cluster(&vars).await.unwrap());
        assert!(!lifecycle.delete_cluster(&vars).await.unwrap());
        assert!(client.stored(&gvr::CLUSTER, "prod", "prod").is_none());
    }
}
