//! Cluster configuration
//!
//! [`Variables`] is the single value every template is rendered against.
//! It is built from user input, then populated with values only the cloud
//! can answer (image id, subnet metadata) and finally stamped with content
//! hashes used to detect drift.

mod hash;

pub use hash::HASH_LEN;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capi::VersionDefaults;
use crate::cloud::{CloudLookup, SubnetAccess};
use crate::object::Document;
use crate::Error;

// =============================================================================
// Defaults
// =============================================================================

/// Default OCPUs for control plane and node pool instances
pub const DEFAULT_OCPUS: i64 = 2;
/// Default memory in GBs
pub const DEFAULT_MEMORY_GBS: i64 = 16;
/// Default boot volume in GBs
pub const DEFAULT_VOLUME_GBS: i64 = 100;
/// Default instance shape
pub const DEFAULT_VM_SHAPE: &str = "VM.Standard.E4.Flex";
/// Default container registry path for OCNE images
pub const DEFAULT_CNE_PATH: &str = "olcne";
/// Default pod network CIDR
pub const DEFAULT_POD_CIDR: &str = "10.244.0.0/16";
/// Default service network CIDR
pub const DEFAULT_CLUSTER_CIDR: &str = "10.96.0.0/16";
/// Namespace holding the CAPI OCI provider credentials
pub const CAPI_OCI_NAMESPACE: &str = "verrazzano-capi";
/// Namespace assumed for cloud credentials given without one
pub const DEFAULT_CREDENTIAL_NAMESPACE: &str = "cattle-global-data";
/// Provider id template handed to the cloud controller manager
pub const PROVIDER_ID: &str = r#"oci://{{ ds["id"] }}"#;
/// Verrazzano resource installed when none is configured
pub const DEFAULT_VERRAZZANO_RESOURCE: &str = "\
apiVersion: install.verrazzano.io/v1beta1
kind: Verrazzano
metadata:
  name: managed
  namespace: default
spec:
  profile: managed-cluster
";

/// Subnet role for service load balancers
pub const LOAD_BALANCER_SUBNET_ROLE: &str = "service-lb";
/// Subnet role for control plane instances
pub const CONTROL_PLANE_SUBNET_ROLE: &str = "control-plane";
/// Subnet role for the control plane endpoint
pub const CONTROL_PLANE_ENDPOINT_SUBNET_ROLE: &str = "control-plane-endpoint";
/// Subnet role for worker instances
pub const WORKER_SUBNET_ROLE: &str = "worker";

fn default_ocpus() -> i64 {
    DEFAULT_OCPUS
}

fn default_memory() -> i64 {
    DEFAULT_MEMORY_GBS
}

fn default_volume() -> i64 {
    DEFAULT_VOLUME_GBS
}

fn default_shape() -> String {
    DEFAULT_VM_SHAPE.to_string()
}

// =============================================================================
// Types
// =============================================================================

/// A named, independently sized group of worker machines
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    /// Pool name, also the MachineDeployment name
    pub name: String,
    /// Number of machines
    pub replicas: i64,
    /// Memory per machine in GBs
    #[serde(default = "default_memory")]
    pub memory: i64,
    /// OCPUs per machine
    #[serde(default = "default_ocpus")]
    pub ocpus: i64,
    /// Boot volume size in GBs
    #[serde(default = "default_volume")]
    pub volume_size: i64,
    /// Instance shape
    #[serde(default = "default_shape")]
    pub shape: String,
}

/// Subnet resolved for a network role
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    /// Subnet id
    pub id: String,
    /// Network role the subnet serves
    pub role: String,
    /// Display name, the role
    pub name: String,
    /// CIDR block
    pub cidr: String,
    /// Public/private classification
    #[serde(rename = "type")]
    pub access: SubnetAccess,
}

/// Parameters for cluster lifecycle operations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Variables {
    // Identity
    /// Cluster name
    pub name: String,
    /// Human readable name
    pub display_name: String,
    /// Namespace of the CAPI objects, the cluster name unless set
    pub namespace: String,
    /// Hash over the whole configuration
    pub hash: String,
    /// Hash over control plane inputs
    pub control_plane_hash: String,
    /// Hash over node pool inputs
    pub node_pool_hash: String,

    // Networking
    /// Let CAPI create the VCN
    pub quick_create_vcn: bool,
    /// Existing VCN id
    pub vcn_id: String,
    /// Worker subnet id
    pub worker_node_subnet: String,
    /// Control plane subnet id
    pub control_plane_subnet: String,
    /// Load balancer subnet id
    pub load_balancer_subnet: String,
    /// Subnets resolved per role
    pub subnets: Vec<Subnet>,
    /// Pod network CIDR
    pub pod_cidr: String,
    /// Service network CIDR
    pub cluster_cidr: String,
    /// HTTP proxy for nodes
    pub proxy_endpoint: String,

    // Topology
    /// Kubernetes version
    pub kubernetes_version: String,
    /// OCNE release
    pub ocne_version: String,
    /// SSH key installed on nodes
    pub ssh_public_key: String,
    /// Control plane instance shape
    pub control_plane_shape: String,
    /// Control plane machine count
    pub control_plane_replicas: i64,
    /// Control plane OCPUs
    pub control_plane_ocpus: i64,
    /// Control plane memory in GBs
    pub control_plane_memory_gbs: i64,
    /// Control plane boot volume in GBs
    pub control_plane_volume_gbs: i64,
    /// Enable in-transit encryption for boot volumes
    pub node_pv_transit_encryption: bool,
    /// Node pools as JSON strings, as supplied by the user
    pub raw_node_pools: Vec<String>,
    /// Extra manifests applied to the workload cluster
    pub apply_yamls: Vec<String>,
    /// Parsed node pools
    pub node_pools: Vec<NodePool>,

    // Image
    /// Image display name looked up in the cloud
    pub image_display_name: String,
    /// Explicit image id, used when OCNE install is skipped
    pub image_id: String,
    /// Image id actually used by machine templates
    pub actual_image: String,
    /// Commands run before OCNE install
    pub pre_ocne_commands: Vec<String>,
    /// Commands run after OCNE install
    pub post_ocne_commands: Vec<String>,
    /// Image already carries OCNE
    pub skip_ocne_install: bool,

    // Add-ons, images and registries
    /// Install Verrazzano on the workload cluster
    pub install_verrazzano: bool,
    /// Set during updates when Verrazzano was turned off
    pub uninstall_verrazzano: bool,
    /// Verrazzano resource template
    pub verrazzano_resource: String,
    /// Verrazzano version to converge to
    pub verrazzano_version: String,
    /// Verrazzano platform operator image tag
    pub verrazzano_tag: String,
    /// Install Calico CNI
    pub install_calico: bool,
    /// Install the OCI cloud controller manager
    pub install_ccm: bool,
    /// Install the OCI CSI driver
    pub install_csi: bool,
    /// Registry path for OCNE images
    pub cne_path: String,
    /// Tigera operator image tag
    pub tigera_tag: String,
    /// etcd image tag
    pub etcd_image_tag: String,
    /// CoreDNS image tag
    pub core_dns_image_tag: String,
    /// Private registry prefix for all images
    pub private_registry: String,

    // Credentials
    /// Namespace of the CAPI credentials secret
    pub capi_oci_namespace: String,
    /// Name of the CAPI credentials secret
    pub capi_credential_name: String,
    /// Cloud credential reference, `namespace:name` or `name`
    pub cloud_credential_id: String,
    /// Compartment for all cloud resources
    pub compartment_id: String,
    /// API key fingerprint
    pub fingerprint: String,
    /// API private key (PEM)
    pub private_key: String,
    /// Passphrase for the private key
    pub private_key_passphrase: String,
    /// Cloud region
    pub region: String,
    /// Tenancy id
    pub tenancy: String,
    /// User id
    pub user: String,
    /// Provider id template for the cloud controller manager
    pub provider_id: String,
}

impl Default for Variables {
    fn default() -> Self {
        Self {
            name: String::new(),
            display_name: String::new(),
            namespace: String::new(),
            hash: String::new(),
            control_plane_hash: String::new(),
            node_pool_hash: String::new(),
            quick_create_vcn: false,
            vcn_id: String::new(),
            worker_node_subnet: String::new(),
            control_plane_subnet: String::new(),
            load_balancer_subnet: String::new(),
            subnets: Vec::new(),
            pod_cidr: DEFAULT_POD_CIDR.to_string(),
            cluster_cidr: DEFAULT_CLUSTER_CIDR.to_string(),
            proxy_endpoint: String::new(),
            kubernetes_version: String::new(),
            ocne_version: String::new(),
            ssh_public_key: String::new(),
            control_plane_shape: DEFAULT_VM_SHAPE.to_string(),
            control_plane_replicas: 1,
            control_plane_ocpus: DEFAULT_OCPUS,
            control_plane_memory_gbs: DEFAULT_MEMORY_GBS,
            control_plane_volume_gbs: DEFAULT_VOLUME_GBS,
            node_pv_transit_encryption: true,
            raw_node_pools: Vec::new(),
            apply_yamls: Vec::new(),
            node_pools: Vec::new(),
            image_display_name: String::new(),
            image_id: String::new(),
            actual_image: String::new(),
            pre_ocne_commands: Vec::new(),
            post_ocne_commands: Vec::new(),
            skip_ocne_install: false,
            install_verrazzano: false,
            uninstall_verrazzano: false,
            verrazzano_resource: DEFAULT_VERRAZZANO_RESOURCE.to_string(),
            verrazzano_version: String::new(),
            verrazzano_tag: String::new(),
            install_calico: true,
            install_ccm: true,
            install_csi: true,
            cne_path: DEFAULT_CNE_PATH.to_string(),
            tigera_tag: String::new(),
            etcd_image_tag: String::new(),
            core_dns_image_tag: String::new(),
            private_registry: String::new(),
            capi_oci_namespace: CAPI_OCI_NAMESPACE.to_string(),
            capi_credential_name: String::new(),
            cloud_credential_id: String::new(),
            compartment_id: String::new(),
            fingerprint: String::new(),
            private_key: String::new(),
            private_key_passphrase: String::new(),
            region: String::new(),
            tenancy: String::new(),
            user: String::new(),
            provider_id: PROVIDER_ID.to_string(),
        }
    }
}

impl Variables {
    /// Check the user-supplied values before anything is rendered
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::validation_for_field(
                "",
                "name",
                "cluster name must not be empty",
            ));
        }
        if self.control_plane_replicas < 1 {
            return Err(Error::validation_for_field(
                &self.name,
                "controlPlaneReplicas",
                "control plane needs at least one replica",
            ));
        }

        let mut seen = BTreeSet::new();
        for pool in &self.parse_node_pools()? {
            if pool.name.is_empty() {
                return Err(Error::validation_for_field(
                    &self.name,
                    "nodePools",
                    "node pool name must not be empty",
                ));
            }
            if !seen.insert(pool.name.clone()) {
                return Err(Error::validation_for_field(
                    &self.name,
                    "nodePools",
                    format!("duplicate node pool name {}", pool.name),
                ));
            }
            if pool.replicas < 0 {
                return Err(Error::validation_for_field(
                    &self.name,
                    "nodePools",
                    format!("node pool {} has negative replicas", pool.name),
                ));
            }
        }
        Ok(())
    }

    /// Decode the raw node pool JSON strings
    pub fn parse_node_pools(&self) -> Result<Vec<NodePool>, Error> {
        self.raw_node_pools
            .iter()
            .map(|raw| {
                serde_json::from_str(raw).map_err(|e| {
                    Error::validation_for_field(
                        &self.name,
                        "nodePools",
                        format!("invalid node pool {raw}: {e}"),
                    )
                })
            })
            .collect()
    }

    /// Names of the node pools currently desired
    pub fn node_pool_names(&self) -> BTreeSet<&str> {
        self.node_pools.iter().map(|np| np.name.as_str()).collect()
    }

    /// Fill in values derived from user input and the cloud, then hash
    ///
    /// The namespace defaults to the cluster name. Subnet lookups are cached
    /// per id because control plane and endpoint usually share a subnet.
    pub async fn populate(&mut self, cloud: &dyn CloudLookup) -> Result<(), Error> {
        if self.namespace.is_empty() {
            self.namespace = self.name.clone();
        }
        self.node_pools = self.parse_node_pools()?;
        self.set_image_id(cloud).await?;
        self.set_subnets(cloud).await?;
        self.set_hashes()?;
        Ok(())
    }

    async fn set_image_id(&mut self, cloud: &dyn CloudLookup) -> Result<(), Error> {
        // Bring-your-own images are used as given
        if self.skip_ocne_install {
            self.actual_image = self.image_id.clone();
            return Ok(());
        }
        self.actual_image = cloud
            .image_id_by_name(&self.image_display_name, &self.compartment_id)
            .await?;
        debug!(cluster = %self.name, image = %self.actual_image, "Resolved image");
        Ok(())
    }

    async fn set_subnets(&mut self, cloud: &dyn CloudLookup) -> Result<(), Error> {
        let roles = [
            (self.load_balancer_subnet.clone(), LOAD_BALANCER_SUBNET_ROLE),
            (self.control_plane_subnet.clone(), CONTROL_PLANE_SUBNET_ROLE),
            (
                self.control_plane_subnet.clone(),
                CONTROL_PLANE_ENDPOINT_SUBNET_ROLE,
            ),
            (self.worker_node_subnet.clone(), WORKER_SUBNET_ROLE),
        ];

        let mut cache = BTreeMap::new();
        let mut subnets = Vec::new();
        for (id, role) in roles {
            if id.is_empty() {
                continue;
            }
            if !cache.contains_key(&id) {
                let found = cloud.subnet_by_id(&id).await?;
                cache.insert(id.clone(), found);
            }
            let Some(found) = cache.get(&id) else {
                continue;
            };
            subnets.push(Subnet {
                id: id.clone(),
                role: role.to_string(),
                name: role.to_string(),
                cidr: found.cidr_block.clone(),
                access: found.access(),
            });
        }

        self.subnets = subnets;
        Ok(())
    }

    /// Carry values that may change during an update into persisted state
    ///
    /// Turning Verrazzano off flags it for uninstall. Dynamic values must be
    /// re-populated afterwards.
    pub fn set_update_values(&mut self, new: &Variables) {
        self.uninstall_verrazzano = self.install_verrazzano && !new.install_verrazzano;

        self.kubernetes_version = new.kubernetes_version.clone();
        self.control_plane_replicas = new.control_plane_replicas;
        self.image_display_name = new.image_display_name.clone();
        self.control_plane_ocpus = new.control_plane_ocpus;
        self.control_plane_memory_gbs = new.control_plane_memory_gbs;
        self.control_plane_volume_gbs = new.control_plane_volume_gbs;
        self.raw_node_pools = new.raw_node_pools.clone();
        self.ssh_public_key = new.ssh_public_key.clone();
        self.display_name = new.display_name.clone();
        self.skip_ocne_install = new.skip_ocne_install;
        self.image_id = new.image_id.clone();
        self.apply_yamls = new.apply_yamls.clone();
        self.tigera_tag = new.tigera_tag.clone();
        self.etcd_image_tag = new.etcd_image_tag.clone();
        self.core_dns_image_tag = new.core_dns_image_tag.clone();
        self.private_registry = new.private_registry.clone();
        self.install_verrazzano = new.install_verrazzano;
        self.verrazzano_tag = new.verrazzano_tag.clone();
        self.verrazzano_version = new.verrazzano_version.clone();
        self.verrazzano_resource = new.verrazzano_resource.clone();
    }

    /// Fill versions and image tags the user left empty
    ///
    /// Returns `true` when anything changed; hashes must then be recomputed.
    pub fn apply_version_defaults(&mut self, defaults: &VersionDefaults) -> bool {
        let images = &defaults.release.container_images;
        let mut changed = false;
        for (field, default) in [
            (&mut self.kubernetes_version, &defaults.kubernetes_version),
            (&mut self.ocne_version, &defaults.release.release),
            (&mut self.etcd_image_tag, &images.etcd),
            (&mut self.core_dns_image_tag, &images.coredns),
            (&mut self.tigera_tag, &images.tigera_operator),
            (&mut self.verrazzano_version, &defaults.verrazzano_version),
        ] {
            if field.is_empty() && !default.is_empty() {
                field.clone_from(default);
                changed = true;
            }
        }
        changed
    }

    /// Total machines: control plane plus every node pool
    pub fn node_count(&self) -> i64 {
        self.control_plane_replicas + self.worker_node_count()
    }

    /// Machines across all node pools
    pub fn worker_node_count(&self) -> i64 {
        self.node_pools.iter().map(|np| np.replicas).sum()
    }

    /// True when control plane nodes also run workloads
    pub fn is_single_node_cluster(&self) -> bool {
        self.worker_node_count() == 0
    }

    /// Split the cloud credential reference into (name, namespace)
    pub fn cloud_credential_name_and_namespace(&self) -> (&str, &str) {
        match self.cloud_credential_id.split_once(':') {
            Some((namespace, name)) => (name, namespace),
            None => (&self.cloud_credential_id, DEFAULT_CREDENTIAL_NAMESPACE),
        }
    }

    /// Name of the secret holding the workload cluster kubeconfig
    pub fn kubeconfig_secret_name(&self) -> String {
        format!("{}-kubeconfig", self.name)
    }

    /// True when any VCN or subnet id is still unknown
    pub fn is_networking_unset(&self) -> bool {
        self.vcn_id.is_empty()
            || self.control_plane_subnet.is_empty()
            || self.load_balancer_subnet.is_empty()
            || self.worker_node_subnet.is_empty()
    }

    /// Record the VCN and subnets CAPI created for a quick-create cluster
    ///
    /// Reads `spec.networkSpec.vcn` of the OCICluster. Returns `false` while
    /// the VCN or its subnets are not yet populated.
    pub fn apply_quick_create_network(&mut self, oci_cluster: &Document) -> bool {
        let Ok(vcn_id) = oci_cluster.str_field(&["spec", "networkSpec", "vcn", "id"]) else {
            return false;
        };
        let Some(subnets) = oci_cluster
            .field(&["spec", "networkSpec", "vcn", "subnets"])
            .ok()
            .and_then(|v| v.as_array())
        else {
            return false;
        };

        let mut resolved = BTreeMap::new();
        for subnet in subnets {
            let role = subnet.get("role").and_then(|v| v.as_str());
            let id = subnet.get("id").and_then(|v| v.as_str());
            match (role, id) {
                (Some(role), Some(id)) => {
                    resolved.insert(role.to_string(), id.to_string());
                }
                _ => return false,
            }
        }

        self.vcn_id = vcn_id.to_string();
        for (role, id) in resolved {
            match role.as_str() {
                CONTROL_PLANE_SUBNET_ROLE => self.control_plane_subnet = id,
                LOAD_BALANCER_SUBNET_ROLE => self.load_balancer_subnet = id,
                WORKER_SUBNET_ROLE => self.worker_node_subnet = id,
                _ => {}
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{CloudSubnet, MockCloudLookup};
    use mockall::predicate::eq;
    use serde_json::json;

    pub(crate) fn sample() -> Variables {
        Variables {
            name: "prod".to_string(),
            kubernetes_version: "v1.26.6".to_string(),
            image_display_name: "Oracle-Linux-8.8".to_string(),
            compartment_id: "ocid1.compartment.oc1..c".to_string(),
            control_plane_subnet: "ocid1.subnet.oc1..cp".to_string(),
            worker_node_subnet: "ocid1.subnet.oc1..worker".to_string(),
            raw_node_pools: vec![
                r#"{"name":"np-1","replicas":2}"#.to_string(),
                r#"{"name":"np-2","replicas":1,"ocpus":4,"shape":"VM.Standard3.Flex"}"#.to_string(),
            ],
            ..Variables::default()
        }
    }

    #[test]
    fn node_pools_parse_with_defaults() {
        let pools = sample().parse_node_pools().unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].ocpus, DEFAULT_OCPUS);
        assert_eq!(pools[0].memory, DEFAULT_MEMORY_GBS);
        assert_eq!(pools[0].shape, DEFAULT_VM_SHAPE);
        assert_eq!(pools[1].ocpus, 4);
        assert_eq!(pools[1].volume_size, DEFAULT_VOLUME_GBS);
    }

    #[test]
    fn invalid_node_pool_json_is_a_validation_error() {
        let mut vars = sample();
        vars.raw_node_pools.push("{not json".to_string());
        let err = vars.parse_node_pools().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn validation_rejects_duplicate_pools() {
        let mut vars = sample();
        vars.raw_node_pools
            .push(r#"{"name":"np-1","replicas":1}"#.to_string());
        let err = vars.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate node pool name np-1"));
        assert!(sample().validate().is_ok());
    }

    #[tokio::test]
    async fn populate_resolves_image_subnets_and_hashes() {
        let mut cloud = MockCloudLookup::new();
        cloud
            .expect_image_id_by_name()
            .with(eq("Oracle-Linux-8.8"), eq("ocid1.compartment.oc1..c"))
            .times(1)
            .returning(|_, _| Ok("ocid1.image.oc1..img".to_string()));
        // control-plane and control-plane-endpoint share one lookup
        cloud
            .expect_subnet_by_id()
            .with(eq("ocid1.subnet.oc1..cp"))
            .times(1)
            .returning(|_| {
                Ok(CloudSubnet {
                    cidr_block: "10.0.0.0/29".to_string(),
                    prohibit_public_ip_on_vnic: true,
                })
            });
        cloud
            .expect_subnet_by_id()
            .with(eq("ocid1.subnet.oc1..worker"))
            .times(1)
            .returning(|_| {
                Ok(CloudSubnet {
                    cidr_block: "10.0.64.0/20".to_string(),
                    prohibit_public_ip_on_vnic: false,
                })
            });

        let mut vars = sample();
        vars.populate(&cloud).await.unwrap();

        assert_eq!(vars.namespace, "prod");
        assert_eq!(vars.actual_image, "ocid1.image.oc1..img");
        let roles: Vec<_> = vars.subnets.iter().map(|s| s.role.as_str()).collect();
        assert_eq!(
            roles,
            vec![
                CONTROL_PLANE_SUBNET_ROLE,
                CONTROL_PLANE_ENDPOINT_SUBNET_ROLE,
                WORKER_SUBNET_ROLE
            ]
        );
        assert_eq!(vars.subnets[2].access, SubnetAccess::Public);
        assert_eq!(vars.node_pools.len(), 2);
        assert_eq!(vars.hash.len(), HASH_LEN);
    }

    #[tokio::test]
    async fn skip_install_uses_the_explicit_image() {
        let mut cloud = MockCloudLookup::new();
        cloud.expect_image_id_by_name().never();
        cloud.expect_subnet_by_id().returning(|_| {
            Ok(CloudSubnet {
                cidr_block: "10.0.0.0/16".to_string(),
                prohibit_public_ip_on_vnic: false,
            })
        });

        let mut vars = sample();
        vars.skip_ocne_install = true;
        vars.image_id = "ocid1.image.oc1..byo".to_string();
        vars.populate(&cloud).await.unwrap();

        assert_eq!(vars.actual_image, "ocid1.image.oc1..byo");
    }

    #[test]
    fn update_values_flag_verrazzano_uninstall() {
        let mut current = sample();
        current.install_verrazzano = true;
        let mut next = sample();
        next.install_verrazzano = false;
        next.kubernetes_version = "v1.27.4".to_string();
        next.raw_node_pools = vec![r#"{"name":"np-1","replicas":5}"#.to_string()];

        current.set_update_values(&next);

        assert!(current.uninstall_verrazzano);
        assert!(!current.install_verrazzano);
        assert_eq!(current.kubernetes_version, "v1.27.4");
        assert_eq!(current.raw_node_pools.len(), 1);
    }

    #[test]
    fn node_counts() {
        let mut vars = sample();
        vars.control_plane_replicas = 3;
        vars.node_pools = vars.parse_node_pools().unwrap();
        assert_eq!(vars.node_count(), 6);
        assert!(!vars.is_single_node_cluster());

        vars.node_pools.clear();
        assert!(vars.is_single_node_cluster());
    }

    #[test]
    fn credential_reference_parsing() {
        let mut vars = sample();
        vars.cloud_credential_id = "cattle-global-data:cc-abc".to_string();
        assert_eq!(
            vars.cloud_credential_name_and_namespace(),
            ("cc-abc", "cattle-global-data")
        );
        vars.cloud_credential_id = "cc-xyz".to_string();
        assert_eq!(
            vars.cloud_credential_name_and_namespace(),
            ("cc-xyz", DEFAULT_CREDENTIAL_NAMESPACE)
        );
    }

    #[test]
    fn quick_create_network_is_read_from_oci_cluster() {
        let mut vars = sample();
        let pending = Document::from_value(json!({"spec": {"networkSpec": {"vcn": {}}}})).unwrap();
        assert!(!vars.apply_quick_create_network(&pending));

        let ready = Document::from_value(json!({"spec": {"networkSpec": {"vcn": {
            "id": "ocid1.vcn.oc1..v",
            "subnets": [
                {"role": "control-plane", "id": "cp"},
                {"role": "service-lb", "id": "lb"},
                {"role": "worker", "id": "w"},
                {"role": "bastion", "id": "b"},
            ],
        }}}}))
        .unwrap();
        assert!(vars.apply_quick_create_network(&ready));
        assert_eq!(vars.vcn_id, "ocid1.vcn.oc1..v");
        assert_eq!(vars.load_balancer_subnet, "lb");
        assert_eq!(vars.worker_node_subnet, "w");
        assert!(!vars.is_networking_unset());
    }

    #[test]
    fn configuration_deserializes_from_camel_case_yaml() {
        let vars: Variables = serde_yaml::from_str(
            "name: prod\nkubernetesVersion: v1.26.6\ninstallCcm: false\nnodePools: []\n",
        )
        .unwrap();
        assert_eq!(vars.name, "prod");
        assert!(!vars.install_ccm);
        assert!(vars.install_calico);
        assert_eq!(vars.control_plane_ocpus, DEFAULT_OCPUS);
    }

    #[test]
    fn version_defaults_only_fill_empty_fields() {
        use crate::capi::defaults::{ContainerImages, ReleaseDefaults};

        let defaults = VersionDefaults {
            kubernetes_version: "v1.25.7".to_string(),
            release: ReleaseDefaults {
                release: "1.6".to_string(),
                container_images: ContainerImages {
                    coredns: "v1.9.3".to_string(),
                    etcd: "3.5.6".to_string(),
                    tigera_operator: "v1.29.0".to_string(),
                    ..ContainerImages::default()
                },
            },
            verrazzano_version: String::new(),
        };
        let mut vars = Variables {
            name: "prod".to_string(),
            kubernetes_version: "v1.26.6".to_string(),
            verrazzano_version: "v1.6.0".to_string(),
            ..Variables::default()
        };

        assert!(vars.apply_version_defaults(&defaults));
        assert_eq!(vars.kubernetes_version, "v1.26.6");
        assert_eq!(vars.ocne_version, "1.6");
        assert_eq!(vars.core_dns_image_tag, "v1.9.3");
        assert_eq!(vars.etcd_image_tag, "3.5.6");
        assert_eq!(vars.tigera_tag, "v1.29.0");
        assert_eq!(vars.verrazzano_version, "v1.6.0");

        assert!(!vars.apply_version_defaults(&defaults));
    }
}
