//! Built-in manifest catalog
//!
//! Descriptors are grouped by lifecycle phase. Order inside a group is the
//! apply order: Calico CRDs before the operator that serves them, the
//! Cluster before the infrastructure objects it references.
//!
//! No built-in descriptor locks any field.

use crate::capi::{Descriptor, ReconcileResult};
use crate::object::gvr;
use crate::template::TemplateEngine;
use crate::variables::Variables;
use crate::Error;

const CLUSTER: &str = include_str!("../../templates/cluster.yaml");
const OCI_CLUSTER_IDENTITY: &str = include_str!("../../templates/oci_cluster_identity.yaml");
const OCI_CLUSTER: &str = include_str!("../../templates/oci_cluster.yaml");
const OCNE_CONFIG_TEMPLATE: &str = include_str!("../../templates/ocne_config_template.yaml");
const OCNE_CONTROL_PLANE: &str = include_str!("../../templates/ocne_control_plane.yaml");
const OCI_CONTROL_PLANE_MACHINE_TEMPLATE: &str =
    include_str!("../../templates/oci_control_plane_machine_template.yaml");
const MACHINE_DEPLOYMENT: &str = include_str!("../../templates/machine_deployment.yaml");
const OCI_MACHINE_TEMPLATE: &str = include_str!("../../templates/oci_machine_template.yaml");
const CALICO_CRDS_INITIAL: &str = include_str!("../../templates/calico_crds_initial.yaml");
const CALICO_CRDS_FINAL: &str = include_str!("../../templates/calico_crds_final.yaml");
const CALICO_OPERATOR: &str = include_str!("../../templates/calico_operator.yaml");
const CALICO: &str = include_str!("../../templates/calico.yaml");
const CCM: &str = include_str!("../../templates/ccm.yaml");
const CSI: &str = include_str!("../../templates/csi.yaml");
const VPO: &str = include_str!("../../templates/vpo.yaml");
const VERRAZZANO_MANAGED_CLUSTER: &str =
    include_str!("../../templates/verrazzano_managed_cluster.yaml");

/// The CAPI Cluster object alone, used for deletion
pub fn cluster() -> Descriptor {
    Descriptor::builtin("cluster", CLUSTER).with_resource(gvr::CLUSTER)
}

/// Calico CNI: CRDs, operator, then the installation
pub fn cni() -> Vec<Descriptor> {
    vec![
        Descriptor::builtin("calico-crds-initial", CALICO_CRDS_INITIAL),
        Descriptor::builtin("calico-crds-final", CALICO_CRDS_FINAL),
        Descriptor::builtin("calico-operator", CALICO_OPERATOR),
        Descriptor::builtin("calico", CALICO),
    ]
}

/// OCI cloud controller manager
pub fn ccm() -> Vec<Descriptor> {
    vec![Descriptor::builtin("ccm", CCM)]
}

/// OCI block volume CSI driver
pub fn csi() -> Vec<Descriptor> {
    vec![Descriptor::builtin("csi", CSI)]
}

/// Verrazzano platform operator
pub fn vpo() -> Vec<Descriptor> {
    vec![Descriptor::builtin("vpo", VPO)]
}

/// Cluster, identity, OCI cluster and worker bootstrap config
pub fn capi() -> Vec<Descriptor> {
    vec![
        cluster(),
        Descriptor::builtin("oci-cluster-identity", OCI_CLUSTER_IDENTITY)
            .with_resource(gvr::OCI_CLUSTER_IDENTITY),
        Descriptor::builtin("oci-cluster", OCI_CLUSTER).with_resource(gvr::OCI_CLUSTER),
        Descriptor::builtin("ocne-config-template", OCNE_CONFIG_TEMPLATE)
            .with_resource(gvr::OCNE_CONFIG_TEMPLATE),
    ]
}

/// Control plane and its machine template
pub fn control_plane() -> Vec<Descriptor> {
    vec![
        Descriptor::builtin("ocne-control-plane", OCNE_CONTROL_PLANE)
            .with_resource(gvr::OCNE_CONTROL_PLANE),
        Descriptor::builtin(
            "oci-control-plane-machine-template",
            OCI_CONTROL_PLANE_MACHINE_TEMPLATE,
        )
        .with_resource(gvr::OCI_MACHINE_TEMPLATE),
    ]
}

/// One MachineDeployment and machine template per node pool
pub fn workers() -> Vec<Descriptor> {
    vec![
        Descriptor::builtin("machine-deployments", MACHINE_DEPLOYMENT)
            .with_resource(gvr::MACHINE_DEPLOYMENT),
        Descriptor::builtin("oci-machine-templates", OCI_MACHINE_TEMPLATE)
            .with_resource(gvr::OCI_MACHINE_TEMPLATE),
    ]
}

/// Registration of the workload cluster on the admin cluster
pub fn verrazzano_managed_cluster() -> Descriptor {
    Descriptor::builtin("verrazzano-managed-cluster", VERRAZZANO_MANAGED_CLUSTER)
        .with_resource(gvr::VERRAZZANO_MANAGED_CLUSTER)
}

/// Add-ons enabled in the configuration, in install order
pub fn add_ons(vars: &Variables) -> Vec<Descriptor> {
    let mut descriptors = Vec::new();
    if vars.install_calico {
        descriptors.extend(cni());
    }
    if vars.install_ccm {
        descriptors.extend(ccm());
    }
    if vars.install_csi {
        descriptors.extend(csi());
    }
    if vars.install_verrazzano {
        descriptors.extend(vpo());
    }
    descriptors
}

/// Everything applied when a cluster is created
pub fn create_objects(vars: &Variables) -> Vec<Descriptor> {
    let mut descriptors = add_ons(vars);
    descriptors.extend(capi());
    descriptors.extend(control_plane());
    descriptors.extend(workers());
    descriptors
}

/// What remains after control plane and workers during a phased update
pub fn update_objects(vars: &Variables) -> Vec<Descriptor> {
    let mut descriptors = add_ons(vars);
    descriptors.extend(capi());
    descriptors
}

/// Split user overlays into one descriptor per YAML document
///
/// Documents are separated by `---` lines. Blank pieces are dropped.
pub fn overlays(yamls: &[String]) -> Vec<Descriptor> {
    let mut descriptors = Vec::new();
    for (i, yaml) in yamls.iter().enumerate() {
        let mut piece = String::new();
        let mut index = 0;
        for line in yaml.lines().chain(std::iter::once("---")) {
            if line.trim_end() == "---" {
                if !piece.trim().is_empty() {
                    descriptors.push(Descriptor::inline(
                        format!("applyYamls[{i}][{index}]"),
                        std::mem::take(&mut piece),
                    ));
                    index += 1;
                }
                piece.clear();
                continue;
            }
            piece.push_str(line);
            piece.push('\n');
        }
    }
    descriptors
}

/// Render descriptors without contacting a cluster
///
/// Stops at the first template that fails.
pub fn render(
    engine: &TemplateEngine,
    descriptors: &[Descriptor],
    vars: &Variables,
) -> Result<ReconcileResult, Error> {
    let mut result = ReconcileResult::default();
    for descriptor in descriptors {
        let docs = engine
            .render_documents(&descriptor.template, vars)
            .map_err(|source| Error::Render {
                descriptor: descriptor.name.to_string(),
                source,
            })?;
        for doc in docs {
            result.add(descriptor.resource_for(&doc), doc);
        }
    }
    Ok(result)
}
