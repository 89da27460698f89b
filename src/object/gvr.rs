//! Resource-type addressing for API objects

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A (group, version, resource) triple addressing a class of API objects
///
/// The core group is represented by an empty `group`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvr {
    /// API group, empty for the core group
    pub group: Cow<'static, str>,
    /// API version within the group
    pub version: Cow<'static, str>,
    /// Plural, lower-case resource name
    pub resource: Cow<'static, str>,
}

impl Gvr {
    /// Build a resource type from static parts, usable in constants
    pub const fn from_static(
        group: &'static str,
        version: &'static str,
        resource: &'static str,
    ) -> Self {
        Self {
            group: Cow::Borrowed(group),
            version: Cow::Borrowed(version),
            resource: Cow::Borrowed(resource),
        }
    }

    /// Build a resource type from owned parts
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: Cow::Owned(group.into()),
            version: Cow::Owned(version.into()),
            resource: Cow::Owned(resource.into()),
        }
    }

    /// Resolve the resource type for a document's apiVersion and kind
    ///
    /// The resource name comes from [`infer_resource`].
    pub fn for_kind(api_version: &str, kind: &str) -> Self {
        let (group, version) = split_api_version(api_version);
        Self::new(group, version, infer_resource(kind))
    }

    /// The `apiVersion` string for objects of this type
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.version, self.resource)
    }
}

/// Split an apiVersion into (group, version)
///
/// `v1` belongs to the core group and yields an empty group.
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.rsplit_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Derive the plural resource name from a kind
///
/// Lower-cases the kind, then replaces a trailing `y` with `ies` or appends
/// `s`. Irregular plurals (e.g. `Endpoints`, `Ingress`) are not handled;
/// descriptors for such kinds must pin their resource type.
pub fn infer_resource(kind: &str) -> String {
    let lower = kind.to_lowercase();
    match lower.strip_suffix('y') {
        Some(stem) => format!("{stem}ies"),
        None => format!("{lower}s"),
    }
}

// =============================================================================
// Known resource types
// =============================================================================

/// CAPI core API group
pub const CAPI_GROUP: &str = "cluster.x-k8s.io";
/// CAPI infrastructure API group
pub const INFRASTRUCTURE_GROUP: &str = "infrastructure.cluster.x-k8s.io";
/// CAPI control plane API group
pub const CONTROL_PLANE_GROUP: &str = "controlplane.cluster.x-k8s.io";
/// CAPI bootstrap API group
pub const BOOTSTRAP_GROUP: &str = "bootstrap.cluster.x-k8s.io";
/// CAPI add-ons API group
pub const ADDONS_GROUP: &str = "addons.cluster.x-k8s.io";

/// `clusters.cluster.x-k8s.io`
pub const CLUSTER: Gvr = Gvr::from_static(CAPI_GROUP, "v1beta1", "clusters");
/// `machines.cluster.x-k8s.io`
pub const MACHINE: Gvr = Gvr::from_static(CAPI_GROUP, "v1beta1", "machines");
/// `machinedeployments.cluster.x-k8s.io`
pub const MACHINE_DEPLOYMENT: Gvr = Gvr::from_static(CAPI_GROUP, "v1beta1", "machinedeployments");
/// `ociclusters.infrastructure.cluster.x-k8s.io`
pub const OCI_CLUSTER: Gvr = Gvr::from_static(INFRASTRUCTURE_GROUP, "v1beta1", "ociclusters");
/// `ociclusteridentities.infrastructure.cluster.x-k8s.io`
pub const OCI_CLUSTER_IDENTITY: Gvr =
    Gvr::from_static(INFRASTRUCTURE_GROUP, "v1beta1", "ociclusteridentities");
/// `ocimachinetemplates.infrastructure.cluster.x-k8s.io`
pub const OCI_MACHINE_TEMPLATE: Gvr =
    Gvr::from_static(INFRASTRUCTURE_GROUP, "v1beta1", "ocimachinetemplates");
/// `ocnecontrolplanes.controlplane.cluster.x-k8s.io`
pub const OCNE_CONTROL_PLANE: Gvr =
    Gvr::from_static(CONTROL_PLANE_GROUP, "v1alpha1", "ocnecontrolplanes");
/// `ocneconfigtemplates.bootstrap.cluster.x-k8s.io`
pub const OCNE_CONFIG_TEMPLATE: Gvr =
    Gvr::from_static(BOOTSTRAP_GROUP, "v1alpha1", "ocneconfigtemplates");
/// `clusterresourcesets.addons.cluster.x-k8s.io`
pub const CLUSTER_RESOURCE_SET: Gvr =
    Gvr::from_static(ADDONS_GROUP, "v1beta1", "clusterresourcesets");
/// Core `configmaps`
pub const CONFIG_MAP: Gvr = Gvr::from_static("", "v1", "configmaps");
/// Core `secrets`
pub const SECRET: Gvr = Gvr::from_static("", "v1", "secrets");
/// `deployments.apps`
pub const DEPLOYMENT: Gvr = Gvr::from_static("apps", "v1", "deployments");
/// `verrazzanos.install.verrazzano.io`
pub const VERRAZZANO: Gvr = Gvr::from_static("install.verrazzano.io", "v1beta1", "verrazzanos");
/// `verrazzanomanagedclusters.clusters.verrazzano.io`
pub const VERRAZZANO_MANAGED_CLUSTER: Gvr =
    Gvr::from_static("clusters.verrazzano.io", "v1alpha1", "verrazzanomanagedclusters");
