//! Version defaults published on the admin cluster
//!
//! The `ocne-metadata` ConfigMap maps each supported Kubernetes version to
//! an OCNE release and its container image tags. The newest Kubernetes
//! version wins. The Verrazzano version comes from the keys of
//! `verrazzano-meta`. Missing ConfigMaps mean no defaults, not an error.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::client::{ApiError, ResourceClient};
use crate::object::gvr;
use crate::variables::CAPI_OCI_NAMESPACE;
use crate::Error;

/// ConfigMap holding the Kubernetes version mapping
pub const OCNE_METADATA: &str = "ocne-metadata";
/// ConfigMap listing the Verrazzano versions
pub const VERRAZZANO_METADATA: &str = "verrazzano-meta";
/// Namespace of [`VERRAZZANO_METADATA`]
pub const VERRAZZANO_METADATA_NAMESPACE: &str = "verrazzano-install";

const MAPPING_KEY: &str = "mapping";
const VERRAZZANO_VERSIONS_KEY: &str = "verrazzano-versions";

/// Image tags shipped with an OCNE release
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerImages {
    /// Calico image tag
    pub calico: String,
    /// CoreDNS image tag
    pub coredns: String,
    /// etcd image tag
    pub etcd: String,
    /// Tigera operator image tag
    #[serde(rename = "tigera-operator")]
    pub tigera_operator: String,
}

/// One entry of the version mapping
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseDefaults {
    /// OCNE release
    #[serde(rename = "Release")]
    pub release: String,
    /// Image tags for the release
    #[serde(rename = "container-images")]
    pub container_images: ContainerImages,
}

/// Defaults resolved from the admin cluster
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionDefaults {
    /// Newest Kubernetes version in the mapping
    pub kubernetes_version: String,
    /// Release and images for that version
    pub release: ReleaseDefaults,
    /// Verrazzano version, empty when unknown
    pub verrazzano_version: String,
}

async fn get_config_map(
    client: &dyn ResourceClient,
    namespace: &str,
    name: &str,
) -> Result<Option<ConfigMap>, Error> {
    let doc = match client.get(&gvr::CONFIG_MAP, namespace, name).await {
        Ok(doc) => doc,
        Err(ApiError::NotFound) => return Ok(None),
        Err(source) => {
            return Err(Error::Fetch {
                resource: gvr::CONFIG_MAP,
                name: name.to_string(),
                source,
            })
        }
    };
    serde_json::from_value(doc.into_value())
        .map(Some)
        .map_err(|e| Error::serialization_for_kind("ConfigMap", format!("{namespace}/{name}: {e}")))
}

fn data_value(config_map: &ConfigMap, key: &str) -> Option<String> {
    config_map
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .filter(|value| !value.is_empty())
        .cloned()
}

/// Pick the newest Kubernetes version from a mapping document
///
/// Versions compare as strings. Returns `None` for an empty mapping.
pub fn newest_release(mapping: &str) -> Result<Option<(String, ReleaseDefaults)>, Error> {
    let versions: BTreeMap<String, ReleaseDefaults> = serde_yaml::from_str(mapping)
        .map_err(|e| Error::serialization_for_kind("ConfigMap", format!("{OCNE_METADATA}: {e}")))?;
    Ok(versions.into_iter().next_back())
}

/// Pick the Verrazzano version from the JSON version listing
///
/// The listing is an object keyed by version; the lowest key is used.
pub fn verrazzano_version(listing: &str) -> Result<String, Error> {
    let versions: BTreeMap<String, String> = serde_json::from_str(listing).map_err(|e| {
        Error::serialization_for_kind("ConfigMap", format!("{VERRAZZANO_METADATA}: {e}"))
    })?;
    Ok(versions.into_keys().next().unwrap_or_default())
}

/// Read version defaults from the admin cluster
///
/// Returns `None` when no version mapping is published.
pub async fn load_version_defaults(
    client: &dyn ResourceClient,
) -> Result<Option<VersionDefaults>, Error> {
    let Some(metadata) = get_config_map(client, CAPI_OCI_NAMESPACE, OCNE_METADATA).await? else {
        return Ok(None);
    };
    let Some(mapping) = data_value(&metadata, MAPPING_KEY) else {
        return Ok(None);
    };
    let Some((kubernetes_version, release)) = newest_release(&mapping)? else {
        return Ok(None);
    };

    let verrazzano_version =
        match get_config_map(client, VERRAZZANO_METADATA_NAMESPACE, VERRAZZANO_METADATA).await? {
            Some(meta) => match data_value(&meta, VERRAZZANO_VERSIONS_KEY) {
                Some(listing) => verrazzano_version(&listing)?,
                None => String::new(),
            },
            None => String::new(),
        };

    info!(
        kubernetes_version = %kubernetes_version,
        release = %release.release,
        verrazzano_version = %verrazzano_version,
        "Loaded version defaults"
    );
    Ok(Some(VersionDefaults {
        kubernetes_version,
        release,
        verrazzano_version,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capi::client::testing::InMemoryClient;
    use crate::capi::client::MockResourceClient;
    use crate::object::Document;
    use serde_json::json;

    const MAPPING: &str = r#"v1.24.8:
  Release: "1.5"
  container-images:
    calico: v3.25.0
    coredns: 1.8.6
    etcd: 3.5.3
    tigera-operator: v1.29.0
v1.25.7:
  Release: "1.6"
  container-images:
    calico: v3.25.0
    coredns: v1.9.3
    etcd: 3.5.6
    tigera-operator: v1.29.0
"#;

    fn config_map(namespace: &str, name: &str, key: &str, value: &str) -> Document {
        Document::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": namespace},
            "data": {key: value},
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn newest_kubernetes_version_supplies_the_defaults() {
        let client = InMemoryClient::new();
        client.insert(
            &gvr::CONFIG_MAP,
            config_map(CAPI_OCI_NAMESPACE, OCNE_METADATA, MAPPING_KEY, MAPPING),
        );
        client.insert(
            &gvr::CONFIG_MAP,
            config_map(
                VERRAZZANO_METADATA_NAMESPACE,
                VERRAZZANO_METADATA,
                VERRAZZANO_VERSIONS_KEY,
                r#"{"v1.6.2": "a", "v1.5.4": "b"}"#,
            ),
        );

        let defaults = load_version_defaults(&client).await.unwrap().unwrap();
        assert_eq!(defaults.kubernetes_version, "v1.25.7");
        assert_eq!(defaults.release.release, "1.6");
        assert_eq!(defaults.release.container_images.coredns, "v1.9.3");
        assert_eq!(defaults.release.container_images.etcd, "3.5.6");
        assert_eq!(defaults.release.container_images.tigera_operator, "v1.29.0");
        assert_eq!(defaults.verrazzano_version, "v1.5.4");
    }

    #[tokio::test]
    async fn missing_verrazzano_metadata_leaves_its_version_empty() {
        let client = InMemoryClient::new();
        client.insert(
            &gvr::CONFIG_MAP,
            config_map(CAPI_OCI_NAMESPACE, OCNE_METADATA, MAPPING_KEY, MAPPING),
        );

        let defaults = load_version_defaults(&client).await.unwrap().unwrap();
        assert_eq!(defaults.kubernetes_version, "v1.25.7");
        assert!(defaults.verrazzano_version.is_empty());
    }

    #[tokio::test]
    async fn no_published_mapping_means_no_defaults() {
        let client = InMemoryClient::new();
        assert_eq!(load_version_defaults(&client).await.unwrap(), None);

        client.insert(
            &gvr::CONFIG_MAP,
            config_map(CAPI_OCI_NAMESPACE, OCNE_METADATA, MAPPING_KEY, ""),
        );
        assert_eq!(load_version_defaults(&client).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreadable_mapping_is_an_error() {
        let mut client = MockResourceClient::new();
        client
            .expect_get()
            .returning(|_, _, _| Err(ApiError::Other("forbidden".to_string())));

        let err = load_version_defaults(&client).await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }

    #[test]
    fn malformed_mapping_is_a_serialization_error() {
        let err = newest_release("v1.25.7: [").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }
}
