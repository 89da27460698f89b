//! Node pool garbage collection
//!
//! Node pools are an open-ended, user-named list, so removing or renaming one
//! cannot be expressed by re-applying manifests. After workers are
//! reconciled, every MachineDeployment in the cluster namespace whose name is
//! no longer a desired pool is deleted together with the machine template it
//! references.

use std::collections::BTreeSet;

use tracing::{info, warn};

use super::client::ResourceClient;
use super::reconcile::delete_if_exists;
use crate::object::gvr;
use crate::Error;

/// Path from a MachineDeployment to its infrastructure template name
pub const INFRASTRUCTURE_REF_NAME: [&str; 5] =
    ["spec", "template", "spec", "infrastructureRef", "name"];

/// Delete MachineDeployments (and their templates) not in `desired`
///
/// Returns the names of the deployments removed, in listing order.
pub async fn delete_orphaned_node_pools(
    client: &dyn ResourceClient,
    namespace: &str,
    desired: &BTreeSet<&str>,
) -> Result<Vec<String>, Error> {
    let deployments = client
        .list(&gvr::MACHINE_DEPLOYMENT, namespace, "")
        .await
        .map_err(|source| Error::List {
            resource: gvr::MACHINE_DEPLOYMENT,
            source,
        })?;

    let mut removed = Vec::new();
    for deployment in deployments
        .iter()
        .filter(|md| !desired.contains(md.name()))
    {
        let name = deployment.name();
        info!(namespace, node_pool = %name, "Deleting orphaned node pool");
        delete_if_exists(client, &gvr::MACHINE_DEPLOYMENT, namespace, name).await?;

        match deployment.str_field(&INFRASTRUCTURE_REF_NAME) {
            Ok(template) => {
                delete_if_exists(client, &gvr::OCI_MACHINE_TEMPLATE, namespace, template).await?;
            }
            Err(e) => warn!(node_pool = %name, error = %e, "No machine template to delete"),
        }
        removed.push(name.to_string());
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capi::client::testing::InMemoryClient;
    use crate::capi::client::{ApiError, MockResourceClient};
    use crate::object::Document;
    use serde_json::json;

    fn deployment(name: &str) -> Document {
        Document::from_value(json!({
            "apiVersion": "cluster.x-k8s.io/v1beta1",
            "kind": "MachineDeployment",
            "metadata": {"name": name, "namespace": "prod"},
            "spec": {"template": {"spec": {"infrastructureRef": {"name": format!("{name}-template")}}}},
        }))
        .unwrap()
    }

    fn template(name: &str) -> Document {
        Document::from_value(json!({
            "kind": "OCIMachineTemplate",
            "metadata": {"name": format!("{name}-template"), "namespace": "prod"},
        }))
        .unwrap()
    }

    fn seeded(pools: &[&str]) -> InMemoryClient {
        let client = InMemoryClient::new();
        for pool in pools {
            client.insert(&gvr::MACHINE_DEPLOYMENT, deployment(pool));
            client.insert(&gvr::OCI_MACHINE_TEMPLATE, template(pool));
        }
        client
    }

    #[tokio::test]
    async fn only_undeclared_pools_and_their_templates_are_deleted() {
        let client = seeded(&["np-1", "np-2", "np-3"]);
        let desired = BTreeSet::from(["np-1", "np-2"]);

        let removed = delete_orphaned_node_pools(&client, "prod", &desired)
            .await
            .unwrap();

        assert_eq!(removed, vec!["np-3"]);
        assert!(client.stored(&gvr::MACHINE_DEPLOYMENT, "prod", "np-3").is_none());
        assert!(client
            .stored(&gvr::OCI_MACHINE_TEMPLATE, "prod", "np-3-template")
            .is_none());
        assert!(client.stored(&gvr::MACHINE_DEPLOYMENT, "prod", "np-1").is_some());
        assert!(client
            .stored(&gvr::OCI_MACHINE_TEMPLATE, "prod", "np-2-template")
            .is_some());
        assert_eq!(client.len(), 4);
    }

    #[tokio::test]
    async fn nothing_is_deleted_when_all_pools_are_declared() {
        let client = seeded(&["np-1"]);
        let removed = delete_orphaned_node_pools(&client, "prod", &BTreeSet::from(["np-1"]))
            .await
            .unwrap();
        assert!(removed.is_empty());
        assert!(client.writes().is_empty());
    }

    #[tokio::test]
    async fn already_deleted_template_is_not_an_error() {
        let client = InMemoryClient::new();
        client.insert(&gvr::MACHINE_DEPLOYMENT, deployment("np-old"));

        let removed = delete_orphaned_node_pools(&client, "prod", &BTreeSet::new())
            .await
            .unwrap();

        assert_eq!(removed, vec!["np-old"]);
        assert_eq!(client.len(), 0);
    }

    #[tokio::test]
    async fn list_failure_aborts() {
        let mut client = MockResourceClient::new();
        client
            .expect_list()
            .returning(|_, _, _| Err(ApiError::Other("forbidden".to_string())));
        client.expect_delete().never();

        let err = delete_orphaned_node_pools(&client, "prod", &BTreeSet::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::List { .. }));
    }
}
