//! Verrazzano install, registration and removal
//!
//! The platform operator is delivered as an add-on. Once its deployment has
//! rolled out on the workload cluster the Verrazzano resource is applied
//! there, and the cluster is registered on the admin cluster with a
//! VerrazzanoManagedCluster.

use serde_json::Value;
use tracing::{debug, info};

use super::client::{ApiError, ResourceClient};
use super::ready::{Readiness, ReadinessConfig};
use super::reconcile::{delete_if_exists, Descriptor, Reconciler};
use crate::catalog;
use crate::object::{gvr, Document, FieldError};
use crate::template::TemplateEngine;
use crate::variables::Variables;
use crate::Error;

/// Namespace of the platform operator on the workload cluster
pub const INSTALL_NAMESPACE: &str = "verrazzano-install";
/// Platform operator deployment name
pub const PLATFORM_OPERATOR: &str = "verrazzano-platform-operator";
/// Namespace of managed cluster registrations on the admin cluster
pub const MULTICLUSTER_NAMESPACE: &str = "verrazzano-mc";

/// Outcome of a removal request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// Nothing left to delete
    Gone,
    /// Deletion was requested and is still being processed
    InProgress,
}

/// Bump `spec.version` when the installed version differs from `version`
///
/// Objects without `status.version` are left alone, so a fresh install is
/// never forced to a version.
pub fn version_adjuster(version: &str) -> impl Fn(&mut Document) -> Result<(), FieldError> + Send + Sync + '_ {
    move |doc: &mut Document| {
        let Ok(installed) = doc.str_field(&["status", "version"]) else {
            return Ok(());
        };
        if installed == version {
            return Ok(());
        }
        doc.set_field(&["spec", "version"], Value::String(version.to_string()))
    }
}

fn verrazzano_descriptor(vars: &Variables) -> Descriptor {
    Descriptor::inline("verrazzano", vars.verrazzano_resource.clone()).with_resource(gvr::VERRAZZANO)
}

/// Verrazzano operations spanning the admin and workload clusters
pub struct Verrazzano<'a> {
    admin: &'a dyn ResourceClient,
    workload: &'a dyn ResourceClient,
    engine: &'a TemplateEngine,
    readiness: ReadinessConfig,
}

impl<'a> Verrazzano<'a> {
    /// Create with the deployment wait defaults
    pub fn new(
        admin: &'a dyn ResourceClient,
        workload: &'a dyn ResourceClient,
        engine: &'a TemplateEngine,
    ) -> Self {
        Self {
            admin,
            workload,
            engine,
            readiness: ReadinessConfig::DEPLOYMENT,
        }
    }

    /// Override the platform operator wait
    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    /// Install or upgrade Verrazzano and register the cluster
    ///
    /// Does nothing unless Verrazzano is enabled with a resource template.
    /// A missing VerrazzanoManagedCluster API on the admin cluster is
    /// tolerated.
    pub async fn install_and_register(&self, vars: &Variables) -> Result<(), Error> {
        if !vars.install_verrazzano || vars.verrazzano_resource.is_empty() {
            return Ok(());
        }

        Readiness::new(self.workload)
            .with_config(self.readiness)
            .wait_for_deployment(PLATFORM_OPERATOR, INSTALL_NAMESPACE)
            .await?;

        Reconciler::new(self.workload, self.engine)
            .reconcile_with(
                &verrazzano_descriptor(vars),
                vars,
                version_adjuster(&vars.verrazzano_version),
            )
            .await?;
        info!(cluster = %vars.name, version = %vars.verrazzano_version, "Verrazzano applied");

        match Reconciler::new(self.admin, self.engine)
            .reconcile(&catalog::verrazzano_managed_cluster(), vars)
            .await
        {
            Ok(_) => info!(cluster = %vars.name, "Registered managed cluster"),
            Err(Error::Fetch {
                source: ApiError::NotFound,
                ..
            })
            | Err(Error::Create {
                source: ApiError::NotFound,
                ..
            }) => debug!(cluster = %vars.name, "Managed cluster API not installed, skipping registration"),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Remove the registration and the Verrazzano resource
    ///
    /// Returns [`Removal::InProgress`] while the workload cluster is still
    /// tearing Verrazzano down; callers re-run until [`Removal::Gone`].
    pub async fn delete_resources(&self, vars: &Variables) -> Result<Removal, Error> {
        if !vars.install_verrazzano && !vars.uninstall_verrazzano {
            return Ok(Removal::Gone);
        }

        delete_if_exists(
            self.admin,
            &gvr::VERRAZZANO_MANAGED_CLUSTER,
            MULTICLUSTER_NAMESPACE,
            &vars.name,
        )
        .await?;

        let docs = Reconciler::new(self.workload, self.engine).render(&verrazzano_descriptor(vars), vars)?;
        let [vz] = docs.as_slice() else {
            return Err(Error::validation_for_field(
                &vars.name,
                "verrazzanoResource",
                format!("expected 1 Verrazzano resource from template, got {}", docs.len()),
            ));
        };

        if delete_if_exists(self.workload, &gvr::VERRAZZANO, vz.namespace(), vz.name()).await? {
            info!(cluster = %vars.name, "Deleting Verrazzano resource");
            Ok(Removal::InProgress)
        } else {
            Ok(Removal::Gone)
        }
    }
}
