//! Driver configuration file
//!
//! A single YAML file describes the cluster, answers the cloud lookups and
//! optionally tunes readiness timing:
//!
//! ```yaml
//! cluster:
//!   name: prod
//!   namespace: prod
//!   kubernetesVersion: v1.26.6
//!   rawNodePools:
//!     - '{"name":"np-1","replicas":3}'
//! cloud:
//!   images:
//!     Oracle-Linux-8.8: ocid1.image.oc1..aaa
//! readiness:
//!   pollIntervalSecs: 30
//!   timeoutSecs: 3600
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capi::ReadinessConfig;
use crate::cloud::StaticCloudLookup;
use crate::variables::Variables;
use crate::Error;

/// Readiness timing in whole seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReadinessSettings {
    /// Seconds between polls
    pub poll_interval_secs: u64,
    /// Seconds before giving up
    pub timeout_secs: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: ReadinessConfig::CLUSTER.poll_interval.as_secs(),
            timeout_secs: ReadinessConfig::CLUSTER.timeout.as_secs(),
        }
    }
}

impl From<ReadinessSettings> for ReadinessConfig {
    fn from(settings: ReadinessSettings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// Everything the CLI reads from `--config`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DriverConfig {
    /// Cluster configuration as supplied by the user
    pub cluster: Variables,
    /// Static answers for image and subnet lookups
    pub cloud: StaticCloudLookup,
    /// Cluster readiness timing
    pub readiness: ReadinessSettings,
    /// Admin cluster kubeconfig; the kube-rs defaults apply when unset
    pub kubeconfig: Option<PathBuf>,
}

impl DriverConfig {
    /// Parse from YAML text and validate the cluster section
    pub fn from_yaml(content: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::serialization_for_kind("DriverConfig", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::serialization_for_kind("DriverConfig", format!("{}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<(), Error> {
        self.cluster.validate()?;
        if self.readiness.poll_interval_secs == 0 {
            return Err(Error::validation_for_field(
                &self.cluster.name,
                "readiness.pollIntervalSecs",
                "poll interval must be at least one second",
            ));
        }
        if self.readiness.timeout_secs < self.readiness.poll_interval_secs {
            return Err(Error::validation_for_field(
                &self.cluster.name,
                "readiness.timeoutSecs",
                "timeout must not be shorter than the poll interval",
            ));
        }
        Ok(())
    }

    /// Readiness timing for cluster waits
    pub fn readiness(&self) -> ReadinessConfig {
        self.readiness.into()
    }

    /// Cluster configuration with node pools parsed and cloud values resolved
    pub async fn resolved_cluster(&self) -> Result<Variables, Error> {
        let mut vars = self.cluster.clone();
        vars.populate(&self.cloud).await?;
        Ok(vars)
    }
}
