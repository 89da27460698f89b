//! Cloud lookups used while populating cluster configuration
//!
//! Only two questions are asked of the cloud: "what is this subnet" and
//! "which image has this display name". Both are answered once, before any
//! template is rendered.

use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Whether instances in a subnet may receive public IPs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetAccess {
    /// Public IPs allowed on VNICs
    Public,
    /// Public IPs prohibited on VNICs
    Private,
}

/// Subnet metadata returned by the cloud
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSubnet {
    /// CIDR block of the subnet
    pub cidr_block: String,
    /// True when public IPs are prohibited on VNICs in this subnet
    #[serde(default)]
    pub prohibit_public_ip_on_vnic: bool,
}

impl CloudSubnet {
    /// Public/private classification
    pub fn access(&self) -> SubnetAccess {
        if self.prohibit_public_ip_on_vnic {
            SubnetAccess::Private
        } else {
            SubnetAccess::Public
        }
    }
}

/// Cloud lookup capability
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CloudLookup: Send + Sync {
    /// Resolve subnet metadata by identifier
    async fn subnet_by_id(&self, subnet_id: &str) -> Result<CloudSubnet, Error>;

    /// Resolve an image identifier by display name within a compartment
    async fn image_id_by_name(&self, display_name: &str, compartment_id: &str)
        -> Result<String, Error>;
}

/// Lookup answered from tables in the config file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCloudLookup {
    /// Image display name to image id
    #[serde(default)]
    pub images: BTreeMap<String, String>,
    /// Subnet id to subnet metadata
    #[serde(default)]
    pub subnets: BTreeMap<String, CloudSubnet>,
}

#[async_trait]
impl CloudLookup for StaticCloudLookup {
    async fn subnet_by_id(&self, subnet_id: &str) -> Result<CloudSubnet, Error> {
        self.subnets
            .get(subnet_id)
            .cloned()
            .ok_or_else(|| Error::cloud(format!("subnet {subnet_id}"), "subnet not found"))
    }

    async fn image_id_by_name(
        &self,
        display_name: &str,
        compartment_id: &str,
    ) -> Result<String, Error> {
        self.images.get(display_name).cloned().ok_or_else(|| {
            Error::cloud(
                format!("image {display_name}"),
                format!("no images found for {compartment_id}/{display_name}"),
            )
        })
    }
}
