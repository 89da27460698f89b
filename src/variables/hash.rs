//! Content hashes used to detect configuration drift
//!
//! Hashes are taken over the JSON encoding of the configuration, whose
//! field order is fixed by the struct definition. Every hash field is
//! cleared before hashing so a previously computed hash never feeds into
//! the next one.

use std::fmt::Write;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{NodePool, Variables};
use crate::Error;

/// Length of every hash, in hex characters
pub const HASH_LEN: usize = 10;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ControlPlaneInputs<'a> {
    kubernetes_version: &'a str,
    ocne_version: &'a str,
    actual_image: &'a str,
    ssh_public_key: &'a str,
    control_plane_shape: &'a str,
    control_plane_replicas: i64,
    control_plane_ocpus: i64,
    control_plane_memory_gbs: i64,
    control_plane_volume_gbs: i64,
    pre_ocne_commands: &'a [String],
    post_ocne_commands: &'a [String],
    skip_ocne_install: bool,
    private_registry: &'a str,
    etcd_image_tag: &'a str,
    core_dns_image_tag: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodePoolInputs<'a> {
    kubernetes_version: &'a str,
    ocne_version: &'a str,
    actual_image: &'a str,
    ssh_public_key: &'a str,
    node_pools: &'a [NodePool],
    pre_ocne_commands: &'a [String],
    post_ocne_commands: &'a [String],
    skip_ocne_install: bool,
    private_registry: &'a str,
}

impl Variables {
    /// Hash over the whole configuration with all hash fields cleared
    pub fn hash_sum(&self) -> Result<String, Error> {
        let mut copy = self.clone();
        copy.hash.clear();
        copy.control_plane_hash.clear();
        copy.node_pool_hash.clear();
        digest(&copy)
    }

    /// Hash over the inputs that roll the control plane
    pub fn control_plane_hash(&self) -> Result<String, Error> {
        digest(&ControlPlaneInputs {
            kubernetes_version: &self.kubernetes_version,
            ocne_version: &self.ocne_version,
            actual_image: &self.actual_image,
            ssh_public_key: &self.ssh_public_key,
            control_plane_shape: &self.control_plane_shape,
            control_plane_replicas: self.control_plane_replicas,
            control_plane_ocpus: self.control_plane_ocpus,
            control_plane_memory_gbs: self.control_plane_memory_gbs,
            control_plane_volume_gbs: self.control_plane_volume_gbs,
            pre_ocne_commands: &self.pre_ocne_commands,
            post_ocne_commands: &self.post_ocne_commands,
            skip_ocne_install: self.skip_ocne_install,
            private_registry: &self.private_registry,
            etcd_image_tag: &self.etcd_image_tag,
            core_dns_image_tag: &self.core_dns_image_tag,
        })
    }

    /// Hash over the inputs that roll worker machines
    pub fn node_pool_hash(&self) -> Result<String, Error> {
        digest(&NodePoolInputs {
            kubernetes_version: &self.kubernetes_version,
            ocne_version: &self.ocne_version,
            actual_image: &self.actual_image,
            ssh_public_key: &self.ssh_public_key,
            node_pools: &self.node_pools,
            pre_ocne_commands: &self.pre_ocne_commands,
            post_ocne_commands: &self.post_ocne_commands,
            skip_ocne_install: self.skip_ocne_install,
            private_registry: &self.private_registry,
        })
    }

    /// Compute and store all three hashes
    pub fn set_hashes(&mut self) -> Result<(), Error> {
        let hash = self.hash_sum()?;
        let control_plane_hash = self.control_plane_hash()?;
        let node_pool_hash = self.node_pool_hash()?;
        self.hash = hash;
        self.control_plane_hash = control_plane_hash;
        self.node_pool_hash = node_pool_hash;
        Ok(())
    }
}

/// Truncated SHA-256 hex digest of a value's JSON encoding
fn digest<T: Serialize>(value: &T) -> Result<String, Error> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| Error::serialization(format!("failed to encode configuration: {e}")))?;
    let sum = Sha256::digest(&bytes);
    let mut hex = sum
        .iter()
        .fold(String::with_capacity(64), |mut s, b| {
            let _ = write!(s, "{:02x}", b);
            s
        });
    hex.truncate(HASH_LEN);
    Ok(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::tests::sample;

    #[test]
    fn equal_configurations_hash_equal() {
        assert_eq!(sample().hash_sum().unwrap(), sample().hash_sum().unwrap());
    }

    #[test]
    fn prior_hash_values_do_not_change_the_hash() {
        let clean = sample();
        let mut stamped = sample();
        stamped.hash = "xyz".to_string();
        stamped.control_plane_hash = "abc".to_string();
        stamped.node_pool_hash = "def".to_string();

        assert_eq!(clean.hash_sum().unwrap(), stamped.hash_sum().unwrap());
    }

    #[test]
    fn set_hashes_is_idempotent() {
        let mut vars = sample();
        vars.set_hashes().unwrap();
        let first = vars.clone();
        vars.set_hashes().unwrap();
        assert_eq!(vars, first);
    }

    #[test]
    fn any_change_alters_the_full_hash() {
        let mut changed = sample();
        changed.control_plane_memory_gbs = 128;
        assert_ne!(sample().hash_sum().unwrap(), changed.hash_sum().unwrap());
    }

    #[test]
    fn subset_hashes_track_only_their_inputs() {
        let base = {
            let mut v = sample();
            v.node_pools = v.parse_node_pools().unwrap();
            v
        };

        let mut more_workers = base.clone();
        more_workers.node_pools[0].replicas = 10;
        assert_eq!(
            base.control_plane_hash().unwrap(),
            more_workers.control_plane_hash().unwrap()
        );
        assert_ne!(base.node_pool_hash().unwrap(), more_workers.node_pool_hash().unwrap());

        let mut bigger_cp = base.clone();
        bigger_cp.control_plane_ocpus = 8;
        assert_ne!(
            base.control_plane_hash().unwrap(),
            bigger_cp.control_plane_hash().unwrap()
        );
        assert_eq!(base.node_pool_hash().unwrap(), bigger_cp.node_pool_hash().unwrap());

        let mut upgrade = base.clone();
        upgrade.kubernetes_version = "v1.27.4".to_string();
        assert_ne!(base.control_plane_hash().unwrap(), upgrade.control_plane_hash().unwrap());
        assert_ne!(base.node_pool_hash().unwrap(), upgrade.node_pool_hash().unwrap());
    }

    #[test]
    fn hashes_have_fixed_length() {
        let mut vars = sample();
        vars.set_hashes().unwrap();
        assert_eq!(vars.hash.len(), HASH_LEN);
        assert_eq!(vars.control_plane_hash.len(), HASH_LEN);
        assert_eq!(vars.node_pool_hash.len(), HASH_LEN);
    }
}
