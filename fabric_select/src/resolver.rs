/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The resolution engine tying the stages together: enumerate, bucket,
//! select a bucket, select a NIC, compose the address.

use std::io;

use crate::address;
use crate::bucket;
use crate::bucket::BucketPolicy;
use crate::config::Config;
use crate::discovery::FabricEnumerator;
use crate::discovery::SysfsEnumerator;
use crate::rotation::CounterLock;
use crate::rotation::CounterStore;
use crate::rotation::Flock;
use crate::selection;
use crate::selection::NicPolicy;
use crate::topology::SysfsTopology;
use crate::topology::Topology;
use crate::topology::TopologyError;

/// The type of error that can occur while resolving a wildcard address.
///
/// Any of these aborts the whole resolution; there is no partial result and
/// no automatic retry. Pass-through of an ineligible address is success, so
/// it never appears here.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    /// A policy string was not recognized.
    #[error("unknown policy {0:?}")]
    Config(String),

    /// A topology query failed or a device could not be placed.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// A bucket ended up with zero NICs after partitioning.
    #[error("bucket {0} has no NICs")]
    EmptyBucket(usize),

    /// Fabric interface enumeration failed.
    #[error("fabric enumeration: {0}")]
    Enumeration(#[source] io::Error),

    /// Rotation-state directory, file, or lock manipulation failed.
    #[error("rotation state: {0}")]
    Io(#[source] io::Error),
}

/// Resolves wildcard fabric addresses to a specific NIC.
///
/// Holds only the collaborators and configuration; every `resolve` call
/// enumerates and buckets from scratch so that hot-plugged interfaces and
/// scheduler migration are reflected, and drops all of it before returning.
#[derive(Debug)]
pub struct Resolver<T = SysfsTopology, E = SysfsEnumerator, L = Flock> {
    topology: T,
    enumerator: E,
    counters: CounterStore<L>,
}

impl Resolver {
    /// Production resolver: sysfs topology and enumeration, OS advisory
    /// locking for rotation state.
    pub fn new(config: &Config) -> Self {
        Self {
            topology: SysfsTopology::new(&config.sysfs_root),
            enumerator: SysfsEnumerator::new(&config.class_dir),
            counters: CounterStore::new(&config.scratch_root, &config.user),
        }
    }
}

impl<T: Topology, E: FabricEnumerator, L: CounterLock> Resolver<T, E, L> {
    /// Assembles a resolver from explicit collaborators.
    pub fn with_parts(topology: T, enumerator: E, counters: CounterStore<L>) -> Self {
        Self {
            topology,
            enumerator,
            counters,
        }
    }

    /// Resolves `address` to a NIC-specific address.
    ///
    /// Addresses that do not name the supported transport, or that are
    /// already bound to an interface, are returned unchanged. One `policy`
    /// value drives both bucket construction and bucket choice, so the two
    /// stages cannot be configured against each other.
    pub fn resolve(
        &self,
        address: &str,
        bucket_policy: BucketPolicy,
        nic_policy: NicPolicy,
    ) -> Result<String, ResolveError> {
        if !address::is_unresolved_fabric(address) {
            return Ok(address.to_string());
        }

        let nics = self
            .enumerator
            .enumerate()
            .map_err(ResolveError::Enumeration)?;
        let buckets = bucket::build_buckets(nics, bucket_policy, &self.topology)?;
        let index = bucket::select_bucket(bucket_policy, &buckets, &self.topology)?;
        let nic = selection::select_nic(index, &buckets[index], nic_policy, &self.counters)?;

        tracing::debug!(nic, bucket = index, "resolved wildcard fabric address");
        Ok(address::compose(address, nic))
    }
}

/// One-call convenience surface over [`Resolver`] with production defaults.
///
/// Policy strings are validated before anything else runs, so an
/// unrecognized policy is reported even for addresses that would pass
/// through, and never mutates persistent state.
pub fn resolve_nic(
    address: &str,
    bucket_policy: &str,
    nic_policy: &str,
) -> Result<String, ResolveError> {
    let bucket_policy: BucketPolicy = bucket_policy.parse()?;
    let nic_policy: NicPolicy = nic_policy.parse()?;
    Resolver::new(&Config::default()).resolve(address, bucket_policy, nic_policy)
}
