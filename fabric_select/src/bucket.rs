/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Partitioning NICs into hardware-affinity buckets and picking the bucket
//! that applies to the calling process.
//!
//! Buckets are rebuilt from a fresh enumeration on every resolution call and
//! discarded at its end. Under [`BucketPolicy::Numa`] the affinity-domain id
//! of a NIC's PCI device is used directly as its bucket index, and the
//! calling thread's current domain picks the bucket to draw from.

use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::discovery::NicDescriptor;
use crate::resolver::ResolveError;
use crate::topology::Topology;
use crate::topology::TopologyError;

/// Strategy for partitioning discovered NICs into buckets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketPolicy {
    /// One global bucket holding every usable NIC.
    All,
    /// One bucket per affinity domain, indexed by domain id.
    Numa,
}

impl FromStr for BucketPolicy {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "numa" => Ok(Self::Numa),
            other => Err(ResolveError::Config(other.to_string())),
        }
    }
}

/// The NICs assigned to one affinity domain (or the single global set).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    /// Append order follows enumeration order, so every cooperating process
    /// on the node sees the same index for the same NIC.
    pub nics: Vec<NicDescriptor>,
}

/// Partitions `nics` into buckets under `policy`.
///
/// NICs without PCI bus-location data are skipped outright; a NIC whose
/// device the topology cannot place is fatal (no partial bucket set is
/// returned). Every bucket must end up non-empty.
pub fn build_buckets<T: Topology>(
    nics: Vec<NicDescriptor>,
    policy: BucketPolicy,
    topology: &T,
) -> Result<Vec<Bucket>, ResolveError> {
    let nbuckets = match policy {
        BucketPolicy::All => 1,
        BucketPolicy::Numa => topology.domain_count()?,
    };
    let mut buckets: Vec<Bucket> = (0..nbuckets).map(|_| Bucket::default()).collect();

    for nic in nics {
        let Some(pci) = nic.pci else {
            // Interfaces without bus-location data cannot be placed; they are
            // excluded from every bucket rather than treated as an error.
            tracing::debug!(nic = %nic.name, "skipping interface without bus-location data");
            continue;
        };
        let index = match policy {
            BucketPolicy::All => 0,
            BucketPolicy::Numa => topology.device_domain(&pci)?,
        };
        if index >= nbuckets {
            return Err(TopologyError::DomainOutOfRange {
                domain: index,
                domains: nbuckets,
            }
            .into());
        }
        buckets[index].nics.push(nic);
    }

    for (index, bucket) in buckets.iter().enumerate() {
        if bucket.nics.is_empty() {
            return Err(ResolveError::EmptyBucket(index));
        }
    }

    Ok(buckets)
}

/// Picks the bucket the calling process should draw from.
///
/// Takes the same policy value that built `buckets`, so builder and selector
/// cannot disagree. Under [`BucketPolicy::Numa`] the thread's execution
/// binding is queried now, not reused from any earlier call.
pub fn select_bucket<T: Topology>(
    policy: BucketPolicy,
    buckets: &[Bucket],
    topology: &T,
) -> Result<usize, ResolveError> {
    match policy {
        BucketPolicy::All => Ok(0),
        BucketPolicy::Numa => {
            let domain = topology.current_domain()?;
            if domain >= buckets.len() {
                return Err(TopologyError::DomainOutOfRange {
                    domain,
                    domains: buckets.len(),
                }
                .into());
            }
            Ok(domain)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTopology;
    use crate::test_support::nic;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("all".parse::<BucketPolicy>().unwrap(), BucketPolicy::All);
        assert_eq!("numa".parse::<BucketPolicy>().unwrap(), BucketPolicy::Numa);
        assert!(matches!(
            "hybrid".parse::<BucketPolicy>(),
            Err(ResolveError::Config(s)) if s == "hybrid"
        ));
    }

    #[test]
    fn test_all_policy_single_bucket() {
        let topo = FakeTopology::new(2, 0);
        let nics = vec![
            nic("cxi0", Some("0000:3b:00.0")),
            nic("cxi1", Some("0000:5e:00.0")),
            nic("cxi2", None),
        ];

        let buckets = build_buckets(nics, BucketPolicy::All, &topo).unwrap();
        assert_eq!(buckets.len(), 1);
        // The NIC without bus data is silently excluded.
        let names: Vec<&str> = buckets[0].nics.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["cxi0", "cxi1"]);
    }

    #[test]
    fn test_numa_policy_buckets_by_domain() {
        let topo = FakeTopology::new(2, 0)
            .with_device("0000:3b:00.0", 0)
            .with_device("0000:5e:00.0", 1)
            .with_device("0000:5f:00.0", 1);
        let nics = vec![
            nic("cxi0", Some("0000:3b:00.0")),
            nic("cxi1", Some("0000:5e:00.0")),
            nic("cxi2", Some("0000:5f:00.0")),
        ];

        let buckets = build_buckets(nics, BucketPolicy::Numa, &topo).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].nics[0].name, "cxi0");
        let names: Vec<&str> = buckets[1].nics.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["cxi1", "cxi2"]);
    }

    #[test]
    fn test_unplaceable_device_is_fatal() {
        let topo = FakeTopology::new(2, 0).with_device("0000:3b:00.0", 0);
        let nics = vec![
            nic("cxi0", Some("0000:3b:00.0")),
            nic("cxi1", Some("0000:5e:00.0")),
        ];

        assert!(matches!(
            build_buckets(nics, BucketPolicy::Numa, &topo),
            Err(ResolveError::Topology(TopologyError::UnknownDevice(_)))
        ));
    }

    #[test]
    fn test_empty_bucket_names_offender() {
        let topo = FakeTopology::new(2, 0).with_device("0000:3b:00.0", 0);
        let nics = vec![nic("cxi0", Some("0000:3b:00.0"))];

        // Domain 1 has no NICs.
        assert!(matches!(
            build_buckets(nics, BucketPolicy::Numa, &topo),
            Err(ResolveError::EmptyBucket(1))
        ));
    }

    #[test]
    fn test_no_usable_nics_at_all() {
        let topo = FakeTopology::new(1, 0);
        assert!(matches!(
            build_buckets(vec![nic("cxi0", None)], BucketPolicy::All, &topo),
            Err(ResolveError::EmptyBucket(0))
        ));
    }

    #[test]
    fn test_select_bucket() {
        let topo = FakeTopology::new(2, 1)
            .with_device("0000:3b:00.0", 0)
            .with_device("0000:5e:00.0", 1);
        let nics = vec![
            nic("cxi0", Some("0000:3b:00.0")),
            nic("cxi1", Some("0000:5e:00.0")),
        ];
        let buckets = build_buckets(nics, BucketPolicy::Numa, &topo).unwrap();

        assert_eq!(select_bucket(BucketPolicy::All, &buckets, &topo).unwrap(), 0);
        // The thread currently executes in domain 1.
        assert_eq!(
            select_bucket(BucketPolicy::Numa, &buckets, &topo).unwrap(),
            1
        );
    }
}
