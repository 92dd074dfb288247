/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Policy-driven choice of one NIC inside the selected bucket.

use std::str::FromStr;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Deserialize;
use serde::Serialize;

use crate::bucket::Bucket;
use crate::resolver::ResolveError;
use crate::rotation::CounterLock;
use crate::rotation::CounterStore;

/// Strategy for choosing a NIC within a bucket.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NicPolicy {
    /// Cross-process rotation through the bucket, arbitrated by the
    /// persistent counter store. Fair over the long run on one node.
    RoundRobin,
    /// Uniform draw seeded from the process id. No shared state and no
    /// fairness guarantee; only meant to keep simultaneously-launched
    /// processes from piling onto one NIC. Not cryptographically secure.
    Random,
}

impl FromStr for NicPolicy {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roundrobin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            other => Err(ResolveError::Config(other.to_string())),
        }
    }
}

/// Picks one NIC from `bucket` and returns its name.
///
/// A single-NIC bucket short-circuits before any policy logic or I/O runs,
/// so it never touches (or even creates) the bucket's counter file.
pub(crate) fn select_nic<'a, L: CounterLock>(
    bucket_index: usize,
    bucket: &'a Bucket,
    policy: NicPolicy,
    counters: &CounterStore<L>,
) -> Result<&'a str, ResolveError> {
    if let [only] = bucket.nics.as_slice() {
        return Ok(&only.name);
    }

    let index = match policy {
        NicPolicy::RoundRobin => counters
            .next_index(bucket_index, bucket.nics.len())
            .map_err(ResolveError::Io)?,
        NicPolicy::Random => {
            // Seeding uniqueness only matters within one node, so the pid is
            // enough.
            let mut rng = SmallRng::seed_from_u64(std::process::id() as u64);
            rng.gen_range(0..bucket.nics.len())
        }
    };

    Ok(&bucket.nics[index].name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::nic;

    fn bucket(names: &[&str]) -> Bucket {
        Bucket {
            nics: names.iter().map(|n| nic(n, None)).collect(),
        }
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "roundrobin".parse::<NicPolicy>().unwrap(),
            NicPolicy::RoundRobin
        );
        assert_eq!("random".parse::<NicPolicy>().unwrap(), NicPolicy::Random);
        assert!(matches!(
            "fastest".parse::<NicPolicy>(),
            Err(ResolveError::Config(s)) if s == "fastest"
        ));
    }

    #[test]
    fn test_single_nic_shortcut_skips_counter() {
        let tmp = tempfile::tempdir().unwrap();
        let counters = CounterStore::new(tmp.path(), "testuser");
        let bucket = bucket(&["cxi0"]);

        for _ in 0..3 {
            let name = select_nic(0, &bucket, NicPolicy::RoundRobin, &counters).unwrap();
            assert_eq!(name, "cxi0");
        }
        assert!(!counters.counter_path(0).exists());
    }

    #[test]
    fn test_roundrobin_cycles_through_bucket() {
        let tmp = tempfile::tempdir().unwrap();
        let counters = CounterStore::new(tmp.path(), "testuser");
        let bucket = bucket(&["cxi0", "cxi1", "cxi2"]);

        let picks: Vec<&str> = (0..4)
            .map(|_| select_nic(0, &bucket, NicPolicy::RoundRobin, &counters).unwrap())
            .collect();
        assert_eq!(picks, vec!["cxi0", "cxi1", "cxi2", "cxi0"]);
    }

    #[test]
    fn test_random_stays_in_bucket() {
        let tmp = tempfile::tempdir().unwrap();
        let counters = CounterStore::new(tmp.path(), "testuser");
        let bucket = bucket(&["cxi0", "cxi1", "cxi2", "cxi3"]);

        for _ in 0..20 {
            let name = select_nic(0, &bucket, NicPolicy::Random, &counters).unwrap();
            assert!(bucket.nics.iter().any(|n| n.name == name));
        }
        // Random never touches rotation state.
        assert!(!counters.counter_path(0).exists());
    }
}
