/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Node hardware topology queries.
//!
//! [`Topology`] is the seam the bucketing stages consult: how many affinity
//! domains (NUMA nodes) the node has, which domain a PCI device belongs to,
//! and which domain the calling thread is executing in right now.
//! [`SysfsTopology`] answers all three from sysfs, with an injectable root so
//! tests can run against a fixture tree.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::discovery::PciAddress;

/// Identifier of one hardware affinity partition (a NUMA node).
pub type AffinityDomainId = usize;

/// Errors raised by topology queries.
#[derive(thiserror::Error, Debug)]
pub enum TopologyError {
    /// The device was enumerated on the fabric but is absent from the node
    /// topology.
    #[error("device {0} not present in topology")]
    UnknownDevice(PciAddress),

    /// Reading the topology description failed.
    #[error("topology load: {0}")]
    Load(#[source] io::Error),

    /// The current CPU of the calling thread could not be determined.
    #[error("cannot determine current cpu")]
    CurrentCpu,

    /// The current CPU is not covered by any affinity domain.
    #[error("cpu {0} not covered by any affinity domain")]
    UnmappedCpu(usize),

    /// An affinity domain id landed outside the constructed bucket range.
    #[error("affinity domain {domain} outside of {domains} known domains")]
    DomainOutOfRange { domain: usize, domains: usize },
}

/// Hardware-affinity queries consulted while bucketing NICs.
pub trait Topology {
    /// Cardinality of the complete affinity-domain set.
    fn domain_count(&self) -> Result<usize, TopologyError>;

    /// The affinity domain a PCI device belongs to. Fails closed if the
    /// device is unknown to the topology.
    fn device_domain(&self, pci: &PciAddress) -> Result<AffinityDomainId, TopologyError>;

    /// The affinity domain of the calling thread's current execution binding.
    ///
    /// Evaluated at call time, never cached: the scheduler may migrate the
    /// thread between calls and the answer should follow it.
    fn current_domain(&self) -> Result<AffinityDomainId, TopologyError>;
}

/// Sysfs-backed [`Topology`].
#[derive(Debug, Clone)]
pub struct SysfsTopology {
    root: PathBuf,
}

impl SysfsTopology {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn node_dir(&self) -> PathBuf {
        self.root.join("devices/system/node")
    }

    /// Sorted NUMA node ids present on this node.
    fn node_ids(&self) -> Result<Vec<usize>, TopologyError> {
        let mut nodes = Vec::new();
        let entries = match fs::read_dir(self.node_dir()) {
            Ok(entries) => entries,
            // Kernels without NUMA support expose no node directory; the
            // machine is then one flat domain.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![0]),
            Err(e) => return Err(TopologyError::Load(e)),
        };
        for entry in entries {
            let entry = entry.map_err(TopologyError::Load)?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name
                .strip_prefix("node")
                .and_then(|s| s.parse::<usize>().ok())
            {
                nodes.push(id);
            }
        }
        nodes.sort_unstable();
        Ok(nodes)
    }
}

impl Topology for SysfsTopology {
    fn domain_count(&self) -> Result<usize, TopologyError> {
        Ok(self.node_ids()?.len().max(1))
    }

    fn device_domain(&self, pci: &PciAddress) -> Result<AffinityDomainId, TopologyError> {
        let numa_file = self.root.join(format!("bus/pci/devices/{pci}/numa_node"));
        let content = match fs::read_to_string(&numa_file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TopologyError::UnknownDevice(*pci));
            }
            Err(e) => return Err(TopologyError::Load(e)),
        };
        let node: i64 = content.trim().parse().map_err(|_| {
            TopologyError::Load(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed numa_node for {pci}: {content:?}"),
            ))
        })?;
        // -1 means the firmware exposes no locality for this device; fold it
        // into domain 0 rather than failing the whole resolution.
        Ok(if node < 0 { 0 } else { node as usize })
    }

    fn current_domain(&self) -> Result<AffinityDomainId, TopologyError> {
        // SAFETY: `sched_getcpu` reads per-thread scheduler state and takes
        // no arguments.
        let cpu = unsafe { libc::sched_getcpu() };
        if cpu < 0 {
            return Err(TopologyError::CurrentCpu);
        }
        let cpu = cpu as usize;

        // No NUMA directory means one flat domain; every CPU belongs to it.
        if !self.node_dir().exists() {
            return Ok(0);
        }

        for node in self.node_ids()? {
            let cpulist = self.node_dir().join(format!("node{node}/cpulist"));
            match fs::read_to_string(&cpulist) {
                Ok(list) => {
                    if parse_cpulist(&list).contains(&cpu) {
                        return Ok(node);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(TopologyError::Load(e)),
            }
        }
        Err(TopologyError::UnmappedCpu(cpu))
    }
}

/// Parse a cpulist string like `0-15,32-47` into a sorted list of CPU ids.
fn parse_cpulist(s: &str) -> Vec<usize> {
    let mut cpus = Vec::new();
    for part in s.trim().split(',') {
        let part = part.trim();
        if let Some((a, b)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (a.parse::<usize>(), b.parse::<usize>()) {
                cpus.extend(start..=end);
            }
        } else if let Ok(c) = part.parse::<usize>() {
            cpus.push(c);
        }
    }
    cpus.sort_unstable();
    cpus.dedup();
    cpus
}
