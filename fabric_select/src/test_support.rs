/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Shared fixtures for unit tests.

use std::collections::HashMap;

use crate::discovery::FabricEnumerator;
use crate::discovery::NicDescriptor;
use crate::discovery::PciAddress;
use crate::topology::AffinityDomainId;
use crate::topology::Topology;
use crate::topology::TopologyError;

/// In-memory topology with a fixed domain count, a fixed current domain, and
/// an explicit device map.
#[derive(Debug, Clone)]
pub(crate) struct FakeTopology {
    domains: usize,
    current: AffinityDomainId,
    devices: HashMap<PciAddress, AffinityDomainId>,
}

impl FakeTopology {
    pub(crate) fn new(domains: usize, current: AffinityDomainId) -> Self {
        Self {
            domains,
            current,
            devices: HashMap::new(),
        }
    }

    pub(crate) fn with_device(mut self, pci: &str, domain: AffinityDomainId) -> Self {
        self.devices.insert(PciAddress::parse(pci).unwrap(), domain);
        self
    }
}

impl Topology for FakeTopology {
    fn domain_count(&self) -> Result<usize, TopologyError> {
        Ok(self.domains)
    }

    fn device_domain(&self, pci: &PciAddress) -> Result<AffinityDomainId, TopologyError> {
        self.devices
            .get(pci)
            .copied()
            .ok_or(TopologyError::UnknownDevice(*pci))
    }

    fn current_domain(&self) -> Result<AffinityDomainId, TopologyError> {
        Ok(self.current)
    }
}

/// Enumerator dispensing a fixed descriptor list.
#[derive(Debug, Clone)]
pub(crate) struct FixedNics(pub(crate) Vec<NicDescriptor>);

impl FabricEnumerator for FixedNics {
    fn enumerate(&self) -> std::io::Result<Vec<NicDescriptor>> {
        Ok(self.0.clone())
    }
}

/// Builds a descriptor, parsing the optional PCI address.
pub(crate) fn nic(name: &str, pci: Option<&str>) -> NicDescriptor {
    NicDescriptor {
        name: name.to_string(),
        pci: pci.map(|p| PciAddress::parse(p).unwrap()),
    }
}
