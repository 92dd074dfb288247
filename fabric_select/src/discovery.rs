/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Fabric interface discovery.
//!
//! [`FabricEnumerator`] is the seam to whatever enumerates candidate NICs;
//! [`SysfsEnumerator`] is the production implementation, scanning a sysfs
//! class directory (`/sys/class/cxi` by default) and recovering each
//! interface's PCI location from its `device` symlink. Descriptors are
//! produced fresh on every call and are never cached.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

/// A PCI bus location in the sysfs `dddd:bb:dd.f` form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PciAddress {
    pub domain: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciAddress {
    /// Parse a sysfs-style PCI address such as `0000:3b:00.0`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return None;
        }

        let domain = u16::from_str_radix(parts[0], 16).ok()?;
        let bus = u8::from_str_radix(parts[1], 16).ok()?;

        let dev_func: Vec<&str> = parts[2].split('.').collect();
        if dev_func.len() != 2 {
            return None;
        }

        let device = u8::from_str_radix(dev_func[0], 16).ok()?;
        let function = u8::from_str_radix(dev_func[1], 16).ok()?;

        Some(Self {
            domain,
            bus,
            device,
            function,
        })
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

/// One discovered fabric interface.
///
/// `pci` is absent when the interface exposes no usable bus-location data;
/// such interfaces are skipped during bucketing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicDescriptor {
    /// Interface name, e.g. `cxi0`.
    pub name: String,
    /// PCI location of the backing device, if discoverable.
    pub pci: Option<PciAddress>,
}

/// Source of candidate NICs.
pub trait FabricEnumerator {
    /// Returns a fresh descriptor list. Order must be stable across calls on
    /// one node so that round-robin consumers agree on NIC indices.
    fn enumerate(&self) -> io::Result<Vec<NicDescriptor>>;
}

/// Enumerates fabric interfaces from a sysfs class directory.
#[derive(Debug, Clone)]
pub struct SysfsEnumerator {
    class_dir: PathBuf,
}

impl SysfsEnumerator {
    pub fn new(class_dir: impl Into<PathBuf>) -> Self {
        Self {
            class_dir: class_dir.into(),
        }
    }
}

impl FabricEnumerator for SysfsEnumerator {
    fn enumerate(&self) -> io::Result<Vec<NicDescriptor>> {
        let mut nics = Vec::new();
        if !self.class_dir.exists() {
            // No driver loaded: nothing to enumerate. The empty-bucket check
            // downstream turns this into a resolution failure.
            return Ok(nics);
        }

        let pci_regex = Regex::new(r"([0-9a-f]{4}:[0-9a-f]{2}:[0-9a-f]{2}\.[0-9a-f])").unwrap();

        let mut entries: Vec<_> = fs::read_dir(&self.class_dir)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().to_string();
            let pci = read_device_pci(&entry.path().join("device"), &pci_regex);
            if pci.is_none() {
                tracing::debug!(nic = %name, "interface has no PCI location");
            }
            nics.push(NicDescriptor { name, pci });
        }

        tracing::debug!(count = nics.len(), dir = %self.class_dir.display(), "enumerated fabric interfaces");
        Ok(nics)
    }
}

/// Extracts the interface's own PCI function from its `device` symlink. The
/// link target walks the whole PCI hierarchy, so the last address in it is
/// the device itself.
fn read_device_pci(device_link: &Path, pci_regex: &Regex) -> Option<PciAddress> {
    let target = fs::read_link(device_link).ok()?;
    let target_str = target.to_string_lossy();
    let last = pci_regex.find_iter(&target_str).last()?;
    PciAddress::parse(last.as_str())
}
