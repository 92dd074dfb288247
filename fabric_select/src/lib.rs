/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Topology-aware NIC selection for multi-NIC HPC nodes.
//!
//! This crate resolves a wildcard fabric address (one that names a transport
//! but no specific interface, e.g. `ofi+cxi://`) into an address bound to one
//! physical NIC, spreading load across the NICs of a node without per-node
//! configuration. Discovered NICs are partitioned into hardware-affinity
//! buckets, the bucket matching the calling process is chosen, and one NIC
//! inside it is picked under a pluggable policy. Round-robin rotation state is
//! shared across every process on the node through advisory-locked counter
//! files in a per-user scratch directory.
//!
//! Primitives:
//! - [`Resolver`]: the selection engine; one `resolve` call rebuilds all state
//!   from scratch and leaves nothing cached.
//! - [`Config`]: explicit knobs for everything ambient (scratch root, user
//!   identity, sysfs root, NIC class directory) so fixtures can isolate it.
//! - [`BucketPolicy`] / [`NicPolicy`]: closed policy enumerations, parseable
//!   from the `"all"`/`"numa"` and `"roundrobin"`/`"random"` spellings.
//! - [`Topology`] / [`FabricEnumerator`]: the seams to the node topology and
//!   to fabric interface discovery, with sysfs-backed production impls.
//! - [`CounterStore`]: the durable cross-process round-robin arbiter.

pub mod address;
mod bucket;
mod config;
mod discovery;
mod resolver;
mod rotation;
mod selection;
mod topology;

pub use bucket::*;
pub use config::*;
pub use discovery::*;
pub use resolver::*;
pub use rotation::*;
pub use selection::*;
pub use topology::*;

#[cfg(test)]
pub(crate) mod test_support;
