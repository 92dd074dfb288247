/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Resolver configuration.
//!
//! Everything the engine would otherwise pick up from ambient process state
//! (temp directory, login identity, sysfs mount) is an explicit field here,
//! so tests can point the whole engine at fixture trees.

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Represents NIC resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `scratch_root` - Where the per-user rotation-state directory lives.
    pub scratch_root: PathBuf,
    /// `user` - Login identity naming the rotation-state directory, so
    /// unprivileged users on a shared node do not collide.
    pub user: String,
    /// `sysfs_root` - Root of the sysfs tree used for topology queries.
    pub sysfs_root: PathBuf,
    /// `class_dir` - Sysfs class directory enumerating fabric interfaces.
    pub class_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir(),
            user: whoami::username(),
            sysfs_root: PathBuf::from("/sys"),
            class_dir: PathBuf::from("/sys/class/cxi"),
        }
    }
}
