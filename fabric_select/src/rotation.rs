/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Durable cross-process round-robin state.
//!
//! One counter file per bucket lives in a per-user directory under the
//! scratch root (`<scratch>/<user>-fabric-select/<bucket>`). Each file holds
//! a single native-endian `i32`: the NIC index dispensed last, or nothing at
//! all if the bucket has never been used. Rotating takes a blocking exclusive
//! advisory lock on the file, so at most one process on the node mutates a
//! bucket's counter at a time and dispensed indices form a plain modular
//! cycle with no skips or duplicates.
//!
//! A holder that exits, even abnormally, has its lock released by the OS. A
//! holder that is alive but stuck blocks later callers indefinitely; there is
//! no timeout. The counter files themselves are never deleted here; scratch
//! cleanup (e.g. reboot of the node) reclaims them.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::FileExt as _;
use std::path::Path;
use std::path::PathBuf;

/// Advisory lock used around one counter rotation.
///
/// Injectable so tests can observe acquisition order or simulate a stuck
/// holder; production uses [`Flock`].
pub trait CounterLock {
    /// Blocks until the exclusive lock on `file` is held. No timeout.
    fn acquire(&self, file: &File) -> io::Result<()>;

    /// Releases the lock. Called on every exit path of a rotation.
    fn release(&self, file: &File) -> io::Result<()>;
}

/// OS advisory locking (`flock`-style) via `fs4`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Flock;

impl CounterLock for Flock {
    fn acquire(&self, file: &File) -> io::Result<()> {
        fs4::fs_std::FileExt::lock_exclusive(file)
    }

    fn release(&self, file: &File) -> io::Result<()> {
        fs4::fs_std::FileExt::unlock(file)
    }
}

/// Per-user store of persistent bucket counters.
#[derive(Debug)]
pub struct CounterStore<L = Flock> {
    dir: PathBuf,
    lock: L,
}

impl CounterStore<Flock> {
    pub fn new(scratch_root: &Path, user: &str) -> Self {
        Self::with_lock(scratch_root, user, Flock)
    }
}

impl<L: CounterLock> CounterStore<L> {
    pub fn with_lock(scratch_root: &Path, user: &str, lock: L) -> Self {
        Self {
            dir: scratch_root.join(format!("{user}-fabric-select")),
            lock,
        }
    }

    /// Path of one bucket's counter file. Exposed so callers can verify the
    /// single-NIC shortcut left it untouched.
    pub fn counter_path(&self, bucket: usize) -> PathBuf {
        self.dir.join(bucket.to_string())
    }

    /// Advances the bucket's counter by one modulo `nic_count` and returns
    /// the new value, i.e. the NIC index to dispense.
    ///
    /// A counter file that does not exist yet (or has never been written)
    /// reads as -1, so the first dispensation of a bucket is index 0.
    pub fn next_index(&self, bucket: usize, nic_count: usize) -> io::Result<usize> {
        debug_assert!(nic_count > 0);

        // Lazy directory creation; concurrent callers racing on this is
        // benign since create_dir_all tolerates an existing directory.
        fs::create_dir_all(&self.dir)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.counter_path(bucket))?;

        self.lock.acquire(&file)?;
        let rotated = rotate(&file, nic_count);
        let released = self.lock.release(&file);
        let next = rotated?;
        released?;

        tracing::trace!(bucket, next, "rotated persistent counter");
        Ok(next)
    }
}

fn rotate(file: &File, nic_count: usize) -> io::Result<usize> {
    let mut buf = [0u8; 4];
    let current = match file.read_exact_at(&mut buf, 0) {
        Ok(()) => i32::from_ne_bytes(buf),
        // Never written: treat as one before the start of the cycle.
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => -1,
        Err(e) => return Err(e),
    };

    let next = (current + 1).rem_euclid(nic_count as i32);
    file.write_all_at(&next.to_ne_bytes(), 0)?;
    Ok(next as usize)
}
