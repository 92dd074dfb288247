/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Recognition and rewriting of wildcard fabric addresses.
//!
//! Only CXI addresses are manipulated. An address is eligible for rewriting
//! iff it names the CXI transport and is still in wildcard form, i.e. it ends
//! with the empty-authority marker `//`. Everything else passes through the
//! resolver untouched, and passing through is success, not an error.

/// Transport spellings whose addresses this crate knows how to rewrite.
const FABRIC_PREFIXES: &[&str] = &["ofi+cxi", "cxi"];

/// Returns true if `address` names a supported transport and has not yet been
/// bound to a specific interface.
pub fn is_unresolved_fabric(address: &str) -> bool {
    FABRIC_PREFIXES.iter().any(|p| address.starts_with(p)) && address.ends_with("//")
}

/// Appends the selected NIC name to a wildcard address.
///
/// Callers must have established eligibility with [`is_unresolved_fabric`];
/// composition itself is blind concatenation.
pub fn compose(address: &str, nic: &str) -> String {
    format!("{address}{nic}")
}
