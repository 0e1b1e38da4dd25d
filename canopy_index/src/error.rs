// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by every index.

use crate::types::Rect3;

/// Errors reported by index constructors and insertions.
///
/// A call that returns an error leaves the index untouched. Cancelled queries
/// are not errors; they surface as an early channel close.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed input: empty or non-finite bounds, bad fanout, zero grid size.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The bounds lie outside the fixed world extent of an octree.
    #[error("bounds {bounds:?} are outside the octree root {root:?}")]
    OutOfDomain {
        /// Bounds of the rejected object.
        bounds: Rect3,
        /// The octree's root bounds.
        root: Rect3,
    },

    /// The index has no room left for another entry.
    #[error("capacity exhausted: {0}")]
    CapacityExhausted(String),

    /// A configuration document could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
