// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tuning knobs for each index and for result streaming.
//!
//! Every config has a `Default` matching the documented defaults. Configs with
//! constraints expose a `validate` that constructors run before building
//! anything. With the `serde` feature the whole set can be read from TOML:
//!
//! ```toml
//! [octree]
//! split_threshold = 8
//! max_depth = 16
//!
//! [rtree]
//! min_children = 15
//! max_children = 30
//!
//! [grid]
//! size = 16
//!
//! [stream]
//! capacity = 8
//! ```

use crate::error::{Error, Result};

/// Octree subdivision policy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OctreeConfig {
    /// A node materialises a child only once it already stores more than this many objects.
    pub split_threshold: usize,
    /// Deepest level a node may be created at (the root is level 0).
    pub max_depth: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            split_threshold: 8,
            max_depth: 16,
        }
    }
}

/// R-tree fanout bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RTreeConfig {
    /// Minimum entries of every non-root node.
    pub min_children: usize,
    /// Maximum entries of every node.
    pub max_children: usize,
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self {
            min_children: 15,
            max_children: 30,
        }
    }
}

impl RTreeConfig {
    /// Require `min >= 1` and `max >= 2 * min`, so a split of `max + 1`
    /// entries can leave both halves with at least `min`.
    pub fn validate(&self) -> Result<()> {
        let (min, max) = (self.min_children, self.max_children);
        if min == 0 || min > max {
            return Err(Error::InvalidArgument(format!(
                "r-tree fanout requires 0 < min <= max (min={min}, max={max})"
            )));
        }
        if max < 2 * min {
            return Err(Error::InvalidArgument(format!(
                "r-tree fanout requires max >= 2 * min (min={min}, max={max})"
            )));
        }
        Ok(())
    }
}

/// Grid hash table dimensions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GridHashConfig {
    /// Cells per axis; the table holds `size³` cells.
    pub size: usize,
}

impl Default for GridHashConfig {
    fn default() -> Self {
        Self { size: 16 }
    }
}

impl GridHashConfig {
    /// Require a positive size.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::InvalidArgument("grid hash size must be > 0".into()));
        }
        Ok(())
    }
}

/// Streaming query settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamConfig {
    /// Capacity of result channels created by
    /// [`SharedIndex::query_channel`](crate::SharedIndex::query_channel).
    ///
    /// Items already buffered when a query is cancelled still reach the
    /// consumer, so a consumer sees at most `capacity + 1` items after
    /// cancelling. The default keeps that below ten.
    pub capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { capacity: 8 }
    }
}

/// All configs in one document.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IndexConfig {
    /// Octree policy.
    pub octree: OctreeConfig,
    /// R-tree fanout.
    pub rtree: RTreeConfig,
    /// Grid hash dimensions.
    pub grid: GridHashConfig,
    /// Result streaming.
    pub stream: StreamConfig,
}

impl IndexConfig {
    /// Validate the sections that have constraints (r-tree fanout, grid size).
    pub fn validate(&self) -> Result<()> {
        self.rtree.validate()?;
        self.grid.validate()
    }
}

#[cfg(feature = "serde")]
impl IndexConfig {
    /// Parse and validate a TOML document. Missing sections take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
