// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Device configuration.
//!
//! Centralised configuration and validation, following the same pattern
//! as the crate's page and ECC validation: plain functions/constructors
//! returning `HammingResult`, documented with `## Rules`/`## Example`.

use crate::error::{HammingError, HammingResult};

/// Default sector capacity: 2 Mi sectors (1 GiB at 512 bytes/sector).
pub const DEFAULT_SECTOR_COUNT: u32 = 1024 * 1024 * 2;

/// Default minimum age, in nanoseconds, before a page is re-verified on read.
pub const DEFAULT_VERIFY_INTERVAL_NS: u64 = 10_000;

/// Which host-entry path is active. Mutually exclusive at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendMode {
    /// Ordinary block-device request queue (read/write/discard/write-zeroes).
    BlockDevice,
    /// Frontswap hook (swap pages in/out of the tree instead of real swap storage).
    Frontswap,
}

/// Where page bytes physically live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Pages are stored in the sparse in-memory trie (the only backend this
    /// crate implements; `ForwardToBlockDevice` is recorded for parity with
    /// the original module's configuration surface but has no collaborator).
    InMemoryTree,
    /// Forward requests to a backing block device (external collaborator;
    /// out of scope, see spec Non-goals).
    ForwardToBlockDevice,
}

/// Device configuration.
///
/// ## Fields
/// - `sector_count`: total addressable 512-byte sectors.
/// - `verify_interval_ns`: minimum wall-clock age, in nanoseconds, before a
///   page is re-verified on read (opportunistic verification staleness
///   threshold, not a timeout).
/// - `frontend_mode` / `backend_mode`: recorded host-entry/storage
///   configuration; see [`FrontendMode`] and [`BackendMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub sector_count: u32,
    pub verify_interval_ns: u64,
    pub frontend_mode: FrontendMode,
    pub backend_mode: BackendMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sector_count: DEFAULT_SECTOR_COUNT,
            verify_interval_ns: DEFAULT_VERIFY_INTERVAL_NS,
            frontend_mode: FrontendMode::BlockDevice,
            backend_mode: BackendMode::InMemoryTree,
        }
    }
}

impl Config {
    /// Validates configuration invariants.
    ///
    /// ## Rules
    /// - `sector_count` must be nonzero and a multiple of 8 (whole pages
    ///   only; a page is always 8 sectors, spec §4.2.4).
    ///
    /// ## Example
    /// ```
    /// use hamming_blockdev::config::Config;
    ///
    /// let cfg = Config::default();
    /// assert!(cfg.validate().is_ok());
    /// ```
    pub fn validate(&self) -> HammingResult<()> {
        if self.sector_count == 0 || self.sector_count % 8 != 0 {
            return Err(HammingError::ConfigError {
                code_len: 0,
                data_len: self.sector_count as usize,
            });
        }
        Ok(())
    }
}
