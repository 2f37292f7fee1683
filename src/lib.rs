// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! A RAM-backed block device that transparently protects its contents
//! with a layered vertical Hamming error-correcting code.
//!
//! Built for environments where single-event upsets flip individual bits
//! of DRAM — e.g. a spacecraft payload computer — while programs still
//! expect an ordinary 512-byte-sector block device.
//!
//! ## Architecture
//!
//! - [`ecc`]: the three-level vertical Hamming code — computation, diff,
//!   correction, and the triplicated-top-level layered verification
//!   protocol.
//! - [`tree`]: a sparse radix-2 trie addressing up to 2^32 4 KiB pages,
//!   allocating lazily on first write.
//! - [`device`]: the block-request dispatcher that glues scatter-gather
//!   I/O vectors to tree lookups and triggers opportunistic correction
//!   on read.
//! - [`config`]: device configuration (sector count, verification
//!   interval, frontend/backend mode).
//! - [`metrics`]: correction counters and the unrecoverable-corruption
//!   event sink (spec observability surface).
//! - [`concurrent`]: the shared/exclusive lock wrapper protecting the
//!   page tree's structure.
//!
//! ## Quick start
//!
//! ```rust
//! use hamming_blockdev::config::Config;
//! use hamming_blockdev::device::HammingDevice;
//!
//! let device = HammingDevice::new(Config::default()).unwrap();
//! let mut buf = [0xABu8; 512];
//! device.write(0, &mut buf).unwrap();
//!
//! let mut read_back = [0u8; 512];
//! device.read(0, &mut read_back).unwrap();
//! assert_eq!(read_back, buf);
//! ```

pub mod concurrent;
pub mod config;
pub mod device;
pub mod ecc;
pub mod error;
pub mod metrics;
pub mod tree;

pub use config::Config;
pub use device::HammingDevice;
pub use error::{HammingError, HammingResult};
