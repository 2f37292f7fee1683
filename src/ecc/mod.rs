// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Vertical three-level Hamming ECC engine.
//!
//! Computes, diffs, and corrects the vertical Hamming codes that protect
//! one page's worth of data. See [`code::CodeSet`] for the layered
//! verification protocol.

pub mod code;
pub mod row;

pub use code::{
    apply_corrections, compute_code, diff_codes, CodeSet, DATA_ROWS, FIRST_SET_LEN,
    SECOND_SET_LEN,
};
pub use row::{Row, ROW_BITS};
