// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Vertical Hamming codes and the three-level layered verification protocol.
//!
//! ## Layout
//!
//! A page is 256 data rows. `first_set` is a 9-row Hamming code computed
//! across those 256 rows (`ceil(log2(256)) == 8`, plus one wasted row for
//! Hamming's 1-indexed parity positions — spec §4.1.4). `second_set` is a
//! 4-row Hamming code computed across `first_set`'s 9 rows, stored in
//! triplicate for cheap RAID-1-style majority voting rather than a second
//! layer of Hamming coverage (spec §4.1.3: "higher levels are tiny... so
//! triplication is cheaper than Hamming on them").
//!
//! ## Why vertical
//!
//! Storing codes vertically — bit `b` of code row `k` is the XOR of bit
//! `b` of every data row whose index has bit `k` set — lets the whole
//! 128-bit column update with one XOR per contributing data row, rather
//! than one scalar XOR per output bit (spec §4.1.1).

use crate::error::{HammingError, HammingResult};
use crate::ecc::row::Row;

/// Rows in `first_set`: `ceil(log2(DATA_ROWS + 1))`.
pub const FIRST_SET_LEN: usize = 9;
/// Rows in each `second_set` copy: `ceil(log2(FIRST_SET_LEN + 1))`.
pub const SECOND_SET_LEN: usize = 4;
/// Data rows per page (4096 bytes / 16 bytes-per-row).
pub const DATA_ROWS: usize = 256;

/// Three-level Hamming protection for one page's 256 data rows.
///
/// Invariant at rest: `second_set[0] == second_set[1] == second_set[2]`,
/// and `first_set`/`second_set[0]` are the Hamming codes of the page's
/// current contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSet {
    pub first_set: [Row; FIRST_SET_LEN],
    pub second_set: [[Row; SECOND_SET_LEN]; 3],
}

impl CodeSet {
    /// Computes a fresh `CodeSet` for the given 256 data rows.
    pub fn compute(data: &[Row; DATA_ROWS]) -> HammingResult<CodeSet> {
        let mut first_set = [Row::ZERO; FIRST_SET_LEN];
        compute_code(&mut first_set, data)?;

        let mut second = [Row::ZERO; SECOND_SET_LEN];
        compute_code(&mut second, &first_set)?;

        Ok(CodeSet {
            first_set,
            second_set: [second, second, second],
        })
    }

    /// Runs the layered verification protocol (spec §4.1.3) against the
    /// given data, correcting both the `CodeSet` itself and the data in
    /// place.
    ///
    /// 1. Reconcile the three `second_set` copies via bitwise majority
    ///    vote (always produces a definitive per-bit answer — a binary
    ///    value can only disagree two ways, so two of three copies always
    ///    agree on any single bit. This supersedes the original
    ///    implementation's pairwise-`memcmp`-and-bail, which the spec
    ///    calls out as an acknowledged gap).
    /// 2. Treat the reconciled `second_set[0]` as ground truth and correct
    ///    `first_set`.
    /// 3. Treat the (now-corrected) `first_set` as ground truth and
    ///    correct `data`.
    ///
    /// Returns the total number of bit corrections applied, or
    /// [`HammingError::UnrecoverableCorruption`] if a level's correction
    /// does not converge (more disagreement than a single flipped bit per
    /// column can explain).
    pub fn verify_and_correct(
        &mut self,
        data: &mut [Row; DATA_ROWS],
        page_id: u32,
    ) -> HammingResult<usize> {
        majority_vote_second_set(&mut self.second_set);

        let first_set_corrections = correct(
            &self.second_set[0],
            &mut self.first_set,
            page_id,
            "first_set",
        )?;

        let data_corrections = correct(&self.first_set, data, page_id, "data")?;

        Ok(first_set_corrections + data_corrections)
    }
}

/// Reconciles the three RAID-1-style `second_set` copies via bitwise
/// majority vote, in place. `maj(a, b, c) = (a & b) | (b & c) | (c & a)`
/// is the standard 3-input majority function; applied per-bit, it always
/// yields the value held by at least two of the three copies.
fn majority_vote_second_set(second_set: &mut [[Row; SECOND_SET_LEN]; 3]) {
    for i in 0..SECOND_SET_LEN {
        let a = second_set[0][i];
        let b = second_set[1][i];
        let c = second_set[2][i];
        let majority = Row((a.0 & b.0) | (b.0 & c.0) | (c.0 & a.0));
        second_set[0][i] = majority;
        second_set[1][i] = majority;
        second_set[2][i] = majority;
    }
}

/// `ComputeCode`: computes the vertical Hamming code of `data` into
/// `out_code`.
///
/// ## Preconditions
/// - `out_code.len() <= 16`
/// - `1 << out_code.len() >= data.len()`
///
/// Violating either returns [`HammingError::ConfigError`] rather than
/// continuing with undefined coverage (spec §9 REDESIGN FLAGS: the
/// original only warns and proceeds).
pub fn compute_code(out_code: &mut [Row], data: &[Row]) -> HammingResult<()> {
    let k = out_code.len();
    let n = data.len();
    if k > 16 || (1usize << k) < n {
        return Err(HammingError::ConfigError {
            code_len: k,
            data_len: n,
        });
    }
    for row in out_code.iter_mut() {
        *row = Row::ZERO;
    }
    for (a, &row) in data.iter().enumerate() {
        for (k, code_row) in out_code.iter_mut().enumerate() {
            if (a >> k) & 1 != 0 {
                *code_row ^= row;
            }
        }
    }
    Ok(())
}

/// `DiffCodes`: compares two code sets of equal length `K <= 16` and
/// returns every disagreeing bit column as `(syndrome, bit_column)`.
///
/// For bit column `i`, the two `K`-bit integers assembled from `old`/`new`
/// XOR to a Hamming syndrome: under the single-error assumption, that
/// syndrome equals the row index of the flipped data row. Collects up to
/// `cap` entries.
pub fn diff_codes(old: &[Row], new: &[Row], cap: usize) -> Vec<(u16, u8)> {
    debug_assert_eq!(old.len(), new.len());
    let k = old.len();
    let mut errors = Vec::new();
    for bit in 0..crate::ecc::row::ROW_BITS {
        let mut a: u16 = 0;
        let mut b: u16 = 0;
        for (i, (&o, &n)) in old.iter().zip(new.iter()).enumerate() {
            if o.get_bit(bit) {
                a |= 1 << i;
            }
            if n.get_bit(bit) {
                b |= 1 << i;
            }
        }
        let _ = k;
        let syndrome = a ^ b;
        if syndrome != 0 {
            errors.push((syndrome, bit as u8));
            if errors.len() == cap {
                break;
            }
        }
    }
    errors
}

/// `ApplyCorrections`: toggles `data[row_index]`'s `bit_column` for every
/// `(row_index, bit_column)` pair. Entries with `row_index >= data.len()`
/// or `bit_column >= 128` are out of range — logged and skipped rather
/// than treated as an assertion failure, since they indicate corruption
/// beyond single-bit-per-column correction capacity rather than a
/// programmer bug (spec §4.1.2; the bounds check is `>=`, not `>`, per
/// spec §9 REDESIGN FLAGS).
///
/// Returns the number of corrections actually applied.
pub fn apply_corrections(data: &mut [Row], errors: &[(u16, u8)]) -> usize {
    let mut applied = 0;
    for &(row_index, bit_column) in errors {
        let row_index = row_index as usize;
        if row_index >= data.len() || bit_column as u32 >= crate::ecc::row::ROW_BITS {
            log::warn!(
                "skipping out-of-range correction: row {} bit {} (data has {} rows)",
                row_index,
                bit_column,
                data.len()
            );
            continue;
        }
        data[row_index].flip_bit(bit_column as u32);
        applied += 1;
    }
    applied
}

/// `Correct`: recomputes a fresh code from `data`, diffs it against
/// `stored_code`, applies corrections, and repeats until no disagreement
/// remains. Converges in one pass when `stored_code` itself is trustworthy
/// (the caller's responsibility — see [`CodeSet::verify_and_correct`],
/// which sanitizes higher levels before trusting them). Bounded to avoid
/// looping forever if that assumption is violated; an unmet bound is
/// reported as [`HammingError::UnrecoverableCorruption`].
fn correct(
    stored_code: &[Row],
    data: &mut [Row],
    page_id: u32,
    level: &'static str,
) -> HammingResult<usize> {
    let k = stored_code.len();
    let n = data.len();
    if k > 16 || (1usize << k) < n {
        return Err(HammingError::ConfigError {
            code_len: k,
            data_len: n,
        });
    }

    let mut total = 0;
    let mut fresh = vec![Row::ZERO; k];
    // A correction strictly reduces disagreement each pass under the
    // single-error assumption; bound iterations to the row count as a
    // backstop against a multi-error input that would never converge.
    for _ in 0..=n {
        compute_code(&mut fresh, data)?;
        let diff = diff_codes(stored_code, &fresh, crate::ecc::row::ROW_BITS as usize);
        if diff.is_empty() {
            return Ok(total);
        }
        let applied = apply_corrections(data, &diff);
        total += applied;
        if applied == 0 {
            return Err(HammingError::UnrecoverableCorruption {
                page_id,
                detail: "syndrome out of range",
            });
        }
    }
    log::debug!(
        "page {} level '{}' did not converge after {} corrections",
        page_id,
        level,
        total
    );
    Err(HammingError::UnrecoverableCorruption {
        page_id,
        detail: "correction did not converge",
    })
}

#[cfg(test)]
#[path = "code_test.rs"]
mod code_test;
