// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! A single 4 KiB page and its ECC-protected contents.

use crate::ecc::{CodeSet, Row, DATA_ROWS};
use crate::error::HammingResult;
use crate::metrics::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Bytes per page: `DATA_ROWS` rows of 16 bytes each.
pub const PAGE_SIZE: usize = DATA_ROWS * 16;
/// Bytes per sector, and the unit every block request segment is
/// chunked into (spec §4.3.1).
pub const SECTOR_SIZE: usize = 512;
/// Sectors per page.
pub const SECTORS_PER_PAGE: usize = PAGE_SIZE / SECTOR_SIZE;

struct PageBody {
    data: [u8; PAGE_SIZE],
    code: CodeSet,
}

/// One page of page-tree-resident data, lazily allocated the first time
/// a sector within it is written (spec §3, §4.2.4).
///
/// Contents and code live behind a single [`Mutex`] so a sector write is
/// read-modify-recompute-write atomic with respect to other writers of
/// the same page; concurrent writers to the same sector therefore
/// produce a well-defined last-write-wins result rather than a torn one
/// (spec §5). The staleness clock is a separate atomic so a reader that
/// finds the page fresh never needs the lock at all.
pub struct Page {
    body: Mutex<PageBody>,
    last_check_ns: AtomicU64,
}

fn bytes_to_rows(data: &[u8; PAGE_SIZE]) -> [Row; DATA_ROWS] {
    let mut rows = [Row::ZERO; DATA_ROWS];
    for (i, row) in rows.iter_mut().enumerate() {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&data[i * 16..i * 16 + 16]);
        *row = Row::from_bytes(buf);
    }
    rows
}

fn rows_to_bytes(rows: &[Row; DATA_ROWS], out: &mut [u8; PAGE_SIZE]) {
    for (i, &row) in rows.iter().enumerate() {
        out[i * 16..i * 16 + 16].copy_from_slice(&row.to_bytes());
    }
}

impl Page {
    /// A freshly allocated, all-zero page with a valid (zero) `CodeSet`
    /// already in place.
    pub(crate) fn new_zeroed() -> Page {
        let data = [0u8; PAGE_SIZE];
        let rows = bytes_to_rows(&data);
        // DATA_ROWS/FIRST_SET_LEN/SECOND_SET_LEN are fixed constants that
        // always satisfy compute_code's dimension precondition.
        let code = CodeSet::compute(&rows).expect("page dimensions always satisfy ECC bounds");
        Page {
            body: Mutex::new(PageBody { data, code }),
            last_check_ns: AtomicU64::new(0),
        }
    }

    /// Copies one 512-byte sector out of the page. Does not itself
    /// verify staleness — callers drive that via [`Page::verify_if_stale`]
    /// first (spec §4.2.5).
    pub(crate) fn read_sector(&self, chunk: u8) -> [u8; SECTOR_SIZE] {
        let body = self.body.lock().expect("page lock poisoned");
        let start = chunk as usize * SECTOR_SIZE;
        let mut out = [0u8; SECTOR_SIZE];
        out.copy_from_slice(&body.data[start..start + SECTOR_SIZE]);
        out
    }

    /// Writes one 512-byte sector and recomputes the page's `CodeSet`
    /// from scratch (spec §4.3.1 — writes always recompute the full
    /// layered code rather than patching it incrementally).
    pub(crate) fn write_sector(&self, chunk: u8, bytes: &[u8; SECTOR_SIZE]) -> HammingResult<()> {
        let mut body = self.body.lock().expect("page lock poisoned");
        let start = chunk as usize * SECTOR_SIZE;
        body.data[start..start + SECTOR_SIZE].copy_from_slice(bytes);
        let rows = bytes_to_rows(&body.data);
        body.code = CodeSet::compute(&rows)?;
        Ok(())
    }

    /// Opportunistic verification (spec §4.2.5): if more than
    /// `verify_interval_ns` has elapsed since this page was last checked,
    /// runs the layered verification protocol and folds any corrections
    /// back into the page's contents. Staleness uses `saturating_sub`
    /// rather than a raw difference, so a clock that appears to run
    /// backwards reads as "not yet stale" instead of wrapping to a huge
    /// unsigned value (spec §9 REDESIGN FLAGS).
    pub(crate) fn verify_if_stale(
        &self,
        now_ns: u64,
        verify_interval_ns: u64,
        page_id: u32,
        metrics: &Metrics,
    ) -> HammingResult<()> {
        let last = self.last_check_ns.load(Ordering::Relaxed);
        if now_ns.saturating_sub(last) <= verify_interval_ns {
            return Ok(());
        }

        let mut body = self.body.lock().expect("page lock poisoned");
        let mut rows = bytes_to_rows(&body.data);
        match body.code.verify_and_correct(&mut rows, page_id) {
            Ok(0) => {}
            Ok(n) => {
                rows_to_bytes(&rows, &mut body.data);
                metrics.record_corrections(n);
                log::debug!("page {} corrected {} bit(s) on verify", page_id, n);
            }
            Err(e) => {
                metrics.record_unrecoverable(page_id, now_ns);
                log::warn!("page {} unrecoverable corruption: {}", page_id, e);
                return Err(e);
            }
        }
        self.last_check_ns.store(now_ns, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let page = Page::new_zeroed();
        let mut sector = [0u8; SECTOR_SIZE];
        sector[0] = 0xAB;
        sector[511] = 0xCD;
        page.write_sector(3, &sector).unwrap();
        assert_eq!(page.read_sector(3), sector);
        assert_eq!(page.read_sector(0), [0u8; SECTOR_SIZE]);
    }

    #[test]
    fn verify_skips_when_fresh() {
        let page = Page::new_zeroed();
        let metrics = Metrics::new();
        page.last_check_ns.store(1_000, Ordering::Relaxed);
        page.verify_if_stale(1_500, 1_000, 0, &metrics).unwrap();
        // Still fresh (500ns < 1000ns interval): clock must not have moved.
        assert_eq!(page.last_check_ns.load(Ordering::Relaxed), 1_000);
    }

    #[test]
    fn verify_corrects_single_bit_flip_and_updates_clock() {
        let page = Page::new_zeroed();
        let mut sector = [0u8; SECTOR_SIZE];
        sector[10] = 0x42;
        page.write_sector(0, &sector).unwrap();

        {
            let mut body = page.body.lock().unwrap();
            let mut rows = bytes_to_rows(&body.data);
            rows[5].flip_bit(3);
            rows_to_bytes(&rows, &mut body.data);
        }

        let metrics = Metrics::new();
        page.verify_if_stale(5_000, 0, 0, &metrics).unwrap();
        assert_eq!(page.read_sector(0), sector);
        assert_eq!(metrics.correction_count(), 1);
        assert_eq!(page.last_check_ns.load(Ordering::Relaxed), 5_000);
    }
}
