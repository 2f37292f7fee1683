// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Block request dispatch (spec [MODULE: device], §4.3).
//!
//! A request is a starting sector plus a list of scatter-gather
//! segments — host buffers, chunked sector by sector as they're walked.
//! Each sector is handled independently: `received -> mapped -> copied ->
//! committed`, with `AllocError`/`IoError` (including an unrecoverable
//! ECC failure, which surfaces identically) as the only abort
//! transitions (spec §4.3.2).

use crate::device::device::HammingDevice;
use crate::error::{HammingError, HammingResult};
use crate::tree::{SubtreeCursor, SECTOR_SIZE};

/// One scatter-gather segment of a [`BlockRequest`]: a contiguous host
/// buffer whose length must be a positive multiple of 512 bytes.
///
/// For a read request the device writes into `buf`; for a write request
/// the device only reads from it, but `&mut` is used uniformly since a
/// caller building either kind of request typically owns one buffer type.
pub struct Segment<'a> {
    pub buf: &'a mut [u8],
}

impl<'a> Segment<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Segment { buf }
    }
}

/// A block request: direction, starting sector, and the segments to
/// walk across it in order.
pub struct BlockRequest<'a> {
    pub starting_sector: u64,
    pub is_write: bool,
    pub segments: Vec<Segment<'a>>,
}

impl<'a> BlockRequest<'a> {
    pub fn read(starting_sector: u64, segments: Vec<Segment<'a>>) -> Self {
        BlockRequest {
            starting_sector,
            is_write: false,
            segments,
        }
    }

    pub fn write(starting_sector: u64, segments: Vec<Segment<'a>>) -> Self {
        BlockRequest {
            starting_sector,
            is_write: true,
            segments,
        }
    }
}

/// Submits a request: walks every segment sector by sector, dispatching
/// each to the owning page. A segment whose length isn't a positive
/// multiple of 512 bytes, or a sector at or beyond the device's
/// configured capacity, aborts the whole request without partially
/// applying it to later segments (spec §4.3.1, §4.3.2).
pub fn submit(device: &HammingDevice, request: &mut BlockRequest) -> HammingResult<()> {
    let mut sector = request.starting_sector;
    for segment in request.segments.iter_mut() {
        let len = segment.buf.len();
        if len == 0 || len % SECTOR_SIZE != 0 {
            return Err(HammingError::UnalignedSegment { len });
        }
        let mut offset = 0;
        while offset < len {
            let chunk = &mut segment.buf[offset..offset + SECTOR_SIZE];
            let sector_bytes: &mut [u8; SECTOR_SIZE] = chunk
                .try_into()
                .expect("chunk length is exactly SECTOR_SIZE by construction");
            if request.is_write {
                write_sector(device, sector, sector_bytes)?;
            } else {
                read_sector(device, sector, sector_bytes)?;
            }
            offset += SECTOR_SIZE;
            sector += 1;
        }
    }
    Ok(())
}

/// Validates a discard/write-zeroes range against device capacity. Both
/// operations are lazy no-ops otherwise (spec §4.3.1): an unallocated
/// sector already reads as zero, so there is nothing to do beyond
/// bounds-checking the request.
pub fn discard(device: &HammingDevice, sector: u64, sector_count: u64) -> HammingResult<()> {
    validate_range(device, sector, sector_count)
}

pub fn write_zeroes(device: &HammingDevice, sector: u64, sector_count: u64) -> HammingResult<()> {
    validate_range(device, sector, sector_count)
}

fn validate_range(device: &HammingDevice, sector: u64, sector_count: u64) -> HammingResult<()> {
    let capacity = device.config().sector_count as u64;
    let end = sector.checked_add(sector_count).unwrap_or(u64::MAX);
    if sector_count == 0 || end > capacity {
        return Err(HammingError::SectorOutOfRange {
            sector,
            sector_count: device.config().sector_count,
        });
    }
    Ok(())
}

pub(super) fn read_sector(
    device: &HammingDevice,
    sector: u64,
    out: &mut [u8; SECTOR_SIZE],
) -> HammingResult<()> {
    if sector >= device.config().sector_count as u64 {
        return Err(HammingError::SectorOutOfRange {
            sector,
            sector_count: device.config().sector_count,
        });
    }
    let page_id = (sector >> 3) as u32;
    let chunk = (sector & 0b111) as u8;

    match device.tree().resolve(SubtreeCursor::for_page(page_id), false)? {
        Some(page) => {
            let now = device.now_ns();
            page.verify_if_stale(now, device.config().verify_interval_ns, page_id, device.metrics())?;
            out.copy_from_slice(&page.read_sector(chunk));
            Ok(())
        }
        None => {
            out.fill(0);
            Ok(())
        }
    }
}

pub(super) fn write_sector(
    device: &HammingDevice,
    sector: u64,
    data: &[u8; SECTOR_SIZE],
) -> HammingResult<()> {
    if sector >= device.config().sector_count as u64 {
        return Err(HammingError::SectorOutOfRange {
            sector,
            sector_count: device.config().sector_count,
        });
    }
    let page_id = (sector >> 3) as u32;
    let chunk = (sector & 0b111) as u8;

    let page = device
        .tree()
        .resolve(SubtreeCursor::for_page(page_id), true)?
        .expect("create=true always yields a page");
    page.write_sector(chunk, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn write_then_read_single_sector() {
        let device = HammingDevice::new(Config::default()).unwrap();
        let mut write_buf = [0u8; SECTOR_SIZE];
        write_buf[0] = 0x7A;
        let mut request = BlockRequest::write(0, vec![Segment::new(&mut write_buf)]);
        submit(&device, &mut request).unwrap();

        let mut read_buf = [0u8; SECTOR_SIZE];
        let mut request = BlockRequest::read(0, vec![Segment::new(&mut read_buf)]);
        submit(&device, &mut request).unwrap();
        assert_eq!(read_buf[0], 0x7A);
    }

    #[test]
    fn read_of_unwritten_sector_is_zero() {
        let device = HammingDevice::new(Config::default()).unwrap();
        let mut read_buf = [1u8; SECTOR_SIZE];
        let mut request = BlockRequest::read(5, vec![Segment::new(&mut read_buf)]);
        submit(&device, &mut request).unwrap();
        assert_eq!(read_buf, [0u8; SECTOR_SIZE]);
    }

    #[test]
    fn request_spanning_multiple_pages_round_trips() {
        let device = HammingDevice::new(Config::default()).unwrap();
        let sectors = 20; // spans 3 pages (8 sectors each)
        let mut data = vec![0u8; sectors * SECTOR_SIZE];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut write_buf = data.clone();
        let mut request = BlockRequest::write(0, vec![Segment::new(&mut write_buf)]);
        submit(&device, &mut request).unwrap();

        let mut read_buf = vec![0u8; sectors * SECTOR_SIZE];
        let mut request = BlockRequest::read(0, vec![Segment::new(&mut read_buf)]);
        submit(&device, &mut request).unwrap();
        assert_eq!(read_buf, data);
    }

    #[test]
    fn sector_out_of_range_is_rejected() {
        let device = HammingDevice::new(Config::default()).unwrap();
        let mut buf = [0u8; SECTOR_SIZE];
        let mut request =
            BlockRequest::read(device.config().sector_count as u64, vec![Segment::new(&mut buf)]);
        let err = submit(&device, &mut request).unwrap_err();
        assert!(matches!(err, HammingError::SectorOutOfRange { .. }));
    }

    #[test]
    fn unaligned_segment_is_rejected() {
        let device = HammingDevice::new(Config::default()).unwrap();
        let mut buf = [0u8; 100];
        let mut request = BlockRequest::read(0, vec![Segment::new(&mut buf)]);
        let err = submit(&device, &mut request).unwrap_err();
        assert!(matches!(err, HammingError::UnalignedSegment { .. }));
    }

    #[test]
    fn discard_and_write_zeroes_are_lazy_no_ops() {
        let device = HammingDevice::new(Config::default()).unwrap();
        discard(&device, 0, 2048).unwrap();
        write_zeroes(&device, 2048, 2048).unwrap();

        let mut read_buf = [1u8; SECTOR_SIZE];
        let mut request = BlockRequest::read(100, vec![Segment::new(&mut read_buf)]);
        submit(&device, &mut request).unwrap();
        assert_eq!(read_buf, [0u8; SECTOR_SIZE]);
    }

    #[test]
    fn discard_out_of_range_is_rejected() {
        let device = HammingDevice::new(Config::default()).unwrap();
        let err = discard(&device, device.config().sector_count as u64 - 1, 10).unwrap_err();
        assert!(matches!(err, HammingError::SectorOutOfRange { .. }));
    }
}
