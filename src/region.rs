//! Interning of region head/tail strings into the on-disk region table.
//!
//! Mirrors `original_source/maker/region.go`'s `region`/`regionTree`: a
//! two-level dictionary, `head -> {headOffset, tail -> tailPtr}`.

use std::collections::HashMap;
use std::io::{Seek, SeekFrom, Write};

use byteorder::{ByteOrder, LE};
use log::debug;

use crate::error::IgrError;

#[derive(Debug, Default)]
struct HeadEntry {
    head_offset: u16,
    /// tail string -> absolute file offset of its tail record (0 until written).
    tails: HashMap<String, u32>,
}

/// De-duplicating dictionary of region heads/tails, seeded during ingest
/// and frozen once written to the destination file.
#[derive(Debug, Default)]
pub struct RegionTable {
    heads: HashMap<String, HeadEntry>,
    reserved_tail_ptr: Option<u32>,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `head` if absent and records `tail` under it with a
    /// placeholder pointer. Idempotent.
    pub fn seed(&mut self, head: &str, tail: &str) -> Result<(), IgrError> {
        if head.len() >= crate::format::REGION_BASE_BLOCK_SIZE {
            return Err(IgrError::RegionTooLong {
                field: "head",
                len: head.len(),
                limit: "< 64 bytes",
            });
        }
        if tail.len() > 0xFF {
            return Err(IgrError::RegionTooLong {
                field: "tail",
                len: tail.len(),
                limit: "<= 255 bytes",
            });
        }

        let entry = self.heads.entry(head.to_string()).or_default();
        entry.tails.entry(tail.to_string()).or_insert(0);
        Ok(())
    }

    /// Number of distinct heads seeded so far (test property 5).
    pub fn head_count(&self) -> usize {
        self.heads.len()
    }

    /// Number of distinct `(head, tail)` pairs seeded so far (test property 6).
    pub fn tail_count(&self) -> usize {
        self.heads.values().map(|e| e.tails.len()).sum()
    }

    /// Absolute file offset of the reserved tail record, if any was
    /// identified (set by [`RegionTable::set_reserved_tail_ptr`], which the
    /// Maker calls once a segment's [`Segment::is_reserved`] check fires).
    ///
    /// [`Segment::is_reserved`]: crate::segment::Segment::is_reserved
    pub fn reserved_tail_ptr(&self) -> Option<u32> {
        self.reserved_tail_ptr
    }

    /// Records the tail pointer for the reserved (private-IP) region, once
    /// the Maker has identified it via [`Segment::is_reserved`].
    ///
    /// [`Segment::is_reserved`]: crate::segment::Segment::is_reserved
    pub fn set_reserved_tail_ptr(&mut self, ptr: u32) {
        self.reserved_tail_ptr = Some(ptr);
    }

    /// Writes the head table followed by every tail record, freezing all
    /// pointers. Returns the region-head-start-ptr (the file position at
    /// entry). Iteration order over heads/tails is unspecified and must not
    /// leak into externally observable behavior.
    pub fn write<W: Write + Seek>(&mut self, w: &mut W) -> Result<u32, IgrError> {
        let region_head_start_ptr = w.stream_position()? as u32;

        // Pass 1: head table.
        let mut offset: u16 = 0;
        for (head, entry) in self.heads.iter_mut() {
            entry.head_offset = offset;

            let mut buf = Vec::with_capacity(1 + head.len());
            buf.push(head.len() as u8);
            buf.extend_from_slice(head.as_bytes());
            w.write_all(&buf)?;

            offset = offset
                .checked_add(buf.len() as u16)
                .ok_or(IgrError::OffsetOverflow { offset: offset as u32 + buf.len() as u32 })?;
        }
        debug!("region head table written: {} distinct heads", self.heads.len());

        // Pass 2: tail records, each `[head_offset_u16][tail_len_u8][tail_bytes]`.
        let mut total_tails = 0usize;
        for entry in self.heads.values_mut() {
            for (tail, ptr) in entry.tails.iter_mut() {
                let tail_ptr = w.stream_position()? as u32;

                let mut buf = vec![0u8; 3];
                LE::write_u16(&mut buf[0..2], entry.head_offset);
                buf[2] = tail.len() as u8;
                buf.extend_from_slice(tail.as_bytes());
                w.write_all(&buf)?;

                *ptr = tail_ptr;
                total_tails += 1;
            }
        }
        debug!("region tail records written: {}", total_tails);

        Ok(region_head_start_ptr)
    }

    /// Looks up the absolute tail pointer for a `(head, tail)` pair that was
    /// seeded before [`RegionTable::write`] ran.
    pub fn tail_ptr(&self, head: &str, tail: &str) -> Result<u32, IgrError> {
        self.heads
            .get(head)
            .and_then(|e| e.tails.get(tail))
            .copied()
            .ok_or_else(|| IgrError::MissingPointer {
                head: head.to_string(),
                tail: tail.to_string(),
            })
    }
}
