//! Builds the binary database from a textual segment list.
//!
//! Mirrors `original_source/maker/maker.go`'s `Maker`: one forward pass over
//! the destination file with the header and vector index back-patched at
//! the end. The debug `bycount` early return present in the original is
//! scaffolding (flagged in the source comments) and is not reproduced here.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{ByteOrder, LE};
use log::{debug, info};

use crate::error::IgrError;
use crate::format::{
    HeadType, Header, IndexPolicy, HEADER_INFO_LENGTH, REGION_INDEX_BLOCK_SIZE,
    RESERVED_HEAD_ADDR, RESERVED_TAIL_ADDR, VECTOR_INDEX_COLS, VECTOR_INDEX_LENGTH,
    VECTOR_INDEX_SIZE,
};
use crate::ip::{octet0, octet1, tail16};
use crate::region::RegionTable;
use crate::segment::Segment;

/// Build-time knobs, grouped the way a `Searcher`'s cache-policy choice is
/// (explicit constructor argument, no globals or env vars).
#[derive(Debug, Clone, Copy)]
pub struct MakerOptions {
    pub index_policy: IndexPolicy,
    pub head_type: HeadType,
    /// Fail the build if no reserved (`0|0|...|内网IP|内网IP`) entry was seeded.
    pub require_reserved: bool,
}

impl Default for MakerOptions {
    fn default() -> Self {
        MakerOptions {
            index_policy: IndexPolicy::VectorIndex,
            head_type: HeadType::NoArea,
            require_reserved: false,
        }
    }
}

/// Drives the offline build: `new` -> `init` -> `start` -> `close`.
pub struct Maker {
    src: File,
    dst: File,
    options: MakerOptions,
    segments: Vec<Segment>,
    vector_index: Vec<u8>,
}

impl Maker {
    /// Opens the source read-only and truncates/creates the destination,
    /// and preallocates the in-memory 512 KiB vector index buffer.
    pub fn new(
        options: MakerOptions,
        src_path: impl AsRef<Path>,
        dst_path: impl AsRef<Path>,
    ) -> Result<Self, IgrError> {
        let src = OpenOptions::new().read(true).open(src_path)?;
        let dst = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(dst_path)?;

        Ok(Maker {
            src,
            dst,
            options,
            segments: Vec::new(),
            vector_index: vec![0u8; VECTOR_INDEX_LENGTH as usize],
        })
    }

    /// Writes the zero-offset header and loads/validates all segments.
    pub fn init(&mut self) -> Result<(), IgrError> {
        info!("initializing db header");
        self.dst.seek(SeekFrom::Start(0))?;
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let header = Header::encode_initial(self.options.index_policy, created_at, self.options.head_type);
        self.dst.write_all(&header)?;

        self.load_segments()?;
        Ok(())
    }

    fn load_segments(&mut self) -> Result<(), IgrError> {
        info!("loading segments");
        let reader = BufReader::new(&mut self.src);
        let mut last: Option<(u32, u32)> = None;
        let mut count = 0usize;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end();
            debug!("load segment: `{line}`");

            let parts: Vec<&str> = line.splitn(3, '|').collect();
            if parts.len() != 3 {
                return Err(IgrError::InvalidLine {
                    line: line.to_string(),
                    reason: "expected `startIP|endIP|region`".to_string(),
                });
            }

            let start_ip = crate::ip::parse_ip(parts[0])?;
            let end_ip = crate::ip::parse_ip(parts[1])?;
            if start_ip > end_ip {
                return Err(IgrError::InvalidLine {
                    line: line.to_string(),
                    reason: "start ip must not be greater than end ip".to_string(),
                });
            }
            if parts[2].is_empty() {
                return Err(IgrError::InvalidLine {
                    line: line.to_string(),
                    reason: "empty region info".to_string(),
                });
            }

            let (head, tail) = Segment::head_and_tail(parts[2], self.options.head_type).ok_or_else(|| {
                IgrError::InvalidLine {
                    line: line.to_string(),
                    reason: "region must contain exactly four `|` separators".to_string(),
                }
            })?;

            if let Some((_, last_end)) = last {
                if last_end.checked_add(1) != Some(start_ip) {
                    return Err(IgrError::Discontinuous {
                        prev_end_plus1: last_end.wrapping_add(1),
                        next_start: start_ip,
                    });
                }
            }

            last = Some((start_ip, end_ip));
            self.segments.push(Segment {
                start_ip,
                end_ip,
                head,
                tail,
            });
            count += 1;
        }

        info!("all segments loaded, count: {count}");
        Ok(())
    }

    /// Runs the main build: region table, segment index, vector index, header.
    pub fn start(&mut self) -> Result<(), IgrError> {
        if self.segments.is_empty() {
            return Err(IgrError::EmptySegments);
        }

        self.dst
            .seek(SeekFrom::Start(HEADER_INFO_LENGTH + VECTOR_INDEX_LENGTH))?;

        info!("writing region table");
        let mut table = RegionTable::new();
        for seg in &self.segments {
            table.seed(&seg.head, &seg.tail)?;
        }
        let region_head_start_ptr = table.write(&mut self.dst)?;

        info!("writing segment index block");
        let mut start_index_ptr: Option<u32> = None;
        let mut end_index_ptr: u32 = 0;
        let mut counter = 0usize;

        for seg in &self.segments {
            let tail_ptr = table.tail_ptr(&seg.head, &seg.tail)?;
            if seg.is_reserved(RESERVED_HEAD_ADDR, RESERVED_TAIL_ADDR) {
                table.set_reserved_tail_ptr(tail_ptr);
            }

            for sub in seg.split() {
                let pos = self.dst.stream_position()? as u32;

                let mut buf = [0u8; 8];
                LE::write_u16(&mut buf[0..2], tail16(sub.start_ip));
                LE::write_u16(&mut buf[2..4], tail16(sub.end_ip));
                LE::write_u32(&mut buf[4..8], tail_ptr);
                self.dst.write_all(&buf)?;

                self.set_vector_index(sub.start_ip, pos);
                counter += 1;

                if start_index_ptr.is_none() {
                    start_index_ptr = Some(pos);
                }
                end_index_ptr = pos;
            }
        }
        let start_index_ptr = start_index_ptr.ok_or(IgrError::EmptySegments)?;

        if self.options.require_reserved && table.reserved_tail_ptr().is_none() {
            return Err(IgrError::ReservedRegionMissing);
        }

        info!("flushing vector index block");
        self.dst.seek(SeekFrom::Start(HEADER_INFO_LENGTH))?;
        self.dst.write_all(&self.vector_index)?;

        info!("back-patching header offsets");
        let patch = Header::encode_offsets(start_index_ptr, end_index_ptr, region_head_start_ptr);
        self.dst.seek(SeekFrom::Start(8))?;
        self.dst.write_all(&patch)?;
        self.dst.flush()?;

        info!(
            "write done, heads: {}, tails: {}, index records: {counter}, index ptr: ({start_index_ptr}, {end_index_ptr})",
            table.head_count(),
            table.tail_count(),
        );
        Ok(())
    }

    /// Back-patches the vector cell for `ip`'s `(octet0, octet1)`: the first
    /// write into a cell sets both pointers, later writes only extend the end.
    fn set_vector_index(&mut self, ip: u32, ptr: u32) {
        let o0 = octet0(ip);
        let o1 = octet1(ip);
        let idx = ((o0 * VECTOR_INDEX_COLS + o1) * VECTOR_INDEX_SIZE) as usize;

        let first_ptr = LE::read_u32(&self.vector_index[idx..idx + 4]);
        if first_ptr == 0 {
            LE::write_u32(&mut self.vector_index[idx..idx + 4], ptr);
        }
        LE::write_u32(
            &mut self.vector_index[idx + 4..idx + 8],
            ptr + REGION_INDEX_BLOCK_SIZE as u32,
        );
    }

    /// Releases both file handles.
    pub fn close(mut self) -> Result<(), IgrError> {
        self.dst.flush()?;
        Ok(())
    }
}
