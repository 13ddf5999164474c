//! Two-level lookup over the binary database, in three backing modes.
//!
//! Mirrors `original_source/xdb/searcher.go`'s `Searcher`: a vector-index
//! dispatch by `(octet0, octet1)` followed by a binary search over segment
//! index records. `Backing` is the sum type the design notes call for in
//! place of the original's nullable-field style (`vectorIndex`/`contentBuff`
//! both present, mutually exclusive) — exactly one variant is live per
//! instance and every read dispatches through a single match, not a trait
//! object.
//!
//! File-mode and vector-cached-mode reads share one file handle behind a
//! [`RefCell`]: the seek-then-read pair is not atomic, so two threads
//! calling [`Searcher::search`] on the same handle can interleave and read
//! garbage — exactly the hazard spec.md documents for the original's shared
//! `*os.File`. Full-memory mode touches no handle and no interior
//! mutability beyond the io-count counter, so it is safe to call from
//! multiple threads as long as each thread owns (or is lent) its own
//! `Searcher` value; there is no compile-time `Send`/`Sync` distinction
//! between the modes here, matching the original's runtime-only discipline.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{ByteOrder, LE};

use crate::error::IgrError;
use crate::format::{
    vector_cell_offset, Header, HEADER_INFO_LENGTH, REGION_BASE_BLOCK_SIZE, REGION_BLOCK_INFO_SIZE,
    REGION_INDEX_BLOCK_SIZE, REGION_STR_SEP, RESERVED_HEAD_ADDR, RESERVED_TAIL_ADDR,
    VECTOR_INDEX_COLS, VECTOR_INDEX_LENGTH, VECTOR_INDEX_ROWS, VECTOR_INDEX_SIZE,
};
use crate::ip::{octet0, octet1, parse_ip, tail16};

/// Which cache policy a [`Searcher`] was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    File,
    Vector,
    Memory,
}

/// What to return when an IP falls in a vector cell with no segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissResolution {
    /// Return [`IgrError::NotFound`].
    #[default]
    NotFound,
    /// Return an empty string.
    Empty,
    /// Serve the database's reserved/private-IP region, if one was built in.
    Reserved,
}

/// Build-independent knobs: whether to fetch the full tail on a >64B tail,
/// and what to do on a miss.
#[derive(Debug, Clone, Copy)]
pub struct SearcherOptions {
    /// `true` (default) performs the extra read needed for tails over 64
    /// bytes; `false` accepts the truncated tail and saves the read.
    pub full_search: bool,
    pub on_miss: MissResolution,
}

impl Default for SearcherOptions {
    fn default() -> Self {
        SearcherOptions {
            full_search: true,
            on_miss: MissResolution::default(),
        }
    }
}

enum Backing {
    File(RefCell<File>),
    VectorCached {
        handle: RefCell<File>,
        vector_index: Vec<u8>,
    },
    Memory(Vec<u8>),
}

/// Opened database handle: `open_* -> (repeated search) -> drop`.
pub struct Searcher {
    backing: Backing,
    header: Header,
    io_count: Cell<u64>,
    options: SearcherOptions,
    reserved_tail_ptr: Option<u32>,
}

impl Searcher {
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self, IgrError> {
        Self::open_file_with_options(path, SearcherOptions::default())
    }

    pub fn open_file_with_options(path: impl AsRef<Path>, options: SearcherOptions) -> Result<Self, IgrError> {
        let mut handle = File::open(path)?;
        let header = read_header_from_file(&mut handle)?;
        let mut searcher = Searcher {
            backing: Backing::File(RefCell::new(handle)),
            header,
            io_count: Cell::new(0),
            options,
            reserved_tail_ptr: None,
        };
        searcher.reserved_tail_ptr = searcher.maybe_locate_reserved();
        Ok(searcher)
    }

    pub fn open_vector_cached(path: impl AsRef<Path>) -> Result<Self, IgrError> {
        Self::open_vector_cached_with_options(path, SearcherOptions::default())
    }

    pub fn open_vector_cached_with_options(
        path: impl AsRef<Path>,
        options: SearcherOptions,
    ) -> Result<Self, IgrError> {
        let mut handle = File::open(path)?;
        let header = read_header_from_file(&mut handle)?;

        let mut vector_index = vec![0u8; VECTOR_INDEX_LENGTH as usize];
        read_exact_checked(&mut handle, HEADER_INFO_LENGTH, &mut vector_index)?;

        let mut searcher = Searcher {
            backing: Backing::VectorCached {
                handle: RefCell::new(handle),
                vector_index,
            },
            header,
            io_count: Cell::new(0),
            options,
            reserved_tail_ptr: None,
        };
        searcher.reserved_tail_ptr = searcher.maybe_locate_reserved();
        Ok(searcher)
    }

    pub fn open_memory(path: impl AsRef<Path>) -> Result<Self, IgrError> {
        Self::open_memory_with_options(path, SearcherOptions::default())
    }

    pub fn open_memory_with_options(path: impl AsRef<Path>, options: SearcherOptions) -> Result<Self, IgrError> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let header = Header::decode(&data)?;

        let mut searcher = Searcher {
            backing: Backing::Memory(data),
            header,
            io_count: Cell::new(0),
            options,
            reserved_tail_ptr: None,
        };
        searcher.reserved_tail_ptr = searcher.maybe_locate_reserved();
        Ok(searcher)
    }

    /// Number of file reads performed during the most recent [`Searcher::search`].
    pub fn io_count(&self) -> u64 {
        self.io_count.get()
    }

    /// Which backing mode this handle was opened with.
    pub fn cache_policy(&self) -> CachePolicy {
        match &self.backing {
            Backing::File(_) => CachePolicy::File,
            Backing::VectorCached { .. } => CachePolicy::Vector,
            Backing::Memory(_) => CachePolicy::Memory,
        }
    }

    pub fn full_search(&self) -> bool {
        self.options.full_search
    }

    pub fn set_full_search(&mut self, full: bool) {
        self.options.full_search = full;
    }

    /// Parses `s` as a dotted-quad IP and looks it up.
    pub fn search_by_str(&self, s: &str) -> Result<String, IgrError> {
        self.search(parse_ip(s)?)
    }

    /// Looks up the region for `ip`.
    pub fn search(&self, ip: u32) -> Result<String, IgrError> {
        self.io_count.set(0);

        match self.find_tail_ptr(ip)? {
            Some(tail_ptr) => {
                let (head, tail) = self.resolve_parts(tail_ptr)?;
                Ok(join_region(&head, &tail))
            }
            None => self.handle_miss(),
        }
    }

    fn handle_miss(&self) -> Result<String, IgrError> {
        match self.options.on_miss {
            MissResolution::NotFound => Err(IgrError::NotFound),
            MissResolution::Empty => Ok(String::new()),
            MissResolution::Reserved => match self.reserved_tail_ptr {
                Some(ptr) => {
                    let (head, tail) = self.resolve_parts(ptr)?;
                    Ok(join_region(&head, &tail))
                }
                None => Err(IgrError::NotFound),
            },
        }
    }

    /// Vector-cell dispatch + binary search over the segment index block,
    /// per spec.md §4.5 steps 2-4.
    fn find_tail_ptr(&self, ip: u32) -> Result<Option<u32>, IgrError> {
        let (s_ptr, e_ptr) = self.vector_cell(octet0(ip), octet1(ip))?;
        if s_ptr == 0 && e_ptr == 0 {
            return Ok(None);
        }

        let needle = tail16(ip);
        let mut l: i64 = 0;
        let mut h: i64 = ((e_ptr - s_ptr) / REGION_INDEX_BLOCK_SIZE as u32) as i64;
        let mut buf = [0u8; 8];

        while l <= h {
            let m = (l + h) / 2;
            let p = s_ptr as u64 + (m as u64) * REGION_INDEX_BLOCK_SIZE;
            self.read_into(p, &mut buf)?;

            let start_tail = LE::read_u16(&buf[0..2]);
            if needle < start_tail {
                h = m - 1;
                continue;
            }
            let end_tail = LE::read_u16(&buf[2..4]);
            if needle > end_tail {
                l = m + 1;
                continue;
            }
            return Ok(Some(LE::read_u32(&buf[4..8])));
        }

        Ok(None)
    }

    /// Reads the tail record (and head record) at `tail_ptr`, per spec.md
    /// §4.5 steps 5-8.
    fn resolve_parts(&self, tail_ptr: u32) -> Result<(String, String), IgrError> {
        let read_len = REGION_BASE_BLOCK_SIZE + REGION_BLOCK_INFO_SIZE;
        let mut region_buf = vec![0u8; read_len];
        self.read_into(tail_ptr as u64, &mut region_buf)?;

        let head_offset = LE::read_u16(&region_buf[0..2]) as u64;
        let (tail_slice, missing_len) = parse_dynamic_bytes(&region_buf[2..]);
        let mut tail_bytes = tail_slice.to_vec();
        if self.options.full_search && missing_len > 0 {
            let mut missing = vec![0u8; missing_len];
            self.read_into(tail_ptr as u64 + read_len as u64, &mut missing)?;
            tail_bytes.extend_from_slice(&missing);
        }

        let mut head_buf = vec![0u8; REGION_BASE_BLOCK_SIZE];
        self.read_into(
            self.header.region_head_start_ptr as u64 + head_offset,
            &mut head_buf,
        )?;
        let (head_slice, _) = parse_dynamic_bytes(&head_buf);

        Ok((
            String::from_utf8_lossy(head_slice).into_owned(),
            String::from_utf8_lossy(&tail_bytes).into_owned(),
        ))
    }

    fn vector_cell(&self, o0: u32, o1: u32) -> Result<(u32, u32), IgrError> {
        let idx = ((o0 * VECTOR_INDEX_COLS + o1) * VECTOR_INDEX_SIZE) as usize;
        match &self.backing {
            Backing::Memory(data) => {
                let base = HEADER_INFO_LENGTH as usize + idx;
                Ok((
                    LE::read_u32(&data[base..base + 4]),
                    LE::read_u32(&data[base + 4..base + 8]),
                ))
            }
            Backing::VectorCached { vector_index, .. } => Ok((
                LE::read_u32(&vector_index[idx..idx + 4]),
                LE::read_u32(&vector_index[idx + 4..idx + 8]),
            )),
            Backing::File(_) => {
                let mut buf = [0u8; 8];
                self.read_into(vector_cell_offset(o0, o1), &mut buf)?;
                Ok((LE::read_u32(&buf[0..4]), LE::read_u32(&buf[4..8])))
            }
        }
    }

    fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<(), IgrError> {
        match &self.backing {
            Backing::Memory(data) => {
                let start = offset as usize;
                let end = start
                    .checked_add(buf.len())
                    .filter(|&e| e <= data.len())
                    .ok_or(IgrError::ShortRead {
                        offset,
                        expected: buf.len(),
                        got: data.len().saturating_sub(start),
                    })?;
                buf.copy_from_slice(&data[start..end]);
                Ok(())
            }
            Backing::VectorCached { handle, .. } | Backing::File(handle) => {
                let mut h = handle.borrow_mut();
                self.io_count.set(self.io_count.get() + 1);
                read_exact_checked(&mut h, offset, buf)
            }
        }
    }

    /// Scans the vector index for a cell whose head/tail strings begin with
    /// the reserved-region literals, and caches its tail pointer. Only run
    /// at open time when [`MissResolution::Reserved`] is requested.
    fn maybe_locate_reserved(&self) -> Option<u32> {
        if self.options.on_miss != MissResolution::Reserved {
            return None;
        }

        for o0 in 0u32..VECTOR_INDEX_ROWS {
            for o1 in 0u32..VECTOR_INDEX_COLS {
                let (s_ptr, e_ptr) = self.vector_cell(o0, o1).ok()?;
                if s_ptr == 0 && e_ptr == 0 {
                    continue;
                }
                let mut buf = [0u8; 8];
                if self.read_into(s_ptr as u64, &mut buf).is_err() {
                    continue;
                }
                let tail_ptr = LE::read_u32(&buf[4..8]);
                if let Ok((head, tail)) = self.resolve_parts(tail_ptr) {
                    if head.starts_with(RESERVED_HEAD_ADDR) && tail.starts_with(RESERVED_TAIL_ADDR) {
                        return Some(tail_ptr);
                    }
                }
            }
        }
        None
    }
}

fn join_region(head: &str, tail: &str) -> String {
    format!("{head}{REGION_STR_SEP}{tail}")
}

/// Reads `len = buf[0]`; returns the slice of up to `len` available bytes
/// and the count of bytes that could not fit (for the optional follow-up
/// read of a >64B tail).
fn parse_dynamic_bytes(buf: &[u8]) -> (&[u8], usize) {
    let len = buf[0] as usize;
    let avail = buf.len() - 1;
    let take = len.min(avail);
    let missing = len.saturating_sub(avail);
    (&buf[1..1 + take], missing)
}

fn read_header_from_file(handle: &mut File) -> Result<Header, IgrError> {
    let mut buf = vec![0u8; HEADER_INFO_LENGTH as usize];
    read_exact_checked(handle, 0, &mut buf)?;
    Header::decode(&buf)
}

fn read_exact_checked(handle: &mut File, offset: u64, buf: &mut [u8]) -> Result<(), IgrError> {
    handle.seek(SeekFrom::Start(offset))?;
    match handle.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(IgrError::ShortRead {
            offset,
            expected: buf.len(),
            got: 0,
        }),
        Err(e) => Err(IgrError::IoError(e)),
    }
}

/// Reads a 256-byte header from any byte source, per spec.md §4.6.
pub fn load_header(bytes: &[u8]) -> Result<Header, IgrError> {
    Header::decode(bytes)
}
