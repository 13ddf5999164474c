//! Crate-wide error type shared by the maker and searcher engines.

use thiserror::Error;

/// All failure modes surfaced by this crate.
///
/// Every variant carries enough context (offset, line, field) for the
/// caller to locate the offending input without re-deriving it.
#[derive(Error, Debug)]
pub enum IgrError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid IP `{input}`")]
    InvalidIP { input: String },

    #[error("invalid segment line `{line}`: {reason}")]
    InvalidLine { line: String, reason: String },

    #[error("discontinuous data segment: previous end+1 ({prev_end_plus1}) != next start ({next_start})")]
    Discontinuous {
        prev_end_plus1: u32,
        next_start: u32,
    },

    #[error("region `{field}` too long ({len}B): must be {limit}")]
    RegionTooLong {
        field: &'static str,
        len: usize,
        limit: &'static str,
    },

    #[error("region head table offset overflowed: {offset}")]
    OffsetOverflow { offset: u32 },

    #[error("missing interned pointer for region `{head}|{tail}`")]
    MissingPointer { head: String, tail: String },

    #[error("short read at offset {offset}: expected {expected} bytes, got {got}")]
    ShortRead {
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("no region found for the given IP")]
    NotFound,

    #[error("reserved region (`0|0|...|内网IP|内网IP`) was never seeded but is required")]
    ReservedRegionMissing,

    #[error("empty segment list")]
    EmptySegments,
}
