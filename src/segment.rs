//! A contiguous IPv4 range sharing one region, and its per-cell split.

use crate::format::HeadType;
use crate::ip::{format_ip, octet0, octet1, IP_TAIL_PATTERN};

/// One input line: an inclusive IP range plus its already-factored region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start_ip: u32,
    pub end_ip: u32,
    pub head: String,
    pub tail: String,
}

impl Segment {
    /// Factors a raw `country|zone|province|city|isp` region string into
    /// `(head, tail)` per the configured [`HeadType`].
    ///
    /// `head` is either `country|province` (`NoArea`) or
    /// `country|zone|province` (`All`); `tail` is always `city|isp`.
    pub fn head_and_tail(region: &str, head_type: HeadType) -> Option<(String, String)> {
        let pieces: Vec<&str> = region.splitn(4, '|').collect();
        if pieces.len() != 4 {
            return None;
        }

        let head = match head_type {
            HeadType::All => pieces[..3].join("|"),
            HeadType::NoArea => format!("{}|{}", pieces[0], pieces[2]),
        };

        Some((head, pieces[3].to_string()))
    }

    /// True when this segment fully covers one or more vector cells and its
    /// head/tail identify it as a reserved/internal-IP range.
    pub fn is_reserved(&self, reserved_head: &str, reserved_tail: &str) -> bool {
        self.start_ip & IP_TAIL_PATTERN == 0
            && self.end_ip & IP_TAIL_PATTERN == IP_TAIL_PATTERN
            && self.head.starts_with(reserved_head)
            && self.tail.starts_with(reserved_tail)
    }

    /// Splits this segment into sub-segments each confined to a single
    /// `(octet0, octet1)` vector cell, preserving order and exhaustiveness.
    pub fn split(&self) -> Vec<Segment> {
        // Pass 1: split on octet0 transitions.
        let mut first_pass = Vec::new();
        let (s_byte0, e_byte0) = (octet0(self.start_ip), octet0(self.end_ip));
        let mut next_start = self.start_ip;
        for i in s_byte0..=e_byte0 {
            let sip = (i << 24) | (next_start & 0x00FF_FFFF);
            let mut eip = (i << 24) | 0x00FF_FFFF;
            if eip < self.end_ip {
                next_start = (i + 1) << 24;
            } else {
                eip = self.end_ip;
            }
            first_pass.push((sip, eip));
        }

        // Pass 2: split each first-pass fragment on octet1 transitions.
        let mut out = Vec::new();
        for (sip0, eip0) in first_pass {
            let base = sip0 & 0xFF00_0000;
            let mut next_start = sip0;
            let (s_byte1, e_byte1) = (octet1(sip0), octet1(eip0));
            for i in s_byte1..=e_byte1 {
                let sip = base | (i << 16) | (next_start & 0xFFFF);
                let mut eip = base | (i << 16) | 0xFFFF;
                if eip < eip0 {
                    next_start = 0;
                } else {
                    eip = eip0;
                }
                out.push(Segment {
                    start_ip: sip,
                    end_ip: eip,
                    head: self.head.clone(),
                    tail: self.tail.clone(),
                });
            }
        }

        out
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            format_ip(self.start_ip),
            format_ip(self.end_ip),
            self.head,
            self.tail
        )
    }
}
