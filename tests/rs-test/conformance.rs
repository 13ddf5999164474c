//! The six end-to-end scenarios from spec.md's conformance table, run in
//! full-head mode (`HeadType::All`) so expected strings match verbatim.

use igr::format::HeadType;
use igr::maker::{Maker, MakerOptions};
use igr::searcher::Searcher;
use std::io::Write;

fn options_all_head() -> MakerOptions {
    MakerOptions {
        head_type: HeadType::All,
        ..MakerOptions::default()
    }
}

fn build_db(lines: &[&str]) -> tempfile::TempPath {
    let mut src = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(src, "{line}").unwrap();
    }
    src.flush().unwrap();

    let dst = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let mut maker = Maker::new(options_all_head(), src.path(), &dst).unwrap();
    maker.init().unwrap();
    maker.start().unwrap();
    maker.close().unwrap();
    dst
}

#[test]
fn scenario_1_basic_interior_hit() {
    let dst = build_db(&["2.12.128.0|2.12.139.255|法国|0|Ille-et-Vilaine|0|橘子电信"]);
    let db = Searcher::open_memory(&dst).unwrap();
    assert_eq!(
        db.search_by_str("2.12.133.0").unwrap(),
        "法国|0|Ille-et-Vilaine|0|橘子电信"
    );
}

#[test]
fn scenario_2_upper_boundary_is_inclusive() {
    let dst = build_db(&["2.12.128.0|2.12.139.255|法国|0|Ille-et-Vilaine|0|橘子电信"]);
    let db = Searcher::open_memory(&dst).unwrap();
    assert_eq!(
        db.search_by_str("2.12.139.255").unwrap(),
        "法国|0|Ille-et-Vilaine|0|橘子电信"
    );
}

#[test]
fn scenario_3_reserved_private_range() {
    let dst = build_db(&["0.0.0.0|0.255.255.255|0|0|0|内网IP|内网IP"]);
    let db = Searcher::open_memory(&dst).unwrap();
    assert_eq!(db.search_by_str("0.1.2.3").unwrap(), "0|0|0|内网IP|内网IP");
}

#[test]
fn scenario_4_shared_interning_across_consecutive_segments() {
    let dst = build_db(&[
        "1.0.0.0|1.0.0.255|X|0|Y|C1|I1",
        "1.0.1.0|1.0.1.255|X|0|Y|C1|I1",
    ]);
    let db = Searcher::open_memory(&dst).unwrap();
    assert_eq!(db.search_by_str("1.0.1.128").unwrap(), "X|0|Y|C1|I1");
}

#[test]
fn scenario_5_split_reaches_second_vector_cell() {
    let dst = build_db(&["1.0.250.0|1.1.5.255|X|0|Y|C|I"]);
    let db = Searcher::open_memory(&dst).unwrap();
    assert_eq!(db.search_by_str("1.1.3.0").unwrap(), "X|0|Y|C|I");
}

#[test]
fn scenario_6_malformed_ip_is_rejected_at_build_time() {
    let mut src = tempfile::NamedTempFile::new().unwrap();
    writeln!(src, "1.2.3.4|abc|X|0|Y|C|I").unwrap();
    src.flush().unwrap();
    let dst = tempfile::NamedTempFile::new().unwrap();

    let mut maker = Maker::new(options_all_head(), src.path(), dst.path()).unwrap();
    let err = maker.init().unwrap_err();
    assert!(matches!(err, igr::IgrError::InvalidIP { .. }));
}
