//! Property-based coverage from spec.md's testable-properties list: builds
//! a database with the public `Maker` API and checks it back with every
//! `Searcher` cache policy.

use igr::maker::{Maker, MakerOptions};
use igr::searcher::Searcher;
use std::io::Write;

fn build_db(lines: &[&str], options: MakerOptions) -> tempfile::TempPath {
    let mut src = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(src, "{line}").unwrap();
    }
    src.flush().unwrap();

    let dst = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let mut maker = Maker::new(options, src.path(), &dst).unwrap();
    maker.init().unwrap();
    maker.start().unwrap();
    maker.close().unwrap();
    dst
}

#[test]
fn round_trip_every_ip_in_range_resolves_to_its_region() {
    let dst = build_db(
        &["2.12.128.0|2.12.139.255|法国|0|Ille-et-Vilaine|0|橘子电信"],
        MakerOptions::default(),
    );

    let db = Searcher::open_memory(&dst).unwrap();
    for b2 in 128u8..=139 {
        let ip = format!("2.12.{b2}.7");
        let region = db.search_by_str(&ip).unwrap();
        assert_eq!(region, "法国|Ille-et-Vilaine|0|橘子电信");
    }
}

#[test]
fn splitting_preserves_range_and_confines_to_one_cell() {
    let dst = build_db(
        &["1.0.250.0|1.1.5.255|X|0|Y|C|I"],
        MakerOptions::default(),
    );

    let db = Searcher::open_memory(&dst).unwrap();
    assert_eq!(db.search_by_str("1.0.250.0").unwrap(), "X|Y|C|I");
    assert_eq!(db.search_by_str("1.1.5.255").unwrap(), "X|Y|C|I");
    assert_eq!(db.search_by_str("1.1.3.0").unwrap(), "X|Y|C|I");
}

#[test]
fn shared_head_and_tail_interning_resolves_both_segments() {
    let dst = build_db(
        &[
            "1.0.0.0|1.0.0.255|X|0|Y|C1|I1",
            "1.0.1.0|1.0.1.255|X|0|Y|C1|I1",
        ],
        MakerOptions::default(),
    );

    let db = Searcher::open_memory(&dst).unwrap();
    assert_eq!(db.search_by_str("1.0.0.5").unwrap(), "X|Y|C1|I1");
    assert_eq!(db.search_by_str("1.0.1.128").unwrap(), "X|Y|C1|I1");
}

#[test]
fn mode_equivalence_across_all_three_backings() {
    let dst = build_db(
        &[
            "1.0.0.0|1.0.0.255|X|0|Y|C1|I1",
            "1.0.1.0|1.0.1.255|X|0|Y|C2|I2",
            "2.12.128.0|2.12.139.255|法国|0|Ille-et-Vilaine|0|橘子电信",
        ],
        MakerOptions::default(),
    );

    let file_db = Searcher::open_file(&dst).unwrap();
    let vector_db = Searcher::open_vector_cached(&dst).unwrap();
    let memory_db = Searcher::open_memory(&dst).unwrap();

    for ip in ["1.0.0.5", "1.0.1.200", "2.12.133.0", "2.12.139.255"] {
        let a = file_db.search_by_str(ip).unwrap();
        let b = vector_db.search_by_str(ip).unwrap();
        let c = memory_db.search_by_str(ip).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }
}

#[test]
fn file_mode_full_search_bounds_io_count_to_five() {
    let mut lines = Vec::new();
    for i in 0u32..64 {
        let start = i * 256;
        lines.push(format!(
            "1.0.{}.0|1.0.{}.255|X|0|Y|C{i}|I{i}",
            start / 256,
            start / 256
        ));
    }
    let lines_ref: Vec<&str> = lines.iter().map(String::as_str).collect();
    let dst = build_db(&lines_ref, MakerOptions::default());

    let db = Searcher::open_file(&dst).unwrap();
    db.search_by_str("1.0.10.5").unwrap();
    assert!(db.io_count() <= 5, "io_count was {}", db.io_count());
}

#[test]
fn unmatched_ip_miss_resolution_not_found_is_the_default() {
    let dst = build_db(&["1.0.0.0|1.0.0.255|X|0|Y|C|I"], MakerOptions::default());

    let db = Searcher::open_memory(&dst).unwrap();
    let err = db.search_by_str("8.8.8.8").unwrap_err();
    assert!(matches!(err, igr::IgrError::NotFound));
}

#[test]
fn unmatched_ip_miss_resolution_empty_returns_empty_string() {
    use igr::searcher::{MissResolution, SearcherOptions};

    let dst = build_db(&["1.0.0.0|1.0.0.255|X|0|Y|C|I"], MakerOptions::default());

    let options = SearcherOptions {
        on_miss: MissResolution::Empty,
        ..SearcherOptions::default()
    };
    let db = Searcher::open_memory_with_options(&dst, options).unwrap();
    assert_eq!(db.search_by_str("8.8.8.8").unwrap(), "");
}

#[test]
fn builder_rejects_discontinuous_segments_end_to_end() {
    let mut src = tempfile::NamedTempFile::new().unwrap();
    writeln!(src, "1.0.0.0|1.0.0.255|X|0|Y|C|I").unwrap();
    writeln!(src, "1.0.2.0|1.0.2.255|X|0|Y|C|I").unwrap();
    src.flush().unwrap();

    let dst = tempfile::NamedTempFile::new().unwrap();
    let mut maker = Maker::new(MakerOptions::default(), src.path(), dst.path()).unwrap();
    let err = maker.init().unwrap_err();
    assert!(matches!(err, igr::IgrError::Discontinuous { .. }));
}
