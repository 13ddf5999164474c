//! Offline IPv4-to-region lookup: a binary database [`maker::Maker`] and a
//! microsecond [`searcher::Searcher`], sharing one bit-exact file format.
//!
//! ```no_run
//! use igr::maker::{Maker, MakerOptions};
//! use igr::searcher::Searcher;
//!
//! # fn build() -> Result<(), igr::error::IgrError> {
//! let mut maker = Maker::new(MakerOptions::default(), "segments.txt", "region.igrdb")?;
//! maker.init()?;
//! maker.start()?;
//! maker.close()?;
//!
//! let db = Searcher::open_memory("region.igrdb")?;
//! let region = db.search_by_str("1.2.3.4")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod format;
pub mod ip;
pub mod maker;
pub mod region;
pub mod searcher;
pub mod segment;

pub use error::IgrError;
pub use format::{HeadType, IndexPolicy};
pub use maker::{Maker, MakerOptions};
pub use searcher::{CachePolicy, MissResolution, Searcher, SearcherOptions};
