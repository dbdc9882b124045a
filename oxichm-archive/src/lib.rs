//! # OxiChm Archive
//!
//! Reading and writing of Microsoft Compiled HTML Help (CHM) archives.
//!
//! A CHM file is a single-file virtual filesystem: three fixed headers
//! (ITSF, ITSP, LZXC), a chunked directory B-tree (PMGL/PMGI), an
//! uncompressed content section, and an LZX-compressed content section
//! indexed by a reset table so individual files can be extracted without
//! decoding the whole archive.
//!
//! ## Reading
//!
//! ```no_run
//! use oxichm_archive::ChmReader;
//!
//! let mut chm = ChmReader::open_path("manual.chm").unwrap();
//! for name in chm.names().map(String::from).collect::<Vec<_>>() {
//!     let stat = chm.stat(&name).unwrap();
//!     println!("{}: {} bytes (compressed: {})", name, stat.length, stat.compressed);
//! }
//! let page = chm.extract("/index.html").unwrap();
//! println!("{} bytes", page.len());
//! ```
//!
//! ## Writing
//!
//! ```
//! use oxichm_archive::{pack, ChmReader, PackOptions};
//!
//! let mut out: Vec<u8> = Vec::new();
//! pack(
//!     vec![("/index.html", b"<html>hello</html>".as_slice())],
//!     &mut out,
//!     &PackOptions::default(),
//! )
//! .unwrap();
//!
//! let mut chm = ChmReader::open(out).unwrap();
//! assert_eq!(chm.extract("/index.html").unwrap(), b"<html>hello</html>");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod directory;
pub mod entry;
pub mod header;
pub mod reader;
pub mod reset_table;
pub mod writer;

// Re-exports
pub use entry::{normalize_name, ArchiveInfo, DirectoryEntry, EntryStat};
pub use header::{ItsfHeader, ItspHeader, LzxcHeader};
pub use reader::{ChmReader, OpenOptions};
pub use reset_table::{ResetEntry, ResetTable};
pub use writer::{pack, PackOptions};
