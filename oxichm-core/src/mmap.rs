//! Memory-mapped file access for the read facade.
//!
//! Opening a CHM for extraction is a random-access workload: headers at the
//! front, directory chunks in the middle, compressed spans wherever the reset
//! table points. A read-only memory mapping lets the OS page that in on
//! demand without an explicit buffering layer.
//!
//! # Safety
//!
//! Memory-mapped files can observe concurrent modification of the underlying
//! file by other processes. The mapping here is read-only, which keeps the
//! failure mode to seeing inconsistent bytes (and therefore a parse error)
//! rather than undefined behavior in safe code paths.

use crate::error::{ChmError, Result};
use crate::traits::ByteSource;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// A read-only memory-mapped file implementing [`ByteSource`].
#[derive(Debug)]
pub struct MmapSource {
    /// The memory-mapped file data.
    mmap: Mmap,
}

impl MmapSource {
    /// Open a file and map it read-only.
    ///
    /// # Errors
    ///
    /// Returns [`ChmError::Io`] if the file cannot be opened or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_file(&file)
    }

    /// Map an already-open file read-only.
    pub fn from_file(file: &File) -> Result<Self> {
        // SAFETY: the mapping is read-only; see the module docs for the
        // concurrent-modification caveat.
        let mmap = unsafe { Mmap::map(file)? };
        Ok(Self { mmap })
    }

    /// Borrow the whole mapping as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| ChmError::end_of_stream(buf.len() * 8))?;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.mmap.len())
            .ok_or_else(|| ChmError::end_of_stream(buf.len() * 8))?;
        buf.copy_from_slice(&self.mmap[start..end]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_mmap_source_reads() {
        let dir = std::env::temp_dir();
        let path = dir.join("oxichm_mmap_source_test.bin");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(b"ITSF....payload").unwrap();
        }

        let source = MmapSource::open(&path).unwrap();
        assert_eq!(ByteSource::len(&source), 15);

        let mut sig = [0u8; 4];
        source.read_at(0, &mut sig).unwrap();
        assert_eq!(&sig, b"ITSF");

        let mut tail = [0u8; 7];
        source.read_at(8, &mut tail).unwrap();
        assert_eq!(&tail, b"payload");

        assert!(source.read_at(10, &mut tail).is_err());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MmapSource::open("/nonexistent/oxichm.chm"),
            Err(ChmError::Io(_))
        ));
    }
}
