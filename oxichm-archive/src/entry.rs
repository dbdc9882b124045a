//! Directory entry metadata and archive statistics.

/// Section id of the uncompressed content section.
pub const SECTION_UNCOMPRESSED: u32 = 0;

/// Section id of the LZX-compressed content section.
pub const SECTION_COMPRESSED: u32 = 1;

/// Directory entry holding the serialized LZXC record.
pub const CONTROL_DATA_NAME: &str = "::DataSpace/Storage/MSCompressed/ControlData";

/// Directory entry holding the reset table record.
pub const RESET_TABLE_NAME: &str = "::DataSpace/Storage/MSCompressed/ResetTable";

/// Directory entry holding the LZX byte stream itself.
pub const CONTENT_NAME: &str = "::DataSpace/Storage/MSCompressed/Content";

/// One stored file: its name and where its bytes live.
///
/// For section 0 the offset addresses raw file bytes; for section 1 it is an
/// offset into the *uncompressed* stream of the LZX section, resolved through
/// the reset table at extraction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Stored name, normally starting with `/`.
    pub name: String,
    /// Content section id (0 = stored, 1 = LZX).
    pub section: u32,
    /// Offset within the section.
    pub offset: u64,
    /// Length within the section (equals the file's logical length).
    pub length: u64,
}

impl DirectoryEntry {
    /// Create an entry.
    pub fn new(name: impl Into<String>, section: u32, offset: u64, length: u64) -> Self {
        Self {
            name: name.into(),
            section,
            offset,
            length,
        }
    }

    /// Whether the entry lives in the LZX-compressed section.
    pub fn is_compressed(&self) -> bool {
        self.section == SECTION_COMPRESSED
    }

    /// Whether this is a `::`-prefixed bookkeeping entry rather than content.
    pub fn is_system(&self) -> bool {
        self.name.starts_with("::")
    }
}

/// What `stat` reports about one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    /// Whether the entry is LZX-compressed.
    pub compressed: bool,
    /// Logical length in bytes.
    pub length: u64,
    /// Content section id.
    pub section: u32,
}

/// Archive-level statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchiveInfo {
    /// Number of content entries (system entries excluded).
    pub file_count: usize,
    /// Sum of the content entries' logical lengths.
    pub total_uncompressed: u64,
    /// Bytes the content occupies on disk (stored bytes plus the LZX
    /// section).
    pub total_compressed: u64,
    /// `total_compressed / total_uncompressed`; 1.0 for an empty archive.
    pub ratio: f64,
}

impl ArchiveInfo {
    /// Space saved by compression, as a percentage.
    pub fn space_savings(&self) -> f64 {
        (1.0 - self.ratio) * 100.0
    }
}

/// Normalize a lookup or pack name: backslashes fold to `/`, runs of `/`
/// collapse, and a leading `/` is ensured.
pub fn normalize_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);
    result.push('/');
    let mut last_was_slash = true;
    for ch in name.chars() {
        let ch = if ch == '\\' { '/' } else { ch };
        if ch == '/' {
            if !last_was_slash {
                result.push('/');
            }
            last_was_slash = true;
        } else {
            result.push(ch);
            last_was_slash = false;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("index.html"), "/index.html");
        assert_eq!(normalize_name("/index.html"), "/index.html");
        assert_eq!(normalize_name("a\\b\\c.gif"), "/a/b/c.gif");
        assert_eq!(normalize_name("//docs///x.css"), "/docs/x.css");
        assert_eq!(normalize_name(""), "/");
    }

    #[test]
    fn test_entry_flags() {
        let entry = DirectoryEntry::new("/a.html", SECTION_COMPRESSED, 0, 10);
        assert!(entry.is_compressed());
        assert!(!entry.is_system());

        let meta = DirectoryEntry::new(RESET_TABLE_NAME, SECTION_UNCOMPRESSED, 40, 72);
        assert!(meta.is_system());
        assert!(!meta.is_compressed());
    }

    #[test]
    fn test_info_savings() {
        let info = ArchiveInfo {
            file_count: 2,
            total_uncompressed: 1000,
            total_compressed: 250,
            ratio: 0.25,
        };
        assert!((info.space_savings() - 75.0).abs() < 1e-9);
    }
}
