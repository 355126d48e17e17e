use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A single filesystem entry found during a search.
///
/// An immutable snapshot taken when the parent directory was listed. Entries
/// are not re-validated later: a file may have been removed by the time an
/// observer sees it.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Full path to the entry.
    pub path: PathBuf,

    /// The final path component.
    pub name: String,

    /// What kind of entry this is.
    pub kind: EntryKind,

    /// Depth below the search root. Direct children of the root are at 1.
    pub depth: usize,

    /// Size in bytes as reported by the OS. Zero for directories on most
    /// platforms.
    pub len: u64,

    /// Creation time, when the platform exposes it.
    pub created: Option<SystemTime>,

    /// Last modification time.
    pub modified: Option<SystemTime>,
}

impl Entry {
    /// File extension, if any.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// The kind of a traversed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A regular file.
    File,

    /// A directory.
    Dir,

    /// A symbolic link that was not followed.
    Symlink,

    /// Anything else (device files, pipes, sockets, etc.).
    Other,
}

impl EntryKind {
    pub(crate) fn from_file_type(ft: std::fs::FileType) -> Self {
        if ft.is_dir() {
            Self::Dir
        } else if ft.is_file() {
            Self::File
        } else if ft.is_symlink() {
            Self::Symlink
        } else {
            Self::Other
        }
    }
}

/// Which children of a directory are offered to the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// Every child that is not a directory.
    #[default]
    Files,

    /// Subdirectories only.
    Directories,
}

/// Matches found directly under one directory in one listing call.
///
/// Always delivered whole and never empty.
#[derive(Debug, Clone)]
pub struct MatchBatch {
    dir: PathBuf,
    entries: Vec<Entry>,
}

impl MatchBatch {
    pub(crate) fn new(dir: PathBuf, entries: Vec<Entry>) -> Self {
        debug_assert!(!entries.is_empty());
        Self { dir, entries }
    }

    /// The directory the entries were listed from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a MatchBatch {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
