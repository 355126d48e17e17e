//! Single-directory listing with the pruning policy applied.
//!
//! One `read_dir` pass yields both the subdirectories to recurse into and the
//! candidates to offer the matcher. Errors that mean "this subtree is not
//! reachable right now" turn into [`Listing::Pruned`]; anything else is
//! returned as a fatal [`SearchError::Io`].

use std::fs::{self, DirEntry, FileType};
use std::io;
use std::path::PathBuf;

use tracing::trace;

use crate::entry::{Entry, EntryKind, Target};
use crate::error::SearchError;

/// A directory scheduled for listing, with its depth below the search root.
#[derive(Debug, Clone)]
pub(crate) struct Dir {
    pub path: PathBuf,
    pub depth: usize,
}

impl Dir {
    pub fn root(path: PathBuf) -> Self {
        Self { path, depth: 0 }
    }
}

/// Result of listing one directory.
#[derive(Debug)]
pub(crate) enum Listing {
    /// At least one subdirectory.
    Children {
        subdirs: Vec<Dir>,
        candidates: Vec<Entry>,
    },

    /// No subdirectories; recursion stops here.
    Leaf { candidates: Vec<Entry> },

    /// The directory could not be opened. The subtree contributes nothing.
    Pruned,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct DirLister {
    target: Target,
    follow_links: bool,
}

impl DirLister {
    pub fn new(target: Target, follow_links: bool) -> Self {
        Self {
            target,
            follow_links,
        }
    }

    pub fn list(&self, dir: &Dir) -> Result<Listing, SearchError> {
        let read = match fs::read_dir(&dir.path) {
            Ok(read) => read,
            Err(e) if is_prunable(&e) => {
                trace!(path = %dir.path.display(), error = %e, "pruning unreadable directory");
                return Ok(Listing::Pruned);
            }
            Err(e) => return Err(SearchError::io(&dir.path, e)),
        };

        let depth = dir.depth + 1;
        let mut subdirs = Vec::new();
        let mut candidates = Vec::new();

        for item in read {
            let item = match item {
                Ok(item) => item,
                Err(e) if is_prunable(&e) => {
                    trace!(path = %dir.path.display(), error = %e, "skipping unreadable child");
                    continue;
                }
                Err(e) => return Err(SearchError::io(&dir.path, e)),
            };

            let ft = match item.file_type() {
                Ok(ft) => ft,
                Err(e) if is_prunable(&e) => continue,
                Err(e) => return Err(SearchError::io(item.path(), e)),
            };

            let is_dir = ft.is_dir() || (self.follow_links && ft.is_symlink() && points_to_dir(&item));

            let wanted = match self.target {
                Target::Files => !is_dir,
                Target::Directories => is_dir,
            };
            if wanted {
                if let Some(entry) = self.snapshot(&item, ft, is_dir, depth)? {
                    candidates.push(entry);
                }
            }

            if is_dir {
                subdirs.push(Dir {
                    path: item.path(),
                    depth,
                });
            }
        }

        Ok(if subdirs.is_empty() {
            Listing::Leaf { candidates }
        } else {
            Listing::Children {
                subdirs,
                candidates,
            }
        })
    }

    /// Build the [`Entry`] for a candidate. `Ok(None)` means it vanished or
    /// became unreadable between `read_dir` and `stat`.
    fn snapshot(
        &self,
        item: &DirEntry,
        ft: FileType,
        is_dir: bool,
        depth: usize,
    ) -> Result<Option<Entry>, SearchError> {
        let path = item.path();
        let followed = is_dir && ft.is_symlink();
        let metadata = if followed {
            fs::metadata(&path)
        } else {
            item.metadata()
        };
        let metadata = match metadata {
            Ok(m) => m,
            Err(e) if is_prunable(&e) => {
                trace!(path = %path.display(), error = %e, "skipping candidate without metadata");
                return Ok(None);
            }
            Err(e) => return Err(SearchError::io(path, e)),
        };

        let kind = if is_dir {
            EntryKind::Dir
        } else {
            EntryKind::from_file_type(ft)
        };

        Ok(Some(Entry {
            name: item.file_name().to_string_lossy().into_owned(),
            path,
            kind,
            depth,
            len: metadata.len(),
            created: metadata.created().ok(),
            modified: metadata.modified().ok(),
        }))
    }
}

fn points_to_dir(item: &DirEntry) -> bool {
    fs::metadata(item.path()).map(|m| m.is_dir()).unwrap_or(false)
}

/// Errors that prune a subtree instead of failing the search: access denied,
/// the directory vanished or was replaced, or the path got too long.
pub(crate) fn is_prunable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::NotFound
            | io::ErrorKind::NotADirectory
            | io::ErrorKind::InvalidFilename
            | io::ErrorKind::StaleNetworkFileHandle
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn names(entries: &[Entry]) -> Vec<String> {
        let mut v: Vec<_> = entries.iter().map(|e| e.name.clone()).collect();
        v.sort();
        v
    }

    #[test]
    fn leaf_carries_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();
        fs::write(tmp.path().join("b.txt"), "bb").unwrap();

        let lister = DirLister::new(Target::Files, false);
        match lister.list(&Dir::root(tmp.path().to_path_buf())).unwrap() {
            Listing::Leaf { candidates } => {
                assert_eq!(names(&candidates), ["a.txt", "b.txt"]);
                assert!(candidates.iter().all(|e| e.kind == EntryKind::File && e.depth == 1));
                let b = candidates.iter().find(|e| e.name == "b.txt").unwrap();
                assert_eq!(b.len, 2);
                assert!(b.modified.is_some());
            }
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn children_split_dirs_from_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("f.log"), "").unwrap();

        let lister = DirLister::new(Target::Files, false);
        match lister.list(&Dir::root(tmp.path().to_path_buf())).unwrap() {
            Listing::Children {
                subdirs,
                candidates,
            } => {
                assert_eq!(subdirs.len(), 1);
                assert_eq!(subdirs[0].depth, 1);
                assert!(subdirs[0].path.ends_with("sub"));
                assert_eq!(names(&candidates), ["f.log"]);
            }
            other => panic!("expected children, got {other:?}"),
        }
    }

    #[test]
    fn directory_target_offers_subdirs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("x")).unwrap();
        fs::create_dir(tmp.path().join("y")).unwrap();
        fs::write(tmp.path().join("f"), "").unwrap();

        let lister = DirLister::new(Target::Directories, false);
        match lister.list(&Dir::root(tmp.path().to_path_buf())).unwrap() {
            Listing::Children {
                subdirs,
                candidates,
            } => {
                assert_eq!(subdirs.len(), 2);
                assert_eq!(names(&candidates), ["x", "y"]);
                assert!(candidates.iter().all(Entry::is_dir));
            }
            other => panic!("expected children, got {other:?}"),
        }
    }

    #[test]
    fn missing_directory_is_pruned() {
        let tmp = tempfile::tempdir().unwrap();
        let lister = DirLister::new(Target::Files, false);
        let gone = Dir::root(tmp.path().join("gone"));
        assert!(matches!(lister.list(&gone).unwrap(), Listing::Pruned));
    }

    #[test]
    fn file_in_place_of_directory_is_pruned() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain");
        fs::write(&file, "").unwrap();
        let lister = DirLister::new(Target::Files, false);
        assert!(matches!(lister.list(&Dir::root(file)).unwrap(), Listing::Pruned));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_dirs_follow_only_when_asked() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("real");
        fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, tmp.path().join("link")).unwrap();

        let plain = DirLister::new(Target::Files, false);
        match plain.list(&Dir::root(tmp.path().to_path_buf())).unwrap() {
            Listing::Children {
                subdirs,
                candidates,
            } => {
                assert_eq!(subdirs.len(), 1);
                assert_eq!(names(&candidates), ["link"]);
                assert_eq!(candidates[0].kind, EntryKind::Symlink);
            }
            other => panic!("expected children, got {other:?}"),
        }

        let following = DirLister::new(Target::Files, true);
        match following.list(&Dir::root(tmp.path().to_path_buf())).unwrap() {
            Listing::Children {
                subdirs,
                candidates,
            } => {
                assert_eq!(subdirs.len(), 2);
                assert!(candidates.is_empty());
            }
            other => panic!("expected children, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn link_loop_is_a_fatal_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let looped = tmp.path().join("looped");
        std::os::unix::fs::symlink("looped", &looped).unwrap();

        let lister = DirLister::new(Target::Files, false);
        match lister.list(&Dir::root(looped.clone())) {
            Err(SearchError::Io { path, .. }) => assert_eq!(path, looped),
            other => panic!("expected an IO error, got {other:?}"),
        }
    }

    #[test]
    fn prunable_kinds() {
        assert!(is_prunable(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(is_prunable(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(!is_prunable(&io::Error::from(io::ErrorKind::Other)));
        assert!(!is_prunable(&io::Error::from(io::ErrorKind::UnexpectedEof)));
    }
}
