//! Local filesystem enumeration
//!
//! [`LocalLister::enumerate`] lists one directory for the crawler: every
//! sub-directory is handed back for crawling and every other entry is
//! emitted as a [`LocalEntry`]. Symlinks are reported as entries unless
//! `follow_symlinks` is set, in which case links to directories are crawled
//! with no cycle detection.

use crate::crawler::Discovery;
use crate::error::ListError;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A directory waiting to be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDir {
    /// Full path of the directory
    pub path: PathBuf,

    /// Depth from root (0 = root)
    pub depth: usize,
}

impl LocalDir {
    /// Create a new directory task
    pub fn new(path: impl Into<PathBuf>, depth: usize) -> Self {
        Self {
            path: path.into(),
            depth,
        }
    }

    /// Create the root task
    pub fn root(path: impl Into<PathBuf>) -> Self {
        Self::new(path, 0)
    }
}

/// Kind of a non-directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Symlink,
    /// Sockets, fifos, devices
    Other,
}

/// A non-directory entry found while crawling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Size in bytes (0 for anything but regular files)
    pub size: u64,
    /// Depth of the entry (children of the root have depth 1)
    pub depth: usize,
}

/// Lists local directories for the crawler
#[derive(Debug, Clone, Default)]
pub struct LocalLister {
    max_depth: Option<usize>,
    exclude_patterns: Vec<Regex>,
    follow_symlinks: bool,
}

impl LocalLister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not descend into directories deeper than `max_depth`
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Skip any entry whose path matches one of these patterns
    pub fn with_exclude_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Check if a path should be excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }
        let path = path.to_string_lossy();
        self.exclude_patterns.iter().any(|re| re.is_match(&path))
    }

    /// List one directory
    ///
    /// Safe to call concurrently for different directories. A child that
    /// cannot be inspected is skipped; once the rest of the directory has
    /// been reported the first such failure is returned.
    pub fn enumerate(
        &self,
        dir: LocalDir,
        out: &mut Discovery<'_, LocalDir, LocalEntry, ListError>,
    ) -> Result<(), ListError> {
        let read_dir = fs::read_dir(&dir.path).map_err(|source| ListError::ReadDir {
            path: dir.path.clone(),
            source,
        })?;

        let child_depth = dir.depth + 1;
        let descend = self.max_depth.map_or(true, |max| child_depth <= max);
        let mut first_failure: Option<ListError> = None;

        for item in read_dir {
            let item = item.map_err(|source| ListError::ReadDir {
                path: dir.path.clone(),
                source,
            })?;
            let path = item.path();

            if self.is_excluded(&path) {
                continue;
            }

            let file_type = match item.file_type() {
                Ok(ft) => ft,
                Err(source) => {
                    debug!(path = %path.display(), error = %source, "Skipping entry");
                    first_failure.get_or_insert(ListError::Metadata { path, source });
                    continue;
                }
            };

            let is_dir = file_type.is_dir()
                || (self.follow_symlinks && file_type.is_symlink() && path.is_dir());
            if is_dir {
                if descend {
                    out.enqueue_dir(LocalDir::new(path, child_depth));
                }
                continue;
            }

            let (kind, size) = if file_type.is_file() {
                match item.metadata() {
                    Ok(meta) => (EntryKind::File, meta.len()),
                    Err(source) => {
                        debug!(path = %path.display(), error = %source, "Skipping entry");
                        first_failure.get_or_insert(ListError::Metadata { path, source });
                        continue;
                    }
                }
            } else if file_type.is_symlink() {
                (EntryKind::Symlink, 0)
            } else {
                (EntryKind::Other, 0)
            };

            out.emit(LocalEntry {
                path,
                kind,
                size,
                depth: child_depth,
            });

            if out.is_abandoned() {
                return Ok(());
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
