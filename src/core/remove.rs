//! Purpose: Remove files under a base directory that match include globs.
//! Exports: `FileRemover`, `FileSet`, `GlobRemover`, `DEFAULT_EXCLUDES`.
//! Role: Default removal collaborator behind the cleanup dispatcher.
//! Invariants: Never removes directories (the base included) or symlink targets.
//! Invariants: A file that is already gone, or a missing base, is not an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use super::error::{Error, ErrorKind};
use super::options::ProjectContext;

/// SCM metadata directories skipped when `exclude_defaults` is set.
pub const DEFAULT_EXCLUDES: &[&str] = &[".git", ".svn", ".hg", ".bzr", "CVS", "_darcs"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

pub trait FileRemover {
    /// Returns the number of entries removed.
    fn remove(&self, project: &ProjectContext, fileset: &FileSet) -> Result<usize, Error>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileSet {
    pub directory: PathBuf,
    pub includes: Vec<String>,
    pub exclude_defaults: bool,
    pub follow_symlinks: bool,
}

impl FileSet {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            includes: Vec::new(),
            exclude_defaults: true,
            follow_symlinks: false,
        }
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    pub fn with_exclude_defaults(mut self, exclude_defaults: bool) -> Self {
        self.exclude_defaults = exclude_defaults;
        self
    }

    pub fn with_follow_symlinks(mut self, follow_symlinks: bool) -> Self {
        self.follow_symlinks = follow_symlinks;
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GlobRemover;

impl GlobRemover {
    pub fn new() -> Self {
        Self
    }
}

impl FileRemover for GlobRemover {
    fn remove(&self, _project: &ProjectContext, fileset: &FileSet) -> Result<usize, Error> {
        if fileset.includes.is_empty() {
            return Ok(0);
        }
        let patterns = compile_patterns(&fileset.includes)?;

        let base = &fileset.directory;
        match fs::metadata(base) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(Error::new(ErrorKind::Io)
                    .with_message("removal base is not a directory")
                    .with_path(base));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(Error::new(ErrorKind::Io)
                    .with_message("failed to inspect removal base")
                    .with_path(base)
                    .with_source(err));
            }
        }

        let exclude_defaults = fileset.exclude_defaults;
        let walker = WalkDir::new(base)
            .min_depth(1)
            .max_depth(max_depth(&fileset.includes))
            .follow_links(fileset.follow_symlinks)
            .into_iter()
            .filter_entry(move |entry| !(exclude_defaults && is_default_exclude(entry)));

        let mut removed = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if vanished(&err) => continue,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf);
                    let mut error = Error::new(ErrorKind::Io)
                        .with_message("failed to scan removal base")
                        .with_source(err);
                    if let Some(path) = path {
                        error = error.with_path(path);
                    }
                    return Err(error);
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(base) else {
                continue;
            };
            if !patterns
                .iter()
                .any(|pattern| pattern.matches_path_with(rel, MATCH_OPTIONS))
            {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(Error::new(ErrorKind::Io)
                        .with_message("failed to remove file")
                        .with_path(entry.path())
                        .with_source(err));
                }
            }
        }
        Ok(removed)
    }
}

fn compile_patterns(includes: &[String]) -> Result<Vec<Pattern>, Error> {
    includes
        .iter()
        .map(|include| {
            Pattern::new(include).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid include pattern {include:?}"))
                    .with_source(err)
            })
        })
        .collect()
}

// Plain patterns only reach as deep as their own components.
fn max_depth(includes: &[String]) -> usize {
    includes
        .iter()
        .map(|include| {
            if include.contains("**") {
                usize::MAX
            } else {
                Path::new(include).components().count()
            }
        })
        .max()
        .unwrap_or(0)
}

fn is_default_exclude(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| DEFAULT_EXCLUDES.contains(&name))
}

fn vanished(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NotFound)
}
