//! Turning user patterns into upload jobs.
//!
//! Patterns are evaluated against every file below the source folder. The
//! rules follow the usual glob conventions of build tooling:
//!
//! - a leading `!` negates a pattern, and each further `!` flips it back
//! - wildcards match dot files
//! - a pattern without a `/` matches the file name at any depth
//! - includes are unioned first (in pattern order, without duplicates) and
//!   excludes then narrow that union
//!
//! ```no_run
//! use ssh_copy::resolve::{resolve, ResolveOptions};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let options = ResolveOptions::new("/srv/app", false);
//! let jobs = resolve(Path::new("dist"), &["**", "!**/*.map"], &options)?;
//! for job in &jobs {
//!     println!("{}", job);
//! }
//! # Ok(())
//! # }
//! ```

mod patterns;
mod target;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::CopyError;
use crate::transfer::job::UploadJob;

pub use patterns::{Candidate, FilePattern, PatternSet};
pub use target::{is_rooted, normalize_remote_path, remote_parent, target_path};

/// How matched files are mapped onto the remote host.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub target_folder: String,
    pub flatten: bool,
    pub case_insensitive: bool,
}

impl ResolveOptions {
    /// Options with case sensitivity taken from the host platform
    pub fn new(target_folder: &str, flatten: bool) -> Self {
        Self {
            target_folder: target_folder.trim().to_string(),
            flatten,
            case_insensitive: host_is_case_insensitive(),
        }
    }
}

/// Whether file names on this host compare case-insensitively.
pub fn host_is_case_insensitive() -> bool {
    cfg!(any(windows, target_os = "macos"))
}

/// Resolve patterns into upload jobs, in match order.
pub fn resolve<S: AsRef<str>>(
    source_root: &Path,
    patterns: &[S],
    options: &ResolveOptions,
) -> Result<Vec<UploadJob>> {
    let root = absolute_root(source_root)?;
    let sources = resolve_from_root(&root, patterns, options.case_insensitive)?;

    Ok(sources
        .into_iter()
        .map(|source| {
            let target = target_path(&source, &root, &options.target_folder, options.flatten);
            UploadJob::new(source, target)
        })
        .collect())
}

/// Resolve patterns into absolute source files only.
pub fn resolve_sources<S: AsRef<str>>(
    source_root: &Path,
    patterns: &[S],
    case_insensitive: bool,
) -> Result<Vec<PathBuf>> {
    let root = absolute_root(source_root)?;
    resolve_from_root(&root, patterns, case_insensitive)
}

fn resolve_from_root<S: AsRef<str>>(
    root: &Path,
    patterns: &[S],
    case_insensitive: bool,
) -> Result<Vec<PathBuf>> {
    let set = PatternSet::new(patterns, case_insensitive);
    let files = list_files(root);
    debug!("Found {} files under {}", files.len(), root.display());

    let mut seen = HashSet::new();
    let mut matched: Vec<&SourceFile> = Vec::new();

    for index in 0..set.include_count() {
        for file in &files {
            if set.include_matches(index, &file.candidate()) && seen.insert(&file.path) {
                matched.push(file);
            }
        }
    }

    let resolved: Vec<PathBuf> = matched
        .into_iter()
        .filter(|file| !set.is_excluded(&file.candidate()))
        .map(|file| file.path.clone())
        .collect();

    debug!("{} files matched the patterns", resolved.len());
    Ok(resolved)
}

/// A file found under the source root, with the string forms patterns use.
struct SourceFile {
    path: PathBuf,
    absolute: String,
    relative: String,
    basename: String,
}

impl SourceFile {
    fn candidate(&self) -> Candidate<'_> {
        Candidate {
            absolute: &self.absolute,
            relative: &self.relative,
            basename: &self.basename,
        }
    }
}

fn absolute_root(source_root: &Path) -> Result<PathBuf> {
    let root = if source_root.is_absolute() {
        source_root.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| CopyError::SourceFolder {
                path: source_root.to_path_buf(),
                reason: e.to_string(),
            })?
            .join(source_root)
    };

    if !root.is_dir() {
        let reason = if root.exists() { "not a directory" } else { "does not exist" };
        return Err(CopyError::SourceFolder {
            path: root,
            reason: reason.to_string(),
        }
        .into());
    }

    Ok(root)
}

fn list_files(root: &Path) -> Vec<SourceFile> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path().to_path_buf();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        let basename = entry.file_name().to_string_lossy().into_owned();
        let absolute = path.to_string_lossy().replace('\\', "/");

        files.push(SourceFile {
            path,
            absolute,
            relative,
            basename,
        });
    }

    files
}
