use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::utils::{compute_file_hash, copy_file, list_files};

/// One entry of a [`Delta`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDiff<'a> {
    Added(&'a Path),
    Removed(&'a Path),
    Changed(&'a Path),
}

impl FileDiff<'_> {
    pub fn path(&self) -> &Path {
        match self {
            FileDiff::Added(p) | FileDiff::Removed(p) | FileDiff::Changed(p) => p,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            FileDiff::Added(_) => "+",
            FileDiff::Removed(_) => "-",
            FileDiff::Changed(_) => "*",
        }
    }
}

/// File-level difference between two payload trees. Each list is sorted and
/// the three are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Delta {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub changed: Vec<PathBuf>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = FileDiff<'_>> {
        let added = self.added.iter().map(|p| FileDiff::Added(p.as_path()));
        let changed = self.changed.iter().map(|p| FileDiff::Changed(p.as_path()));
        let removed = self.removed.iter().map(|p| FileDiff::Removed(p.as_path()));
        added.chain(changed).chain(removed)
    }

    pub fn summary(&self) -> String {
        format!(
            "added: {} files, changed: {} files, removed: {} files",
            self.added.len(),
            self.changed.len(),
            self.removed.len()
        )
    }
}

/// Compare two trees by relative path, size and SHA-256.
///
/// Only paths present in both trees are read, and only when their sizes agree.
/// Timestamps and permissions are ignored.
pub fn compute_delta(old_tree: &Path, new_tree: &Path) -> io::Result<Delta> {
    let old_files = list_files(old_tree)?;
    let new_files = list_files(new_tree)?;

    let mut delta = Delta::default();

    for (path, new_size) in &new_files {
        match old_files.get(path) {
            None => delta.added.push(path.clone()),
            Some(old_size) => {
                if !files_identical(&old_tree.join(path), *old_size, &new_tree.join(path), *new_size)? {
                    delta.changed.push(path.clone());
                }
            }
        }
    }

    delta.removed = old_files
        .keys()
        .filter(|path| !new_files.contains_key(*path))
        .cloned()
        .collect();

    Ok(delta)
}

fn files_identical(old: &Path, old_size: u64, new: &Path, new_size: u64) -> io::Result<bool> {
    if old_size != new_size {
        return Ok(false);
    }
    Ok(compute_file_hash(old)? == compute_file_hash(new)?)
}

/// How a changed or added file is carried in an update package.
pub trait DiffStrategy {
    fn name(&self) -> &'static str;

    /// Write the package representation of `new` to `dest`. `old` is the
    /// previous version of the file, absent for added files.
    fn encode(&self, old: Option<&Path>, new: &Path, dest: &Path) -> io::Result<()>;
}

/// Ships the complete new file.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeFile;

impl DiffStrategy for WholeFile {
    fn name(&self) -> &'static str {
        "whole-file"
    }

    fn encode(&self, _old: Option<&Path>, new: &Path, dest: &Path) -> io::Result<()> {
        copy_file(new, dest)
    }
}

/// Strategy selector exposed on the command line and in config files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[default]
    Auto,
    WholeFile,
}

impl Algorithm {
    pub fn strategy(self) -> &'static dyn DiffStrategy {
        match self {
            Algorithm::Auto | Algorithm::WholeFile => &WholeFile,
        }
    }
}
