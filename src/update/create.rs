use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{info, warn};

use super::delta::{Algorithm, Delta, compute_delta};
use super::naming::default_update_name;
use super::package::{UPDATE_DIR, assemble};
use crate::archive::{ArchiveCodec, CompressionLevel, TarGzCodec, publish};
use crate::bundle::{BUNDLE_DIR, payload_tree};
use crate::error::UpdateError;
use crate::manifest::{MANIFEST_FILE, read_version};

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Defaults to a name derived from the input file names.
    pub output: Option<PathBuf>,
    pub algorithm: Algorithm,
    pub compression: u32,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            output: None,
            algorithm: Algorithm::default(),
            compression: CompressionLevel::BEST.get(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateResult {
    pub output: PathBuf,
    pub size: u64,
    /// Size of the new full bundle, for comparison.
    pub full_size: u64,
    pub savings: i64,
    pub savings_percent: f64,
    pub old_version: String,
    pub new_version: String,
    pub files_added: usize,
    pub files_changed: usize,
    pub files_removed: usize,
    pub algorithm: &'static str,
    pub delta: Delta,
}

pub fn create_update(old_bundle: &Path, new_bundle: &Path, options: &UpdateOptions) -> Result<UpdateResult, UpdateError> {
    create_update_with(&TarGzCodec, old_bundle, new_bundle, options)
}

/// Build an incremental update that turns the payload of `old_bundle` into
/// the payload of `new_bundle`.
pub fn create_update_with<C: ArchiveCodec>(
    codec: &C,
    old_bundle: &Path,
    new_bundle: &Path,
    options: &UpdateOptions,
) -> Result<UpdateResult, UpdateError> {
    for (role, path) in [("old", old_bundle), ("new", new_bundle)] {
        if !path.is_file() {
            return Err(UpdateError::ArchiveNotFound {
                role,
                path: path.to_path_buf(),
            });
        }
    }
    let level =
        CompressionLevel::new(options.compression).ok_or(UpdateError::InvalidCompression(options.compression))?;
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| default_update_name(old_bundle, new_bundle, chrono::Local::now().date_naive()));
    let strategy = options.algorithm.strategy();

    let work = TempDir::new()?;

    info!("extracting old bundle {}", old_bundle.display());
    let old_tree = unpack_bundle(codec, old_bundle, &work.path().join("old"))?;
    info!("extracting new bundle {}", new_bundle.display());
    let new_tree = unpack_bundle(codec, new_bundle, &work.path().join("new"))?;

    info!("calculating differences");
    let delta = compute_delta(&old_tree, &new_tree)?;
    if delta.is_empty() {
        warn!("payloads are identical; the update package will be empty");
    }
    info!("{}", delta.summary());

    info!("creating update package ({})", strategy.name());
    let update_dir = work.path().join(UPDATE_DIR);
    fs::create_dir_all(&update_dir)?;
    assemble(&update_dir, &old_tree, &new_tree, &delta, strategy)?;

    info!("writing update {}", output.display());
    let size: u64 = publish::<_, UpdateError>(codec, &update_dir, &output, level)?;
    let full_size = fs::metadata(new_bundle)?.len();
    let savings = full_size as i64 - size as i64;

    Ok(UpdateResult {
        output,
        size,
        full_size,
        savings,
        savings_percent: savings_percent(size, full_size),
        old_version: read_version(&old_tree.join(MANIFEST_FILE)),
        new_version: read_version(&new_tree.join(MANIFEST_FILE)),
        files_added: delta.added.len(),
        files_changed: delta.changed.len(),
        files_removed: delta.removed.len(),
        algorithm: strategy.name(),
        delta,
    })
}

/// Extract a bundle below `dest` and return its payload tree.
fn unpack_bundle<C: ArchiveCodec>(codec: &C, bundle: &Path, dest: &Path) -> Result<PathBuf, UpdateError> {
    codec.extract(bundle, dest)?;
    Ok(payload_tree(codec, &dest.join(BUNDLE_DIR))?)
}

/// `(1 - size / full_size) * 100`, rounded to two decimals.
fn savings_percent(size: u64, full_size: u64) -> f64 {
    if full_size == 0 {
        return 0.0;
    }
    ((1.0 - size as f64 / full_size as f64) * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn savings_percent_rounds() {
        assert_eq!(savings_percent(25, 100), 75.0);
        assert_eq!(savings_percent(2, 3), 33.33);
        assert_eq!(savings_percent(150, 100), -50.0);
        assert_eq!(savings_percent(1, 0), 0.0);
    }

    #[test]
    fn missing_old_archive_is_named() {
        let dir = tempfile::TempDir::new().unwrap();
        let new = dir.path().join("new.tar.gz");
        fs::write(&new, b"x").unwrap();

        let err = create_update(&dir.path().join("old.tar.gz"), &new, &UpdateOptions::default()).unwrap_err();

        assert!(matches!(err, UpdateError::ArchiveNotFound { role: "old", .. }));
        assert!(err.to_string().contains("old.tar.gz"));
    }
}
