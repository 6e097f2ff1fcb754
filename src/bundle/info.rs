use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

use super::{OpenedBundle, PAYLOAD_DIR, member_missing, overhead_percent};
use crate::archive::{ArchiveCodec, TarGzCodec};
use crate::error::ValidationError;
use crate::manifest::{KEY_CHECKSUM, MANIFEST_FILE, Manifest};
use crate::utils::{Checksum, list_files, to_slash};

#[derive(Debug, Clone, Copy, Default)]
pub struct InfoOptions {
    /// Include the payload file listing.
    pub list_files: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoResult {
    pub bundle: PathBuf,
    pub version: String,
    /// Literal embedded in `installer.sh`.
    pub checksum: Checksum,
    /// Raw `Payload-Checksum` value from the manifest.
    pub manifest_checksum: String,
    pub entrypoint: String,
    pub metadata: Vec<(String, String)>,
    pub total_size: u64,
    pub payload_size: u64,
    pub overhead: i64,
    pub overhead_percent: f64,
    /// Payload files relative to the payload root, when requested.
    pub files: Option<Vec<String>>,
}

pub fn bundle_info(bundle: &Path, options: &InfoOptions) -> Result<InfoResult, ValidationError> {
    bundle_info_with(&TarGzCodec, bundle, options)
}

/// Describe a bundle without running anything it contains.
pub fn bundle_info_with<C: ArchiveCodec>(
    codec: &C,
    bundle: &Path,
    options: &InfoOptions,
) -> Result<InfoResult, ValidationError> {
    info!("inspecting {}", bundle.display());
    let work = TempDir::new()?;
    let opened = OpenedBundle::open(codec, bundle, work.path())?;

    let total_size = fs::metadata(bundle)?.len();
    let payload_size = opened.payload_size()?;
    let overhead = total_size as i64 - payload_size as i64;

    let shipped = work.path().join("shipped");
    fs::create_dir_all(&shipped)?;
    let tree = opened.unpack_payload(codec, &shipped)?;
    let manifest_path = tree.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(member_missing(&[PAYLOAD_DIR, MANIFEST_FILE]));
    }
    let manifest = Manifest::read(&manifest_path)?;
    manifest.validate()?;

    let files = if options.list_files {
        Some(list_files(&tree)?.keys().map(|path| to_slash(path)).collect())
    } else {
        None
    };

    Ok(InfoResult {
        bundle: bundle.to_path_buf(),
        version: manifest.version()?.to_string(),
        checksum: opened.embedded_checksum,
        manifest_checksum: manifest.get(KEY_CHECKSUM).unwrap_or_default().to_string(),
        entrypoint: manifest.entrypoint()?.to_string(),
        metadata: manifest
            .metadata()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        total_size,
        payload_size,
        overhead,
        overhead_percent: overhead_percent(overhead, payload_size),
        files,
    })
}
