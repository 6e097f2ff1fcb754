use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::{BUNDLE_DIR, INSTALLER_SCRIPT, PAYLOAD_ARCHIVE, PAYLOAD_DIR, installer, overhead_percent};
use crate::archive::{ArchiveCodec, CompressionLevel, TarGzCodec, digest_tree, publish};
use crate::error::BuildError;
use crate::manifest::{MANIFEST_FILE, Manifest, PayloadChecksum};
use crate::utils::{Checksum, compute_file_hash, copy_tree, is_contained, set_executable, to_slash};

pub const DEFAULT_OUTPUT: &str = "installer.tar.gz";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_ENTRYPOINT: &str = "bootstrap.sh";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub output: PathBuf,
    pub version: String,
    /// Relative to the source directory.
    pub entrypoint: String,
    pub compression: u32,
    /// Extra manifest lines, written after the required keys in this order.
    pub metadata: Vec<(String, String)>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            version: DEFAULT_VERSION.to_string(),
            entrypoint: DEFAULT_ENTRYPOINT.to_string(),
            compression: CompressionLevel::BEST.get(),
            metadata: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub output: PathBuf,
    pub size: u64,
    pub payload_size: u64,
    pub overhead: i64,
    pub overhead_percent: f64,
    /// SHA-256 of the shipped `payload.tar.gz`, embedded in `installer.sh`.
    pub checksum: Checksum,
    /// Seal stored in the manifest's `Payload-Checksum`.
    pub manifest_seal: Checksum,
    pub version: String,
    pub entrypoint: String,
}

/// Validated inputs. Producing one touches nothing on disk.
struct BuildPlan {
    source_dir: PathBuf,
    entrypoint: String,
    level: CompressionLevel,
    manifest: Manifest,
}

/// A payload tree whose manifest carries its own seal.
struct SealedPayload {
    manifest: Manifest,
    seal: Checksum,
}

/// Build a bundle from `source_dir` with the tar.gz codec.
pub fn build_bundle(source_dir: &Path, options: &BuildOptions) -> Result<BuildResult, BuildError> {
    build_bundle_with(&TarGzCodec, source_dir, options)
}

/// Build a bundle from `source_dir`.
///
/// The working tree lives in a temporary directory dropped on every return
/// path, and `options.output` is written only once the bundle is complete.
pub fn build_bundle_with<C: ArchiveCodec>(
    codec: &C,
    source_dir: &Path,
    options: &BuildOptions,
) -> Result<BuildResult, BuildError> {
    let plan = plan_build(source_dir, options)?;
    info!(
        "building {} (version {}, entrypoint {})",
        plan.source_dir.display(),
        options.version,
        plan.entrypoint
    );

    let work = TempDir::new()?;
    let bundle_dir = work.path().join(BUNDLE_DIR);
    let payload_dir = work.path().join(PAYLOAD_DIR);
    fs::create_dir_all(&bundle_dir)?;
    fs::create_dir_all(&payload_dir)?;

    stage_payload(&plan, &payload_dir)?;

    info!("sealing payload");
    let sealed = seal_payload(&payload_dir, &plan.manifest)?;
    debug!("manifest seal {}", sealed.seal);

    info!("creating {} (compression: {})", PAYLOAD_ARCHIVE, plan.level.get());
    let payload_archive = bundle_dir.join(PAYLOAD_ARCHIVE);
    codec.create(&payload_dir, &payload_archive, plan.level)?;
    let checksum = compute_file_hash(&payload_archive)?;
    let payload_size = fs::metadata(&payload_archive)?.len();
    debug!("payload checksum {}", checksum);

    installer::write(&bundle_dir.join(INSTALLER_SCRIPT), &checksum)?;

    info!("writing bundle {}", options.output.display());
    let size: u64 = publish::<_, BuildError>(codec, &bundle_dir, &options.output, plan.level)?;
    let overhead = size as i64 - payload_size as i64;

    Ok(BuildResult {
        output: options.output.clone(),
        size,
        payload_size,
        overhead,
        overhead_percent: overhead_percent(overhead, payload_size),
        checksum,
        manifest_seal: sealed.seal,
        version: sealed.manifest.version().map(str::to_string).unwrap_or_default(),
        entrypoint: plan.entrypoint,
    })
}

fn plan_build(source_dir: &Path, options: &BuildOptions) -> Result<BuildPlan, BuildError> {
    if !source_dir.is_dir() {
        return Err(BuildError::SourceNotFound(source_dir.to_path_buf()));
    }

    let entrypoint_path = Path::new(&options.entrypoint);
    if !is_contained(entrypoint_path) {
        return Err(BuildError::InvalidEntrypoint(options.entrypoint.clone()));
    }
    let entrypoint_source = source_dir.join(entrypoint_path);
    if !entrypoint_source.is_file() {
        return Err(BuildError::EntrypointNotFound(entrypoint_source));
    }
    let entrypoint = to_slash(entrypoint_path);

    let level =
        CompressionLevel::new(options.compression).ok_or(BuildError::InvalidCompression(options.compression))?;

    let mut manifest = Manifest::new(&options.version, &PayloadChecksum::Placeholder, &entrypoint).map_err(|e| {
        BuildError::InvalidMetadata {
            key: "version".to_string(),
            reason: e.to_string(),
        }
    })?;
    for (key, value) in &options.metadata {
        manifest
            .push(key, value)
            .map_err(|e| BuildError::InvalidMetadata {
                key: key.clone(),
                reason: e.to_string(),
            })?;
    }

    Ok(BuildPlan {
        source_dir: source_dir.to_path_buf(),
        entrypoint,
        level,
        manifest,
    })
}

fn stage_payload(plan: &BuildPlan, payload_dir: &Path) -> Result<(), BuildError> {
    info!("copying source files");
    let copied = copy_tree(&plan.source_dir, payload_dir)?;
    debug!("copied {} files", copied);

    if plan.source_dir.join(MANIFEST_FILE).exists() {
        warn!("source {} is replaced by the generated manifest", MANIFEST_FILE);
    }
    set_executable(&payload_dir.join(&plan.entrypoint))?;
    Ok(())
}

/// Pass 1 of the build: write the placeholder manifest, hash the tree, then
/// write the manifest again carrying that hash.
fn seal_payload(payload_dir: &Path, placeholder: &Manifest) -> Result<SealedPayload, BuildError> {
    let manifest_path = payload_dir.join(MANIFEST_FILE);
    if manifest_path.is_dir() {
        fs::remove_dir_all(&manifest_path)?;
    }

    placeholder.write(&manifest_path)?;
    let seal = digest_tree(payload_dir)?;

    let manifest = placeholder.with_checksum(&PayloadChecksum::Sha256(seal.clone()));
    manifest.write(&manifest_path)?;

    Ok(SealedPayload { manifest, seal })
}
