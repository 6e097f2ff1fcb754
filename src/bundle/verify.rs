use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

use super::{OpenedBundle, PAYLOAD_DIR, installer, member_missing};
use crate::archive::{ArchiveCodec, TarGzCodec, digest_tree};
use crate::error::ValidationError;
use crate::manifest::{MANIFEST_FILE, Manifest, PayloadChecksum};
use crate::utils::{Checksum, compute_file_hash};

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub bundle: PathBuf,
    pub checksum: Checksum,
    pub manifest_seal: Checksum,
    pub version: String,
    pub entrypoint: String,
}

pub fn verify_bundle(bundle: &Path) -> Result<VerifyResult, ValidationError> {
    verify_bundle_with(&TarGzCodec, bundle)
}

/// Check a bundle end to end:
///
/// 1. the bundle holds only `installer.sh` and `payload.tar.gz`, and the
///    installer is byte-for-byte the script generated for its literal;
/// 2. the installer's checksum literal equals the SHA-256 of `payload.tar.gz`;
/// 3. the payload manifest parses and names an entrypoint that exists;
/// 4. the manifest's `Payload-Checksum` equals the seal re-derived from the
///    extracted tree with that field reset to `PLACEHOLDER`.
pub fn verify_bundle_with<C: ArchiveCodec>(codec: &C, bundle: &Path) -> Result<VerifyResult, ValidationError> {
    info!("verifying {}", bundle.display());
    let work = TempDir::new()?;
    let opened = OpenedBundle::open(codec, bundle, work.path())?;

    if opened.installer_script != installer::render(&opened.embedded_checksum) {
        return Err(ValidationError::InstallerModified);
    }

    let actual = compute_file_hash(&opened.payload_archive)?;
    if actual != opened.embedded_checksum {
        return Err(ValidationError::ChecksumMismatch {
            expected: opened.embedded_checksum.to_string(),
            actual: actual.to_string(),
        });
    }
    debug!("payload archive matches embedded checksum {}", actual);

    let shipped = work.path().join("shipped");
    fs::create_dir_all(&shipped)?;
    let tree = opened.unpack_payload(codec, &shipped)?;
    let manifest_path = tree.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(member_missing(&[PAYLOAD_DIR, MANIFEST_FILE]));
    }
    let manifest = Manifest::read(&manifest_path)?;
    manifest.validate()?;

    let entrypoint = manifest.entrypoint()?.to_string();
    if !tree.join(&entrypoint).is_file() {
        return Err(member_missing(&[PAYLOAD_DIR, &entrypoint]));
    }

    let PayloadChecksum::Sha256(claimed) = manifest.checksum()? else {
        return Err(ValidationError::UnfinalizedChecksum);
    };
    manifest
        .with_checksum(&PayloadChecksum::Placeholder)
        .write(&manifest_path)?;
    let resealed = digest_tree(&tree)?;
    if resealed != claimed {
        return Err(ValidationError::SealMismatch {
            expected: claimed.to_string(),
            actual: resealed.to_string(),
        });
    }
    debug!("manifest seal {} re-derived", claimed);

    Ok(VerifyResult {
        bundle: bundle.to_path_buf(),
        checksum: actual,
        manifest_seal: claimed,
        version: manifest.version()?.to_string(),
        entrypoint,
    })
}
