//! Bundle construction and inspection.
//!
//! A bundle is a tar.gz holding `bundle/installer.sh` and
//! `bundle/payload.tar.gz`; the payload archive in turn holds `payload/`
//! with the `MANIFEST`, the entrypoint and every source file.

mod build;
mod info;
pub mod installer;
mod verify;

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::ArchiveCodec;
use crate::error::ValidationError;
use crate::utils::Checksum;

pub use build::{
    BuildOptions, BuildResult, DEFAULT_ENTRYPOINT, DEFAULT_OUTPUT, DEFAULT_VERSION, build_bundle, build_bundle_with,
};
pub use info::{InfoOptions, InfoResult, bundle_info, bundle_info_with};
pub use verify::{VerifyResult, verify_bundle, verify_bundle_with};

pub const BUNDLE_DIR: &str = "bundle";
pub const PAYLOAD_DIR: &str = "payload";
pub const INSTALLER_SCRIPT: &str = "installer.sh";
pub const PAYLOAD_ARCHIVE: &str = "payload.tar.gz";

/// An extracted bundle holding exactly its two members.
pub(crate) struct OpenedBundle {
    pub payload_archive: PathBuf,
    pub installer_script: String,
    pub embedded_checksum: Checksum,
}

impl OpenedBundle {
    /// Extract `bundle` below `work` and read the installer's checksum literal.
    /// Anything besides `bundle/installer.sh` and `bundle/payload.tar.gz` is
    /// rejected.
    pub fn open<C: ArchiveCodec>(codec: &C, bundle: &Path, work: &Path) -> Result<Self, ValidationError> {
        if !bundle.is_file() {
            return Err(ValidationError::BundleNotFound(bundle.to_path_buf()));
        }
        codec.extract(bundle, work)?;
        expect_only(work, "", &[BUNDLE_DIR])?;

        let dir = work.join(BUNDLE_DIR);
        let installer = dir.join(INSTALLER_SCRIPT);
        if !installer.is_file() {
            return Err(member_missing(&[BUNDLE_DIR, INSTALLER_SCRIPT]));
        }
        let payload_archive = dir.join(PAYLOAD_ARCHIVE);
        if !payload_archive.is_file() {
            return Err(member_missing(&[BUNDLE_DIR, PAYLOAD_ARCHIVE]));
        }
        expect_only(&dir, BUNDLE_DIR, &[INSTALLER_SCRIPT, PAYLOAD_ARCHIVE])?;

        let installer_script = fs::read_to_string(&installer)?;
        let embedded_checksum =
            installer::embedded_checksum(&installer_script).ok_or(ValidationError::MissingEmbeddedChecksum)?;

        Ok(Self {
            payload_archive,
            installer_script,
            embedded_checksum,
        })
    }

    pub fn payload_size(&self) -> std::io::Result<u64> {
        Ok(fs::metadata(&self.payload_archive)?.len())
    }

    /// Unpack the shipped `payload.tar.gz` into the empty directory `dest`
    /// and return the payload tree. The archive may hold nothing but
    /// `payload/`.
    pub fn unpack_payload<C: ArchiveCodec>(&self, codec: &C, dest: &Path) -> Result<PathBuf, ValidationError> {
        codec.extract(&self.payload_archive, dest)?;
        let tree = dest.join(PAYLOAD_DIR);
        if !tree.is_dir() {
            return Err(member_missing(&[PAYLOAD_DIR]));
        }
        expect_only(dest, "", &[PAYLOAD_DIR])?;
        Ok(tree)
    }
}

/// Fail on the first entry of `dir` not named in `allowed`. `prefix` is
/// prepended to the name in the error.
fn expect_only(dir: &Path, prefix: &str, allowed: &[&str]) -> Result<(), ValidationError> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    names.sort();
    match names.into_iter().find(|name| !allowed.contains(&name.as_str())) {
        Some(name) if prefix.is_empty() => Err(ValidationError::UnexpectedMember(name)),
        Some(name) => Err(ValidationError::UnexpectedMember(format!("{}/{}", prefix, name))),
        None => Ok(()),
    }
}

/// Payload tree of an extracted bundle directory, unpacking `payload.tar.gz`
/// next to it unless the tree is already there. Only the updater takes this
/// shortcut; verification always unpacks the shipped archive.
pub(crate) fn payload_tree<C: ArchiveCodec>(codec: &C, bundle_dir: &Path) -> Result<PathBuf, ValidationError> {
    let tree = bundle_dir.join(PAYLOAD_DIR);
    if tree.is_dir() {
        return Ok(tree);
    }

    let archive = bundle_dir.join(PAYLOAD_ARCHIVE);
    if !archive.is_file() {
        return Err(member_missing(&[BUNDLE_DIR, PAYLOAD_ARCHIVE]));
    }
    codec.extract(&archive, bundle_dir)?;

    if !tree.is_dir() {
        return Err(member_missing(&[PAYLOAD_DIR]));
    }
    Ok(tree)
}

/// `100 * overhead / payload`, rounded to two decimals.
pub(crate) fn overhead_percent(overhead: i64, payload_size: u64) -> f64 {
    if payload_size == 0 {
        return 0.0;
    }
    (overhead as f64 / payload_size as f64 * 10_000.0).round() / 100.0
}

pub(crate) fn member_missing(parts: &[&str]) -> ValidationError {
    ValidationError::MissingMember(parts.join("/"))
}
