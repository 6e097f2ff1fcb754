//! Archive codec: deterministic tar + gzip.
//!
//! Every archive holds a single top-level directory named after the tree it
//! was built from (`payload/...`, `bundle/...`, `update/...`). Entries are
//! written in sorted order with normalized headers, so the same tree always
//! serializes to the same bytes.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, HeaderMode};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::CodecError;
use crate::utils::Checksum;

/// gzip level, 0 (store) to 9 (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    pub const BEST: Self = Self(9);

    pub fn new(level: u32) -> Option<Self> {
        (level <= 9).then_some(Self(level))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::BEST
    }
}

/// Packs a directory tree into one archive file and unpacks it again.
pub trait ArchiveCodec {
    /// Archive `tree` (and its top-level directory name) into `destination`.
    fn create(&self, tree: &Path, destination: &Path, level: CompressionLevel) -> Result<(), CodecError>;

    /// Unpack `archive` below `destination`.
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), CodecError>;
}

/// The default codec, backed by the `tar` and `flate2` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzCodec;

impl ArchiveCodec for TarGzCodec {
    fn create(&self, tree: &Path, destination: &Path, level: CompressionLevel) -> Result<(), CodecError> {
        debug!("archiving {} -> {}", tree.display(), destination.display());
        create_tar_gz(tree, destination, level).map_err(|e| CodecError::new("create archive", destination, e))
    }

    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), CodecError> {
        debug!("extracting {} -> {}", archive.display(), destination.display());
        extract_tar_gz(archive, destination).map_err(|e| CodecError::new("extract archive", archive, e))
    }
}

fn create_tar_gz(tree: &Path, output: &Path, level: CompressionLevel) -> io::Result<()> {
    let file = File::create(output)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::new(level.get()));
    let encoder = write_tree(tree, encoder)?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    Ok(())
}

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dest_dir)?;
    let file = File::open(archive_path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let mut archive = Archive::new(decoder);
    archive.unpack(dest_dir)?;

    // tar stops at its end-of-archive marker; read the rest so gzip checks its CRC.
    let mut rest = archive.into_inner();
    io::copy(&mut rest, &mut io::sink())?;
    Ok(())
}

/// Serialize `tree` as an uncompressed deterministic tar stream into `writer`.
pub fn write_tree<W: Write>(tree: &Path, writer: W) -> io::Result<W> {
    let prefix = tree_name(tree)?;
    let mut tar_builder = Builder::new(writer);
    tar_builder.mode(HeaderMode::Deterministic);

    for entry in WalkDir::new(tree).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        let relative_path = path.strip_prefix(tree).map_err(io::Error::other)?;
        let name = prefix.join(relative_path);

        if entry.file_type().is_dir() {
            tar_builder.append_dir(&name, path)?;
        } else {
            tar_builder.append_path_with_name(path, &name)?;
        }
    }

    tar_builder.into_inner()
}

/// SHA-256 of [`write_tree`]'s output. This is the manifest seal.
pub fn digest_tree(tree: &Path) -> io::Result<Checksum> {
    let hasher = write_tree(tree, Sha256::new())?;
    Ok(Checksum::from_hasher(hasher))
}

/// Archive `tree` into `output` through a staging file in the same directory.
/// `output` only appears once the archive is complete. Returns its size.
///
/// Concurrent publishes to the same `output` are not coordinated; the last
/// rename wins.
pub fn publish<C, E>(codec: &C, tree: &Path, output: &Path, level: CompressionLevel) -> Result<u64, E>
where
    C: ArchiveCodec,
    E: From<CodecError> + From<io::Error>,
{
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".mksfx-")
        .suffix(".partial")
        .tempfile_in(parent)?;

    codec.create(tree, staged.path(), level)?;
    staged.persist(output).map_err(|e| e.error)?;

    Ok(std::fs::metadata(output)?.len())
}

fn tree_name(tree: &Path) -> io::Result<PathBuf> {
    tree.file_name().map(PathBuf::from).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot archive a path without a final component: {}", tree.display()),
        )
    })
}
