//! Error types for mksfx

use std::path::PathBuf;

use thiserror::Error;

/// Failure of the tar/gzip collaborator. Callers only learn that the operation
/// failed and on which path.
#[derive(Debug, Error)]
#[error("failed to {operation} {path}: {source}")]
pub struct CodecError {
    pub operation: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl CodecError {
    pub(crate) fn new(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while building a bundle
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("entrypoint script not found: {0}")]
    EntrypointNotFound(PathBuf),

    #[error("invalid entrypoint '{0}': must be a relative path inside the source directory")]
    InvalidEntrypoint(String),

    #[error("invalid compression level {0}: expected 0-9")]
    InvalidCompression(u32),

    #[error("invalid metadata '{key}': {reason}")]
    InvalidMetadata { key: String, reason: String },

    #[error("archive operation failed: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while creating an incremental update
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("{role} archive not found: {path}")]
    ArchiveNotFound { role: &'static str, path: PathBuf },

    #[error("invalid compression level {0}: expected 0-9")]
    InvalidCompression(u32),

    #[error("cannot list removed path {0:?} in the update manifest: it contains a line break")]
    UnsupportedPath(PathBuf),

    #[error("archive operation failed: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid input bundle: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while inspecting or verifying a bundle
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bundle not found: {0}")]
    BundleNotFound(PathBuf),

    #[error("malformed manifest line {line}: '{content}'")]
    MalformedLine { line: usize, content: String },

    #[error("duplicate manifest key '{0}'")]
    DuplicateKey(String),

    #[error("invalid manifest value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("manifest is missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("payload checksum was never finalized")]
    UnfinalizedChecksum,

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("manifest seal mismatch: manifest claims {expected}, payload tree hashes to {actual}")]
    SealMismatch { expected: String, actual: String },

    #[error("archive member missing: {0}")]
    MissingMember(String),

    #[error("unexpected archive member: {0}")]
    UnexpectedMember(String),

    #[error("installer script differs from the one generated for its checksum")]
    InstallerModified,

    #[error("installer script carries no embedded checksum")]
    MissingEmbeddedChecksum,

    #[error("unreadable archive: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while scaffolding a payload directory
#[derive(Debug, Error)]
pub enum InitError {
    #[error("directory already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("invalid entrypoint '{0}': must be a relative path inside the payload directory")]
    InvalidEntrypoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Process exit status for a failed command, chosen by error kind.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        2
    } else if err.downcast_ref::<UpdateError>().is_some() {
        3
    } else if err.downcast_ref::<ValidationError>().is_some() {
        4
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_follows_error_kind() {
        let build = anyhow::Error::new(BuildError::InvalidCompression(12));
        let update = anyhow::Error::new(UpdateError::ArchiveNotFound {
            role: "old",
            path: PathBuf::from("a.tar.gz"),
        });
        let validation = anyhow::Error::new(ValidationError::MissingEmbeddedChecksum);
        let other = anyhow::anyhow!("boom");

        assert_eq!(exit_code(&build), 2);
        assert_eq!(exit_code(&update), 3);
        assert_eq!(exit_code(&validation), 4);
        assert_eq!(exit_code(&other), 1);
    }

    #[test]
    fn context_keeps_kind_visible() {
        let err = anyhow::Error::new(BuildError::SourceNotFound(PathBuf::from("app")))
            .context("build failed");
        assert_eq!(exit_code(&err), 2);
        assert_eq!(format!("{:#}", err), "build failed: source directory not found: app");
    }
}
