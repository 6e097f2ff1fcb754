//! # mksfx
//!
//! Builds self-extracting installer bundles and incremental updates between
//! them.
//!
//! A bundle is a tar.gz holding an `installer.sh` and a `payload.tar.gz`. The
//! installer embeds the SHA-256 of the payload archive; the payload carries a
//! `MANIFEST` sealed with the hash of its own placeholder-form tree. Both can
//! be checked with [`verify_bundle`].
//!
//! ## Example
//!
//! ```no_run
//! use mksfx::{BuildOptions, UpdateOptions, build_bundle, create_update, verify_bundle};
//! use std::path::{Path, PathBuf};
//!
//! let v1 = build_bundle(
//!     Path::new("app-v1"),
//!     &BuildOptions {
//!         output: PathBuf::from("app-1.0.0.tar.gz"),
//!         ..Default::default()
//!     },
//! )?;
//! verify_bundle(&v1.output)?;
//!
//! let update = create_update(
//!     Path::new("app-1.0.0.tar.gz"),
//!     Path::new("app-1.1.0.tar.gz"),
//!     &UpdateOptions::default(),
//! )?;
//! println!("{}", update.delta.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod archive;
pub mod bundle;
pub mod cli;
pub mod config;
pub mod error;
pub mod init;
pub mod manifest;
pub mod output;
pub mod update;
pub mod utils;

pub use archive::{ArchiveCodec, CompressionLevel, TarGzCodec};
pub use bundle::{
    BuildOptions, BuildResult, InfoOptions, InfoResult, VerifyResult, build_bundle, bundle_info, verify_bundle,
};
pub use error::{BuildError, CodecError, ConfigError, InitError, UpdateError, ValidationError};
pub use init::{InitResult, init_payload};
pub use manifest::{Manifest, PayloadChecksum};
pub use update::{Algorithm, Delta, UpdateOptions, UpdateResult, compute_delta, create_update};
