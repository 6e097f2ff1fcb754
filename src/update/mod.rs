mod create;
mod delta;
mod naming;
mod package;

pub use create::{UpdateOptions, UpdateResult, create_update, create_update_with};
pub use delta::{Algorithm, Delta, DiffStrategy, FileDiff, WholeFile, compute_delta};
pub use naming::{default_update_name, version_from_filename};
pub use package::{
    ADDED_DIR, CHANGED_DIR, UPDATE_DIR, UPDATE_MANIFEST_FILE, UPDATE_SCRIPT, UpdateManifest,
};
