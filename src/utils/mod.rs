mod fs;
mod hash;

pub use fs::{copy_file, copy_tree, is_contained, list_files, set_executable, to_slash};
pub use hash::{Checksum, compute_file_hash, hash_bytes, hash_reader};
