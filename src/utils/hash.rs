use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use serde::Serialize;

/// Lowercase hex SHA-256 digest (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub const HEX_LEN: usize = 64;

    /// Accepts exactly 64 hex digits; upper-case input is normalized.
    pub fn from_hex(value: &str) -> Option<Self> {
        if value.len() == Self::HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(value.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn from_hasher(hasher: Sha256) -> Self {
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the SHA256 checksum of everything `reader` yields
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Checksum> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Checksum::from_hasher(hasher))
}

/// Compute the SHA256 checksum of a file's contents
pub fn compute_file_hash(path: &Path) -> io::Result<Checksum> {
    let file = File::open(path)?;
    hash_reader(BufReader::new(file))
}

pub fn hash_bytes(data: &[u8]) -> Checksum {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Checksum::from_hasher(hasher)
}
