//! Optional `mksfx.toml` holding defaults for `build` and `update`.
//!
//! ```toml
//! [build]
//! version = "1.0.0"
//! entrypoint = "bootstrap.sh"
//! compression = 9
//! output = "installer.tar.gz"
//!
//! [build.metadata]
//! Vendor = "Example"
//!
//! [update]
//! algorithm = "auto"
//! compression = 9
//! ```
//!
//! Command-line flags always win over the file.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::update::Algorithm;

pub const DEFAULT_CONFIG_FILE: &str = "mksfx.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub build: BuildDefaults,
    pub update: UpdateDefaults,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildDefaults {
    pub version: Option<String>,
    pub entrypoint: Option<String>,
    pub compression: Option<u32>,
    pub output: Option<PathBuf>,
    /// `[build.metadata]` entries in file order.
    #[serde(deserialize_with = "ordered_pairs")]
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateDefaults {
    pub algorithm: Option<Algorithm>,
    pub compression: Option<u32>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` if given, else `mksfx.toml` from `base_dir` when it
    /// exists, else defaults.
    pub fn load(explicit: Option<&Path>, base_dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let implicit = base_dir.join(DEFAULT_CONFIG_FILE);
        if implicit.is_file() {
            Self::from_file(&implicit)
        } else {
            Ok(Self::default())
        }
    }
}

/// Reads a table of strings as key/value pairs, keeping the order in which
/// the deserializer yields them (document order for `toml`).
fn ordered_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PairsVisitor;

    impl<'de> Visitor<'de> for PairsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a table of string values")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut pairs = Vec::new();
            while let Some(pair) = map.next_entry::<String, String>()? {
                pairs.push(pair);
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairsVisitor)
}

/// Merge metadata: config entries first, then `overrides` in order. An
/// override replaces a same-named config entry in place.
pub fn merge_metadata(config: &[(String, String)], overrides: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged = config.to_vec();
    for (key, value) in overrides {
        match merged.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => merged.push((key.clone(), value.clone())),
        }
    }
    merged
}
