//! Layout of an incremental update package.
//!
//! ```text
//! update/
//!   UPDATE_MANIFEST
//!   update.sh
//!   files/added/<relative paths>
//!   files/changed/<relative paths>
//! ```

use std::fs;
use std::path::Path;
use tracing::debug;

use super::delta::{Delta, DiffStrategy};
use crate::error::{UpdateError, ValidationError};
use crate::utils::{set_executable, to_slash};

pub const UPDATE_DIR: &str = "update";
pub const UPDATE_MANIFEST_FILE: &str = "UPDATE_MANIFEST";
pub const UPDATE_SCRIPT: &str = "update.sh";
pub const ADDED_DIR: &str = "files/added";
pub const CHANGED_DIR: &str = "files/changed";

const UPDATE_TYPE: &str = "incremental";
const KEY_TYPE: &str = "Update-Type";
const KEY_ADDED: &str = "Files-Added";
const KEY_CHANGED: &str = "Files-Changed";
const KEY_REMOVED: &str = "Files-Removed";
const KEY_REMOVED_LIST: &str = "Removed-Files";

const UPDATE_SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
# Incremental update generated by mksfx.
set -e

PAYLOAD_DIR="${PAYLOAD_DIR:-../payload}"
SCRIPT_DIR="$(cd "$(dirname "$0")" && pwd)"

if [ ! -d "$PAYLOAD_DIR" ]; then
  echo "error: payload directory not found: $PAYLOAD_DIR" >&2
  exit 1
fi

echo "Applying incremental update to $PAYLOAD_DIR"

# Removals run first so a path can switch between file and directory.
echo "  Removing deleted files..."
sed -n '/^Removed-Files:$/,$p' "$SCRIPT_DIR/UPDATE_MANIFEST" | tail -n +2 | while IFS= read -r file; do
  if [ -n "$file" ]; then
    rm -f "$PAYLOAD_DIR/$file"
    dir="$(dirname "$file")"
    while [ "$dir" != "." ] && rmdir "$PAYLOAD_DIR/$dir" 2>/dev/null; do
      dir="$(dirname "$dir")"
    done
  fi
done

if [ -d "$SCRIPT_DIR/files/added" ]; then
  echo "  Adding new files..."
  cp -R "$SCRIPT_DIR/files/added/." "$PAYLOAD_DIR/"
fi

if [ -d "$SCRIPT_DIR/files/changed" ]; then
  echo "  Updating changed files..."
  cp -R "$SCRIPT_DIR/files/changed/." "$PAYLOAD_DIR/"
fi

echo "Update applied"
"#;

/// Contents of `UPDATE_MANIFEST`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateManifest {
    pub added: usize,
    pub changed: usize,
    /// `/`-separated paths relative to the payload root.
    pub removed: Vec<String>,
}

impl UpdateManifest {
    pub fn from_delta(delta: &Delta) -> Self {
        Self {
            added: delta.added.len(),
            changed: delta.changed.len(),
            removed: delta.removed.iter().map(|p| to_slash(p)).collect(),
        }
    }

    /// Key lines, then `Removed-Files:` followed by one removed path per line.
    pub fn encode(&self) -> String {
        let mut text = format!(
            "{}: {}\n{}: {}\n{}: {}\n{}: {}\n{}:\n",
            KEY_TYPE,
            UPDATE_TYPE,
            KEY_ADDED,
            self.added,
            KEY_CHANGED,
            self.changed,
            KEY_REMOVED,
            self.removed.len(),
            KEY_REMOVED_LIST
        );
        for path in &self.removed {
            text.push_str(path);
            text.push('\n');
        }
        text
    }

    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let mut manifest = Self::default();
        let mut update_type = None;
        let mut removed_count = None;
        let mut lines = text.lines().enumerate();

        for (index, line) in lines.by_ref() {
            if line.is_empty() {
                continue;
            }
            if line == format!("{}:", KEY_REMOVED_LIST) {
                break;
            }
            let Some((key, value)) = line.split_once(": ") else {
                return Err(ValidationError::MalformedLine {
                    line: index + 1,
                    content: line.to_string(),
                });
            };
            match key {
                KEY_TYPE => update_type = Some(value.to_string()),
                KEY_ADDED => manifest.added = parse_count(key, value)?,
                KEY_CHANGED => manifest.changed = parse_count(key, value)?,
                KEY_REMOVED => removed_count = Some(parse_count(key, value)?),
                _ => {}
            }
        }

        manifest.removed = lines
            .map(|(_, line)| line)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        match update_type.as_deref() {
            Some(UPDATE_TYPE) => {}
            Some(other) => {
                return Err(ValidationError::InvalidValue {
                    key: KEY_TYPE.to_string(),
                    reason: format!("unsupported update type '{}'", other),
                });
            }
            None => return Err(ValidationError::MissingKey(KEY_TYPE)),
        }
        if removed_count != Some(manifest.removed.len()) {
            return Err(ValidationError::InvalidValue {
                key: KEY_REMOVED.to_string(),
                reason: format!(
                    "count {:?} does not match {} listed paths",
                    removed_count,
                    manifest.removed.len()
                ),
            });
        }

        Ok(manifest)
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, ValidationError> {
    value.parse().map_err(|_| ValidationError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected a count, got '{}'", value),
    })
}

/// Fill `update_dir` with the files, manifest and apply script for `delta`.
///
/// Removed paths are listed one per line, so a path holding a line break is
/// refused before anything is written.
pub(crate) fn assemble(
    update_dir: &Path,
    old_tree: &Path,
    new_tree: &Path,
    delta: &Delta,
    strategy: &dyn DiffStrategy,
) -> Result<UpdateManifest, UpdateError> {
    if let Some(path) = delta
        .removed
        .iter()
        .find(|path| to_slash(path).contains(['\n', '\r']))
    {
        return Err(UpdateError::UnsupportedPath(path.clone()));
    }

    let added_dir = update_dir.join(ADDED_DIR);
    let changed_dir = update_dir.join(CHANGED_DIR);
    fs::create_dir_all(&added_dir)?;
    fs::create_dir_all(&changed_dir)?;

    for path in &delta.added {
        strategy.encode(None, &new_tree.join(path), &added_dir.join(path))?;
        debug!("  + {}", path.display());
    }
    for path in &delta.changed {
        strategy.encode(Some(old_tree.join(path).as_path()), &new_tree.join(path), &changed_dir.join(path))?;
        debug!("  * {}", path.display());
    }
    for path in &delta.removed {
        debug!("  - {}", path.display());
    }

    let manifest = UpdateManifest::from_delta(delta);
    fs::write(update_dir.join(UPDATE_MANIFEST_FILE), manifest.encode())?;

    let script = update_dir.join(UPDATE_SCRIPT);
    fs::write(&script, UPDATE_SCRIPT_TEMPLATE)?;
    set_executable(&script)?;

    Ok(manifest)
}
