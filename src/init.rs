use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::InitError;
use crate::utils::{is_contained, set_executable};

pub const FILES_DIR: &str = "files";
pub const README_FILE: &str = "README.md";

const BOOTSTRAP_TEMPLATE: &str = r#"#!/bin/sh
# Installation script, run from the extracted payload directory by
# `sh installer.sh --run`.
set -e

SCRIPT_DIR="$(cd "$(dirname "$0")" && pwd)"

echo "Installation started"

if [ -d "$SCRIPT_DIR/files" ]; then
  for file in "$SCRIPT_DIR/files"/*; do
    [ -e "$file" ] || continue
    echo "  found: $(basename "$file")"
  done
fi

# Add installation steps here.

echo "Installation completed"
"#;

#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    pub dir: PathBuf,
    pub entrypoint: String,
}

/// Scaffold a payload directory: an executable entrypoint, an empty `files/`
/// directory and a README. `dir` must not exist yet.
pub fn init_payload(dir: &Path, entrypoint: &str) -> Result<InitResult, InitError> {
    if entrypoint.is_empty() || !is_contained(Path::new(entrypoint)) {
        return Err(InitError::InvalidEntrypoint(entrypoint.to_string()));
    }
    if dir.exists() {
        return Err(InitError::AlreadyExists(dir.to_path_buf()));
    }

    info!("initializing payload directory {}", dir.display());
    fs::create_dir_all(dir.join(FILES_DIR))?;

    let script = dir.join(entrypoint);
    if let Some(parent) = script.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&script, BOOTSTRAP_TEMPLATE)?;
    set_executable(&script)?;

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "payload".to_string());
    fs::write(dir.join(README_FILE), readme(&name, entrypoint))?;

    Ok(InitResult {
        dir: dir.to_path_buf(),
        entrypoint: entrypoint.to_string(),
    })
}

fn readme(name: &str, entrypoint: &str) -> String {
    format!(
        r#"# {name}

Payload directory for a self-extracting installer.

- `{entrypoint}`: installation script run by `installer.sh --run`
- `files/`: application files and resources

## Building

```sh
mksfx build . -o {name}-installer.tar.gz -e {entrypoint}
mksfx verify {name}-installer.tar.gz
```

## Installing

```sh
tar -xzf {name}-installer.tar.gz
cd bundle
sh installer.sh --verify
sh installer.sh --run
```
"#
    )
}
