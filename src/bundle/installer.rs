//! The `installer.sh` shipped next to the payload archive.

use std::fs;
use std::io;
use std::path::Path;

use crate::utils::{Checksum, set_executable};

const CHECKSUM_ASSIGNMENT: &str = "EMBEDDED_CHECKSUM=";
const CHECKSUM_PLACEHOLDER: &str = "EMBEDDED_CHECKSUM=\"PLACEHOLDER\"";

const TEMPLATE: &str = r#"#!/bin/sh
# Self-extracting installer generated by mksfx.
set -e

EMBEDDED_CHECKSUM="PLACEHOLDER"
SCRIPT_DIR="$(cd "$(dirname "$0")" && pwd)"
PAYLOAD_ARCHIVE="$SCRIPT_DIR/payload.tar.gz"
PAYLOAD_DIR="$SCRIPT_DIR/payload"

usage() {
  echo "Usage: sh installer.sh [--verify | --extract | --run | --help]"
  echo ""
  echo "  --verify   check the payload archive against the embedded SHA-256"
  echo "  --extract  verify, then unpack the payload next to this script"
  echo "  --run      verify, unpack and run the payload entrypoint"
}

sha256_of() {
  if command -v sha256sum >/dev/null 2>&1; then
    sha256sum "$1" | cut -d' ' -f1
  elif command -v shasum >/dev/null 2>&1; then
    shasum -a 256 "$1" | cut -d' ' -f1
  else
    echo "error: neither sha256sum nor shasum is available" >&2
    exit 1
  fi
}

verify_payload() {
  if [ ! -f "$PAYLOAD_ARCHIVE" ]; then
    echo "error: payload archive not found: $PAYLOAD_ARCHIVE" >&2
    exit 1
  fi
  actual="$(sha256_of "$PAYLOAD_ARCHIVE")"
  if [ "$actual" != "$EMBEDDED_CHECKSUM" ]; then
    echo "error: checksum mismatch" >&2
    echo "  expected: $EMBEDDED_CHECKSUM" >&2
    echo "  actual:   $actual" >&2
    exit 1
  fi
  echo "Payload checksum OK"
}

extract_payload() {
  verify_payload
  tar -xzf "$PAYLOAD_ARCHIVE" -C "$SCRIPT_DIR"
  echo "Payload extracted to $PAYLOAD_DIR"
}

run_payload() {
  extract_payload
  entrypoint="$(sed -n 's/^Bootstrap-Entrypoint: //p' "$PAYLOAD_DIR/MANIFEST" | head -n 1)"
  if [ -z "$entrypoint" ]; then
    echo "error: MANIFEST names no Bootstrap-Entrypoint" >&2
    exit 1
  fi
  cd "$PAYLOAD_DIR"
  sh "./$entrypoint"
}

case "${1:---help}" in
  --verify) verify_payload ;;
  --extract) extract_payload ;;
  --run) run_payload ;;
  -h|--help) usage ;;
  *) usage >&2; exit 1 ;;
esac
"#;

/// Installer script text with `checksum` embedded.
pub fn render(checksum: &Checksum) -> String {
    TEMPLATE.replacen(
        CHECKSUM_PLACEHOLDER,
        &format!("{}\"{}\"", CHECKSUM_ASSIGNMENT, checksum),
        1,
    )
}

pub fn write(path: &Path, checksum: &Checksum) -> io::Result<()> {
    fs::write(path, render(checksum))?;
    set_executable(path)
}

/// The checksum literal embedded by [`render`], if the script carries exactly one.
pub fn embedded_checksum(script: &str) -> Option<Checksum> {
    let mut literals = script
        .lines()
        .filter_map(|line| line.trim().strip_prefix(CHECKSUM_ASSIGNMENT))
        .map(|value| value.trim_matches('"'));
    let literal = literals.next()?;
    if literals.next().is_some() {
        return None;
    }
    Checksum::from_hex(literal)
}
