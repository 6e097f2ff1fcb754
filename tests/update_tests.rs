use anyhow::Result;
use flate2::read::GzDecoder;
use mksfx::archive::{ArchiveCodec, TarGzCodec};
use mksfx::bundle::{BuildOptions, build_bundle};
use mksfx::error::UpdateError;
use mksfx::update::{Algorithm, UpdateManifest, UpdateOptions, create_update};
use mksfx::utils::list_files;
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_file(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

fn read_members(archive: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut members = BTreeMap::new();
    let mut tar = tar::Archive::new(GzDecoder::new(fs::File::open(archive)?));
    for entry in tar.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        members.insert(name, contents);
    }
    Ok(members)
}

/// Build `app-<version>.tar.gz` from a payload of `files` plus an entrypoint.
fn bundle(root: &Path, version: &str, files: &[(&str, &str)]) -> Result<PathBuf> {
    let source = root.join(format!("src-{}", version));
    write_file(&source, "bootstrap.sh", b"#!/bin/sh\n");
    for (name, contents) in files {
        write_file(&source, name, contents.as_bytes());
    }
    let output = root.join(format!("app-{}.tar.gz", version));
    build_bundle(
        &source,
        &BuildOptions {
            output: output.clone(),
            version: version.to_string(),
            ..Default::default()
        },
    )?;
    Ok(output)
}

#[test]
fn update_between_two_bundles() -> Result<()> {
    let dir = TempDir::new()?;
    let old = bundle(dir.path(), "1.0.0", &[("a.txt", "alpha"), ("b.txt", "bravo")])?;
    let new = bundle(dir.path(), "1.1.0", &[("b.txt", "bravo, modified"), ("c.txt", "charlie")])?;
    let output = dir.path().join("update.tar.gz");

    let result = create_update(
        &old,
        &new,
        &UpdateOptions {
            output: Some(output.clone()),
            ..Default::default()
        },
    )?;

    assert_eq!(result.old_version, "1.0.0");
    assert_eq!(result.new_version, "1.1.0");
    assert_eq!(result.delta.added, [PathBuf::from("c.txt")]);
    assert_eq!(result.delta.removed, [PathBuf::from("a.txt")]);
    // MANIFEST differs between versions as well.
    assert_eq!(result.delta.changed, [PathBuf::from("MANIFEST"), PathBuf::from("b.txt")]);
    assert_eq!(
        (result.files_added, result.files_changed, result.files_removed),
        (1, 2, 1)
    );
    assert_eq!(result.algorithm, "whole-file");
    assert_eq!(result.size, fs::metadata(&output)?.len());
    assert_eq!(result.full_size, fs::metadata(&new)?.len());
    assert_eq!(result.savings, result.full_size as i64 - result.size as i64);
    Ok(())
}

#[test]
fn update_package_layout() -> Result<()> {
    let dir = TempDir::new()?;
    let old = bundle(dir.path(), "1.0.0", &[("a.txt", "alpha"), ("b.txt", "bravo")])?;
    let new = bundle(dir.path(), "1.1.0", &[("b.txt", "bravo, modified"), ("c.txt", "charlie")])?;
    let output = dir.path().join("update.tar.gz");

    create_update(
        &old,
        &new,
        &UpdateOptions {
            output: Some(output.clone()),
            algorithm: Algorithm::WholeFile,
            ..Default::default()
        },
    )?;

    let members = read_members(&output)?;
    assert_eq!(members["update/files/added/c.txt"], b"charlie");
    assert_eq!(members["update/files/changed/b.txt"], b"bravo, modified");
    assert!(!members.contains_key("update/files/added/a.txt"));
    assert!(!members.contains_key("update/files/changed/a.txt"));
    assert!(members.contains_key("update/update.sh"));

    let manifest = UpdateManifest::parse(std::str::from_utf8(&members["update/UPDATE_MANIFEST"])?)?;
    assert_eq!(manifest.added, 1);
    assert_eq!(manifest.changed, 2);
    assert_eq!(manifest.removed, ["a.txt"]);
    Ok(())
}

#[test]
fn unchanged_payloads_give_empty_delta() -> Result<()> {
    let dir = TempDir::new()?;
    let old = bundle(dir.path(), "1.0.0", &[("same.txt", "same")])?;
    let copy = dir.path().join("copy-1.0.0.tar.gz");
    fs::copy(&old, &copy)?;

    let result = create_update(
        &old,
        &copy,
        &UpdateOptions {
            output: Some(dir.path().join("noop.tar.gz")),
            ..Default::default()
        },
    )?;

    assert!(result.delta.is_empty());
    Ok(())
}

#[test]
fn missing_new_archive_is_an_update_error() -> Result<()> {
    let dir = TempDir::new()?;
    let old = bundle(dir.path(), "1.0.0", &[])?;
    let output = dir.path().join("update.tar.gz");

    let err = create_update(
        &old,
        &dir.path().join("app-9.9.9.tar.gz"),
        &UpdateOptions {
            output: Some(output.clone()),
            ..Default::default()
        },
    )
    .unwrap_err();

    assert!(matches!(err, UpdateError::ArchiveNotFound { role: "new", .. }));
    assert!(err.to_string().contains("app-9.9.9.tar.gz"));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn non_bundle_input_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let old = bundle(dir.path(), "1.0.0", &[])?;
    let bogus = write_file(dir.path(), "bogus.tar.gz", b"definitely not gzip");

    let err = create_update(
        &old,
        &bogus,
        &UpdateOptions {
            output: Some(dir.path().join("update.tar.gz")),
            ..Default::default()
        },
    )
    .unwrap_err();

    assert!(matches!(err, UpdateError::Codec(_)));
    Ok(())
}

/// Unpack `bundle` and its inner payload archive below `dir`; returns the payload tree.
#[cfg(unix)]
fn unpack_payload(bundle: &Path, dir: &Path) -> Result<PathBuf> {
    TarGzCodec.extract(bundle, dir)?;
    TarGzCodec.extract(&dir.join("bundle/payload.tar.gz"), dir)?;
    Ok(dir.join("payload"))
}

/// Every regular file below `tree` with its contents.
#[cfg(unix)]
fn snapshot(tree: &Path) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for relative in list_files(tree)?.into_keys() {
        let contents = fs::read(tree.join(&relative))?;
        files.insert(relative, contents);
    }
    Ok(files)
}

/// Build both bundles, create the update, run its `update.sh` against the old
/// payload and require the result to equal the new payload.
#[cfg(unix)]
fn apply_matches_new_payload(
    old_files: &[(&str, &str)],
    new_files: &[(&str, &str)],
) -> Result<()> {
    use std::process::Command;

    let dir = TempDir::new()?;
    let old = bundle(dir.path(), "1.0.0", old_files)?;
    let new = bundle(dir.path(), "2.0.0", new_files)?;
    let update = dir.path().join("update.tar.gz");
    create_update(
        &old,
        &new,
        &UpdateOptions {
            output: Some(update.clone()),
            ..Default::default()
        },
    )?;

    let installed = unpack_payload(&old, &dir.path().join("installed"))?;
    let expected = unpack_payload(&new, &dir.path().join("expected"))?;
    let unpacked = dir.path().join("unpacked");
    TarGzCodec.extract(&update, &unpacked)?;

    let output = Command::new("sh")
        .arg(unpacked.join("update/update.sh"))
        .env("PAYLOAD_DIR", &installed)
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(snapshot(&installed)?, snapshot(&expected)?);
    Ok(())
}

#[cfg(unix)]
#[test]
fn update_script_turns_old_payload_into_new() -> Result<()> {
    apply_matches_new_payload(
        &[("a.txt", "alpha"), ("b.txt", "bravo"), ("lib/old/x.so", "x")],
        &[("b.txt", "bravo, modified"), ("c.txt", "charlie"), ("lib/new/y.so", "y")],
    )
}

#[cfg(unix)]
#[test]
fn update_script_replaces_file_with_directory() -> Result<()> {
    apply_matches_new_payload(&[("conf", "flat")], &[("conf/app.ini", "[app]")])
}

#[cfg(unix)]
#[test]
fn update_script_replaces_directory_with_file() -> Result<()> {
    apply_matches_new_payload(&[("data/cache/blob.bin", "blob")], &[("data", "flat")])
}
