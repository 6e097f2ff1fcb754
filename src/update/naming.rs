use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("version pattern is a valid regex"));

/// First `N.N.N` substring of the file name of `archive`.
pub fn version_from_filename(archive: &Path) -> Option<String> {
    let name = archive.file_name()?.to_string_lossy();
    VERSION_PATTERN.find(&name).map(|m| m.as_str().to_string())
}

/// `update-<old>-to-<new>.tar.gz`, each side falling back to `today` as
/// `YYYYMMDD` when its file name carries no version.
pub fn default_update_name(old_archive: &Path, new_archive: &Path, today: NaiveDate) -> PathBuf {
    let fallback = || today.format("%Y%m%d").to_string();
    let old = version_from_filename(old_archive).unwrap_or_else(fallback);
    let new = version_from_filename(new_archive).unwrap_or_else(fallback);
    PathBuf::from(format!("update-{}-to-{}.tar.gz", old, new))
}
