//! Terminal summaries for command results.

use anyhow::Context;
use serde::Serialize;

use crate::bundle::{BuildResult, InfoResult, VerifyResult};
use crate::init::InitResult;
use crate::update::UpdateResult;

/// `B` below 1 KiB, `KB` with one decimal below 1 MiB, `MB` with two above.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    }
}

/// Signed variant for overhead and savings, which can go negative.
pub fn format_signed_size(bytes: i64) -> String {
    let size = format_size(bytes.unsigned_abs());
    if bytes < 0 { format!("-{}", size) } else { size }
}

fn print_stat(label: &str, value: impl std::fmt::Display) {
    println!("  {:<18}{}", format!("{}:", label), value);
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

pub fn print_build(result: &BuildResult) {
    println!("Bundle created: {}", result.output.display());
    print_stat("Version", &result.version);
    print_stat("Entrypoint", &result.entrypoint);
    print_stat("Size", format_size(result.size));
    print_stat("Payload", format_size(result.payload_size));
    print_stat(
        "Overhead",
        format!("{} ({}%)", format_signed_size(result.overhead), result.overhead_percent),
    );
    print_stat("Checksum", &result.checksum);
    print_stat("Manifest seal", &result.manifest_seal);
}

pub fn print_update(result: &UpdateResult) {
    println!("Update created: {}", result.output.display());
    print_stat("From", &result.old_version);
    print_stat("To", &result.new_version);
    print_stat("Algorithm", result.algorithm);
    print_stat("Size", format_size(result.size));
    print_stat("Full bundle", format_size(result.full_size));
    print_stat(
        "Savings",
        format!("{} ({}%)", format_signed_size(result.savings), result.savings_percent),
    );
    println!();
    println!(
        "=== Changes (+{} *{} -{}) ===",
        result.files_added, result.files_changed, result.files_removed
    );
    for diff in result.delta.iter() {
        println!("  {} {}", diff.symbol(), diff.path().display());
    }
}

pub fn print_verify(result: &VerifyResult) {
    println!("Bundle verified: {}", result.bundle.display());
    print_stat("Version", &result.version);
    print_stat("Entrypoint", &result.entrypoint);
    print_stat("Checksum", &result.checksum);
    print_stat("Manifest seal", &result.manifest_seal);
}

pub fn print_info(result: &InfoResult) {
    println!("Bundle: {}", result.bundle.display());
    println!();
    println!("=== Manifest ===");
    print_stat("Version", &result.version);
    print_stat("Entrypoint", &result.entrypoint);
    print_stat("Payload-Checksum", &result.manifest_checksum);
    for (key, value) in &result.metadata {
        print_stat(key, value);
    }
    println!();
    println!("=== Sizes ===");
    print_stat("Total", format_size(result.total_size));
    print_stat("Payload", format_size(result.payload_size));
    print_stat(
        "Overhead",
        format!("{} ({}%)", format_signed_size(result.overhead), result.overhead_percent),
    );
    print_stat("Checksum", &result.checksum);

    if let Some(files) = &result.files {
        println!();
        println!("=== Files ({}) ===", files.len());
        for file in files {
            println!("  {}", file);
        }
    }
}

pub fn print_init(result: &InitResult) {
    println!("Payload directory initialized: {}", result.dir.display());
    println!();
    println!("  {}/", result.dir.display());
    println!("    {}  (installation script)", result.entrypoint);
    println!("    files/  (application files)");
    println!("    README.md");
    println!();
    println!("Next: edit {}, add files, then run `mksfx build {}`", result.entrypoint, result.dir.display());
}
