// dispatch_core/src/utils.rs

//! Helpers shared by the parsers and the ingestion driver.

use anyhow::Context;
use itertools::Itertools;

/// Timestamp layout used by both dispatch dialects, quotes included.
pub const DISPATCH_TIME_FORMAT: &str = "\"%Y/%m/%d %H:%M:%S\"";

/// Converts a string representation of a date and time into a `chrono::NaiveDateTime`.
///
/// # Arguments
/// * `string` - The date-time string to parse (e.g., `"2014/01/01 00:05:00"` with the quotes).
/// * `format` - The expected format of the input string (e.g., `DISPATCH_TIME_FORMAT`).
///
/// # Returns
/// * `anyhow::Result<chrono::NaiveDateTime>` - The parsed market time on success, or an error if parsing fails.
pub fn string_to_date_time(string: &str, format: &str) -> anyhow::Result<chrono::NaiveDateTime> {
    let dt = chrono::NaiveDateTime::parse_from_str(
        string.trim(),
        format,
    ).with_context(|| format!(
        "Invalid timestamp '{}' for format '{}'",
        string,
        format
    ))?;

    anyhow::Ok(dt)
}

/// Lists the entries of `dir` sorted by file name.
pub fn sorted_dir_entries(dir: &std::path::Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to list directory {}", dir.display()))?;

    anyhow::Ok(entries
        .into_iter()
        .sorted_by(|a, b| a.file_name().cmp(&b.file_name()))
        .collect())
}

/// Case-insensitive suffix match, e.g. `has_extension("X.ZIP", ".zip")`.
pub fn has_extension(name: &str, extension: &str) -> bool {
    name.len() >= extension.len()
        && name.is_char_boundary(name.len() - extension.len())
        && name[name.len() - extension.len()..].eq_ignore_ascii_case(extension)
}

/// File name component of a path, lossily converted.
pub fn file_name_of(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
