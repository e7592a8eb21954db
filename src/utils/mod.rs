use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::common::{COLORIZED_SUFFIX, OUTPUT_EXTENSION};

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("static regex must compile"));

pub trait PathExt {
    fn ext_lower(&self) -> String;
}

impl PathExt for Path {
    fn ext_lower(&self) -> String {
        self.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Derive the output name for an input: stem + `_colorized` + `.png`.
///
/// This is the only cache key; file contents are never hashed.
pub fn colorized_name(input_name: &str) -> String {
    format!(
        "{}{}.{}",
        file_stem(input_name),
        COLORIZED_SUFFIX,
        OUTPUT_EXTENSION
    )
}

/// Logical name of a batch entry: anything not already `.png` is renamed to
/// `<stem>.png`. The file itself is still read under its real name.
pub fn normalized_name(file_name: &str) -> String {
    match Path::new(file_name).extension().and_then(|s| s.to_str()) {
        Some(ext) if ext == OUTPUT_EXTENSION => file_name.to_string(),
        _ => format!("{}.{}", file_stem(file_name), OUTPUT_EXTENSION),
    }
}

/// Reduce a client supplied file name to a single safe path component.
///
/// Returns an empty string when nothing usable is left.
pub fn sanitize_filename(raw: &str) -> String {
    let joined = raw
        .replace(['/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(&joined, "");
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}
