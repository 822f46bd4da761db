//! Helpers for sanitizing user-supplied file names and keeping paths out of
//! tracing span attributes.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces an uploaded file name to a safe single path component.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; whitespace becomes `_`;
/// everything else is dropped. Leading dots are stripped so the result is
/// never hidden or a parent reference.
pub fn sanitize_file_name(name: &str) -> String {
    // Browsers on Windows may send the full client path
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();

    cleaned.trim_start_matches('.').to_string()
}

/// True if `name` is a plain file name that stays inside its directory.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Case-insensitive `.xlsx` extension check.
pub fn has_xlsx_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("xlsx"))
        .unwrap_or(false)
}
