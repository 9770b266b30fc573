use std::path::Path;

/// Reduces a client-supplied filename to its final path component.
///
/// Browsers on Windows may send `C:\Users\me\data.csv`, other clients
/// `dir/data.csv`; only `data.csv` is kept. Control characters are removed.
/// Returns `None` when nothing usable remains, which callers treat as
/// "no file uploaded".
pub fn original_file_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("");
    if last.len() != raw.len() {
        tracing::debug!("Stripped directory components from filename: {}", raw);
    }

    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    // `Path::file_name` rejects "." and ".."
    Path::new(cleaned)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n == cleaned)
        .map(|n| n.to_string())
}
