use std::path::PathBuf;

const UNSAFE: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces characters that are invalid in file names on common filesystems.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE.contains(&c) { '_' } else { c })
        .collect()
}

/// A single folder name built from a free-form title. `None` when nothing
/// usable is left, including names that would resolve to `.` or `..`.
pub fn safe_folder_name(raw: &str) -> Option<String> {
    let name = sanitize_name(raw.trim());
    let name = name.trim();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        return None;
    }
    Some(name.to_string())
}

/// Turns a recorded archive path into a relative path that stays inside the
/// destination: separators of either style are honoured, root/drive
/// prefixes and `.`/`..` components are dropped, and each remaining
/// component is passed through [`sanitize_name`].
pub fn sanitize_relative_path(raw: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for (i, part) in raw.split(['/', '\\']).enumerate() {
        let part = part.trim();
        if part.is_empty() || part == "." || part == ".." {
            continue;
        }
        // "C:" drive prefix on the first component.
        if i == 0 && part.len() == 2 && part.ends_with(':') {
            continue;
        }
        out.push(sanitize_name(part));
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}
