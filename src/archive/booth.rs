use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::archive::process_log::ProcessLog;
use crate::archive::sanitize::safe_folder_name;

pub const DEFAULT_INDEX_NAME: &str = "downloadHistory_AE.json";
pub const INFO_FILE: &str = "info.txt";

const ZIP_MAGIC: [&[u8; 4]; 2] = [b"PK\x03\x04", b"PK\x05\x06"];

/// One purchase record in the download-history sidecar.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct DownloadIndex {
    pub entries: Vec<IndexEntry>,
}

impl DownloadIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let entries: Vec<IndexEntry> = serde_json::from_str(&text)
            .with_context(|| format!("Invalid index {}", path.display()))?;
        Ok(Self { entries })
    }

    /// First entry listing `file_name` among its files.
    pub fn find(&self, file_name: &str) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|e| e.files.iter().any(|f| f == file_name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoothSummary {
    pub extracted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSummary {
    pub moved: usize,
    pub missing: usize,
}

/// Zip detection by signature rather than extension.
pub fn is_zip(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    match File::open(path).and_then(|mut f| f.read_exact(&mut magic)) {
        Ok(()) => ZIP_MAGIC.iter().any(|m| **m == magic),
        Err(_) => false,
    }
}

/// Index file names must not reach outside the working folder.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn load_optional_index(working_dir: &Path, index_name: &str, log: &ProcessLog) -> Option<DownloadIndex> {
    let path = working_dir.join(index_name);
    if !path.is_file() {
        log.log(&format!("Index {index_name} not found, folder names fall back to zip names"));
        return None;
    }
    match DownloadIndex::load(&path) {
        Ok(index) => {
            log.log(&format!("Loaded index {index_name} ({} entries)", index.entries.len()));
            Some(index)
        }
        Err(e) => {
            log.warn(&format!("{e:#}"));
            None
        }
    }
}

/// Extracts every zip in `working_dir` into a folder named after its
/// index title (or its own stem), moves the zip inside and leaves an
/// `info.txt` behind. A failing zip is rolled back and skipped.
pub fn process_folder(working_dir: &Path, index_name: &str) -> Result<BoothSummary> {
    if !working_dir.is_dir() {
        bail!("Folder not found: {}", working_dir.display());
    }
    let log = ProcessLog::in_dir(working_dir);
    log.log("=== booth run started ===");
    log.log(&format!("Working folder: {}", working_dir.display()));

    let index = load_optional_index(working_dir, index_name, &log);

    let mut zips = Vec::new();
    for entry in fs::read_dir(working_dir)? {
        let path = entry?.path();
        if path.is_file() && is_zip(&path) {
            zips.push(path);
        }
    }
    zips.sort();

    let mut summary = BoothSummary::default();
    for zip_path in zips {
        log.log(&format!("Zip found: {}", file_name_string(&zip_path)));
        match handle_zip(&zip_path, working_dir, index.as_ref(), &log) {
            Ok(folder) => {
                println!("📦 {} -> {}", file_name_string(&zip_path), folder.display());
                summary.extracted += 1;
            }
            Err(e) => {
                log.warn(&format!("Failed on {}: {e:#}", file_name_string(&zip_path)));
                summary.failed += 1;
            }
        }
    }

    println!(
        "✅ Booth folder done: {} extracted, {} failed",
        summary.extracted, summary.failed
    );
    Ok(summary)
}

fn handle_zip(
    zip_path: &Path,
    working_dir: &Path,
    index: Option<&DownloadIndex>,
    log: &ProcessLog,
) -> Result<PathBuf> {
    let zip_name = file_name_string(zip_path);
    let matched = index.and_then(|i| i.find(&zip_name));

    let stem = zip_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = matched
        .and_then(|e| e.title.as_deref())
        .and_then(safe_folder_name)
        .or_else(|| safe_folder_name(&stem))
        .unwrap_or_else(|| "_".to_string());
    let folder = working_dir.join(name);
    if folder.parent() != Some(working_dir) {
        bail!("Destination folder {} is outside {}", folder.display(), working_dir.display());
    }
    if folder == zip_path {
        bail!("Destination folder would replace the zip itself");
    }
    log.log(&format!("Destination folder: {}", folder.display()));

    let created = !folder.exists();
    let result = unzip_into(zip_path, &folder, log).and_then(|()| {
        let dest = folder.join(&zip_name);
        fs::rename(zip_path, &dest)
            .with_context(|| format!("Failed to move zip into {}", folder.display()))
    });
    if let Err(e) = result {
        if created && folder.exists() {
            if let Err(rm) = fs::remove_dir_all(&folder) {
                log.warn(&format!("Cleanup of {} failed: {rm}", folder.display()));
            }
        }
        return Err(e);
    }

    write_info(&folder, &zip_name, matched)?;
    log.log(&format!("Done: {zip_name} -> {}", folder.display()));
    Ok(folder)
}

fn unzip_into(zip_path: &Path, folder: &Path, log: &ProcessLog) -> Result<()> {
    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Not a readable zip: {}", zip_path.display()))?;
    fs::create_dir_all(folder)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| anyhow!("Unsafe entry name: {}", entry.name()))?;
        let dest = folder.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest)
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        io::copy(&mut entry, &mut out)?;
    }
    log.log(&format!("Extracted {} entries", archive.len()));
    Ok(())
}

fn write_info(folder: &Path, zip_name: &str, matched: Option<&IndexEntry>) -> Result<()> {
    let mut text = format!(
        "Zip file: {zip_name}\nDestination: {}\nProcessed: {}\n\n",
        folder.display(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    match matched {
        Some(entry) => {
            text.push_str("Index entry:\n");
            text.push_str(&serde_json::to_string_pretty(entry)?);
            text.push('\n');
        }
        None => text.push_str("No matching entry in the index.\n"),
    }
    fs::write(folder.join(INFO_FILE), text)?;
    Ok(())
}

/// Index-driven sorter: moves each listed file into a folder named after
/// its entry's title, then deletes the index.
pub fn sort_by_index(working_dir: &Path, index_name: &str) -> Result<SortSummary> {
    let index_path = working_dir.join(index_name);
    if !index_path.is_file() {
        bail!("Index not found: {}", index_path.display());
    }
    let log = ProcessLog::in_dir(working_dir);
    let index = DownloadIndex::load(&index_path)?;

    let mut summary = SortSummary::default();
    for entry in &index.entries {
        let title = entry.title.as_deref().map(str::trim).unwrap_or("");
        if title.is_empty() || entry.files.is_empty() {
            log.warn(&format!("Skipping incomplete entry: {}", serde_json::to_string(entry)?));
            continue;
        }

        let Some(name) = safe_folder_name(title) else {
            log.warn(&format!("Skipping entry with unusable title: {title:?}"));
            summary.missing += entry.files.len();
            continue;
        };
        let folder = working_dir.join(name);
        fs::create_dir_all(&folder)
            .with_context(|| format!("Failed to create {}", folder.display()))?;

        for name in &entry.files {
            if !is_plain_file_name(name) {
                log.warn(&format!("Ignoring non-plain file name: {name}"));
                summary.missing += 1;
                continue;
            }
            let source = working_dir.join(name);
            if !source.is_file() {
                log.warn(&format!("File not found: {}", source.display()));
                summary.missing += 1;
                continue;
            }
            fs::rename(&source, folder.join(name))
                .with_context(|| format!("Failed to move {}", source.display()))?;
            log.log(&format!("Moved {name} -> {}", folder.display()));
            summary.moved += 1;
        }
    }

    fs::remove_file(&index_path)
        .with_context(|| format!("Failed to delete {}", index_path.display()))?;
    log.log(&format!("Deleted index {index_name}"));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn zip_is_detected_by_signature() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("renamed.bin");
        write_zip(&real, &[("a.txt", "a")]);
        let fake = dir.path().join("fake.zip");
        fs::write(&fake, b"not a zip").unwrap();

        assert!(is_zip(&real));
        assert!(!is_zip(&fake));
        assert!(!is_zip(&dir.path().join("missing.zip")));
    }

    #[test]
    fn zips_land_in_titled_folders_with_info() {
        let dir = tempfile::tempdir().unwrap();
        write_zip(
            &dir.path().join("avatar_v1.zip"),
            &[("Avatar/readme.txt", "hi"), ("Avatar/model.fbx", "fbx")],
        );
        write_zip(&dir.path().join("other.zip"), &[("x.txt", "x")]);
        fs::write(
            dir.path().join(DEFAULT_INDEX_NAME),
            r#"[{"title": "Cute: Avatar?", "files": ["avatar_v1.zip"], "url": "https://example.invalid/1"}]"#,
        )
        .unwrap();

        let summary = process_folder(dir.path(), DEFAULT_INDEX_NAME).unwrap();
        assert_eq!(summary, BoothSummary { extracted: 2, failed: 0 });

        let titled = dir.path().join("Cute_ Avatar_");
        assert_eq!(fs::read(titled.join("Avatar/readme.txt")).unwrap(), b"hi");
        assert!(titled.join("avatar_v1.zip").is_file());
        assert!(!dir.path().join("avatar_v1.zip").exists());
        let info = fs::read_to_string(titled.join(INFO_FILE)).unwrap();
        assert!(info.contains("Zip file: avatar_v1.zip"));
        assert!(info.contains("https://example.invalid/1"));

        let fallback = dir.path().join("other");
        assert!(fallback.join("x.txt").is_file());
        let info = fs::read_to_string(fallback.join(INFO_FILE)).unwrap();
        assert!(info.contains("No matching entry"));

        assert!(dir.path().join(ProcessLog::FILE_NAME).is_file());
    }

    #[test]
    fn unsafe_zip_is_rolled_back_and_left_in_place() {
        let dir = tempfile::tempdir().unwrap();
        write_zip(
            &dir.path().join("bad.zip"),
            &[("ok.txt", "ok"), ("../escape.txt", "x")],
        );

        let summary = process_folder(dir.path(), DEFAULT_INDEX_NAME).unwrap();
        assert_eq!(summary, BoothSummary { extracted: 0, failed: 1 });
        assert!(!dir.path().join("bad").exists());
        assert!(dir.path().join("bad.zip").is_file());
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn malformed_index_falls_back_to_zip_names() {
        let dir = tempfile::tempdir().unwrap();
        write_zip(&dir.path().join("pack.zip"), &[("a.txt", "a")]);
        fs::write(dir.path().join(DEFAULT_INDEX_NAME), b"{ not json").unwrap();

        let summary = process_folder(dir.path(), DEFAULT_INDEX_NAME).unwrap();
        assert_eq!(summary.extracted, 1);
        assert!(dir.path().join("pack/a.txt").is_file());
    }

    #[test]
    fn sort_moves_listed_files_and_removes_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.zip"), b"1").unwrap();
        fs::write(dir.path().join("two.zip"), b"2").unwrap();
        fs::write(
            dir.path().join(DEFAULT_INDEX_NAME),
            r#"[
                {"title": "Shop/Item", "files": ["one.zip", "two.zip", "gone.zip"]},
                {"title": "", "files": ["x.zip"]},
                {"title": "Sneaky", "files": ["../etc.zip"]}
            ]"#,
        )
        .unwrap();

        let summary = sort_by_index(dir.path(), DEFAULT_INDEX_NAME).unwrap();
        assert_eq!(summary, SortSummary { moved: 2, missing: 2 });
        assert!(dir.path().join("Shop_Item/one.zip").is_file());
        assert!(dir.path().join("Shop_Item/two.zip").is_file());
        assert!(!dir.path().join(DEFAULT_INDEX_NAME).exists());
    }

    #[test]
    fn dot_titles_extract_inside_the_working_folder() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("downloads");
        fs::create_dir(&work).unwrap();
        write_zip(&work.join("pack.zip"), &[("a.txt", "a")]);
        write_zip(&work.join("..zip"), &[("b.txt", "b")]);
        fs::write(
            work.join(DEFAULT_INDEX_NAME),
            r#"[{"title": " .. ", "files": ["pack.zip"]}]"#,
        )
        .unwrap();

        let summary = process_folder(&work, DEFAULT_INDEX_NAME).unwrap();
        assert_eq!(summary, BoothSummary { extracted: 2, failed: 0 });
        assert!(work.join("pack/a.txt").is_file());
        assert!(work.join("pack/pack.zip").is_file());
        assert!(work.join("_/b.txt").is_file());
        assert!(!root.path().join("a.txt").exists());
        assert!(!root.path().join("pack.zip").exists());
        assert!(!root.path().join(INFO_FILE).exists());
        assert!(!work.join("a.txt").exists());
    }

    #[test]
    fn sort_skips_titles_that_name_a_parent() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("downloads");
        fs::create_dir(&work).unwrap();
        fs::write(work.join("one.zip"), b"1").unwrap();
        fs::write(
            work.join(DEFAULT_INDEX_NAME),
            r#"[{"title": "..", "files": ["one.zip"]}]"#,
        )
        .unwrap();

        let summary = sort_by_index(&work, DEFAULT_INDEX_NAME).unwrap();
        assert_eq!(summary, SortSummary { moved: 0, missing: 1 });
        assert!(work.join("one.zip").is_file());
        assert!(!root.path().join("one.zip").exists());
    }

    #[test]
    fn sort_without_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sort_by_index(dir.path(), DEFAULT_INDEX_NAME).is_err());
    }
}
