//! Batch uploader for VRChat screenshots to a Discord webhook.

pub mod batch;
pub mod webhook;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

use crate::utils::file_utils;

pub use batch::{chunk_files_by_size, send_batched, SendOptions};
pub use webhook::{WebhookClient, WebhookPoster};

pub const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
pub const SCREENSHOTS_ENV: &str = "VRCHAT_SCREENSHOTS_DIR";
pub const WEBHOOK_ENV: &str = "DISCORD_WEBHOOK_URL";

/// Likely screenshot folders, `VRCHAT_SCREENSHOTS_DIR` first. Callers check
/// which of them exist.
pub fn guess_screenshot_dirs() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = std::env::var_os(SCREENSHOTS_ENV) {
        candidates.push(PathBuf::from(dir));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("Pictures").join("VRChat"));
        candidates.push(home.join("Pictures").join("VRChat").join("VRChat"));
        candidates.push(home.join("Documents").join("VRChat"));
        candidates.push(home.join("Videos").join("VRChat"));
    }

    let mut unique: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

pub fn find_existing_dir(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_dir()).cloned()
}

/// Oldest modification time kept by `--since-days`. Spans longer than the
/// clock can represent clamp to the epoch, which keeps everything.
pub fn since_cutoff(now: SystemTime, days: u64) -> SystemTime {
    let span = Duration::from_secs(days.saturating_mul(24 * 60 * 60));
    now.checked_sub(span).unwrap_or(SystemTime::UNIX_EPOCH)
}

fn modified(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Images under `root`, oldest first. With `since`, files modified before
/// it are dropped.
pub fn collect_images(root: &Path, recursive: bool, since: Option<SystemTime>) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 });

    let mut images: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !file_utils::has_extension(path, IMAGE_EXTS) {
            continue;
        }
        let Some(mtime) = modified(path) else {
            continue;
        };
        if since.is_some_and(|s| mtime < s) {
            continue;
        }
        images.push((mtime, entry.into_path()));
    }

    images.sort();
    Ok(images.into_iter().map(|(_, p)| p).collect())
}

/// `1023B`, `1.50KB`, `8.00MB`, ...
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if n < 1024 {
        return format!("{n}B");
    }
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2}{}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn human_bytes_scales_units() {
        assert_eq!(human_bytes(0), "0B");
        assert_eq!(human_bytes(1023), "1023B");
        assert_eq!(human_bytes(1536), "1.50KB");
        assert_eq!(human_bytes(8 * 1024 * 1024), "8.00MB");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024 * 1024), "3072.00GB");
    }

    #[test]
    fn collect_respects_recursion_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        fs::write(dir.path().join("notes.txt"), b"n").unwrap();
        fs::create_dir(dir.path().join("2026-01")).unwrap();
        fs::write(dir.path().join("2026-01").join("b.JPG"), b"b").unwrap();

        let flat = collect_images(dir.path(), false, None).unwrap();
        assert_eq!(flat, vec![dir.path().join("a.png")]);

        let deep = collect_images(dir.path(), true, None).unwrap();
        assert_eq!(deep.len(), 2);
    }

    #[test]
    fn collect_filters_by_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.png"), b"o").unwrap();
        let future = SystemTime::now() + std::time::Duration::from_secs(3600);
        assert!(collect_images(dir.path(), false, Some(future)).unwrap().is_empty());
        assert_eq!(
            collect_images(dir.path(), false, Some(SystemTime::UNIX_EPOCH)).unwrap().len(),
            1
        );
    }

    #[test]
    fn since_cutoff_counts_whole_days_and_saturates() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(10 * 86_400);
        assert_eq!(
            since_cutoff(now, 3),
            SystemTime::UNIX_EPOCH + Duration::from_secs(7 * 86_400)
        );
        assert_eq!(since_cutoff(now, 0), now);
        assert_eq!(since_cutoff(SystemTime::now(), u64::MAX), SystemTime::UNIX_EPOCH);
    }

    #[test]
    fn guesses_are_unique() {
        let dirs = guess_screenshot_dirs();
        for (i, d) in dirs.iter().enumerate() {
            assert!(!dirs[i + 1..].contains(d));
        }
    }
}
