use anyhow::Result;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::discord::human_bytes;
use crate::discord::webhook::WebhookPoster;

pub const DEFAULT_MAX_BYTES: u64 = 8 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 10;
/// Room left for multipart headers and the JSON payload.
pub const DEFAULT_OVERHEAD: u64 = 200_000;

#[derive(Debug, Clone)]
pub struct SendOptions {
    pub max_bytes: u64,
    pub max_files: usize,
    pub overhead: u64,
    pub message_prefix: String,
    pub username: Option<String>,
    pub sleep: Duration,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_files: DEFAULT_MAX_FILES,
            overhead: DEFAULT_OVERHEAD,
            message_prefix: "VRChat screenshots ".to_string(),
            username: None,
            sleep: Duration::from_secs(1),
        }
    }
}

fn file_size(path: &Path) -> Option<u64> {
    path.metadata().map(|m| m.len()).ok()
}

pub fn total_size(files: &[PathBuf]) -> u64 {
    files.iter().filter_map(|p| file_size(p)).sum()
}

/// Groups files in order so each group's size plus `overhead` stays within
/// `max_bytes` and holds at most `max_files`. A file too large on its own
/// gets a group to itself. Unreadable files are dropped.
pub fn chunk_files_by_size(
    files: &[PathBuf],
    max_bytes: u64,
    max_files: usize,
    overhead: u64,
) -> Vec<Vec<PathBuf>> {
    let mut chunks = Vec::new();
    let mut current: Vec<PathBuf> = Vec::new();
    let mut current_size = overhead;

    for file in files {
        let Some(size) = file_size(file) else {
            tracing::debug!(file = %file.display(), "skipping unreadable file");
            continue;
        };

        if current.is_empty() {
            if size + overhead <= max_bytes && max_files > 0 {
                current.push(file.clone());
                current_size = size + overhead;
            } else {
                chunks.push(vec![file.clone()]);
            }
            continue;
        }

        if current.len() >= max_files || current_size + size > max_bytes {
            chunks.push(std::mem::take(&mut current));
            current.push(file.clone());
            current_size = size + overhead;
        } else {
            current.push(file.clone());
            current_size += size;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Posts `images` in size-bounded batches, pausing between posts.
/// Returns the number of posts made; the first failed post aborts the run.
pub fn send_batched(
    poster: &dyn WebhookPoster,
    images: &[PathBuf],
    options: &SendOptions,
) -> Result<usize> {
    if images.is_empty() {
        println!("No images to send.");
        return Ok(0);
    }

    let chunks = chunk_files_by_size(images, options.max_bytes, options.max_files, options.overhead);
    println!("📤 Sending {} image(s) in {} post(s)", images.len(), chunks.len());

    for (i, chunk) in chunks.iter().enumerate() {
        let content = format!(
            "{}({}/{}) {} file(s), ~{}",
            options.message_prefix,
            i + 1,
            chunks.len(),
            chunk.len(),
            human_bytes(total_size(chunk))
        );
        poster.post(&content, chunk, options.username.as_deref())?;
        println!("   Posted {}/{}: {} file(s)", i + 1, chunks.len(), chunk.len());

        if i + 1 != chunks.len() && !options.sleep.is_zero() {
            thread::sleep(options.sleep);
        }
    }
    Ok(chunks.len())
}

/// Dry-run listing of what `send_batched` would post.
pub fn print_plan(images: &[PathBuf], chunks: &[Vec<PathBuf>]) {
    println!(
        "[DRY RUN] matched {} image(s), will send {} post(s)",
        images.len(),
        chunks.len()
    );
    for (i, chunk) in chunks.iter().enumerate() {
        println!(
            "[DRY RUN] Post {}/{}: {} file(s), ~{}",
            i + 1,
            chunks.len(),
            chunk.len(),
            human_bytes(total_size(chunk))
        );
        for file in chunk {
            if let Some(name) = file.file_name() {
                println!("  - {}", name.to_string_lossy());
            }
        }
    }
}
