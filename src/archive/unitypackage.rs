use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use crate::archive::sanitize::sanitize_relative_path;

const STAGING_DIR: &str = ".vrckit_staging";

/// Default destination: `unipack_<stem>` next to the package.
pub fn default_output_dir(package: &Path) -> PathBuf {
    let stem = package
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "package".to_string());
    package
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("unipack_{stem}"))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    pub restored: usize,
    pub skipped: usize,
}

/// Per-GUID pieces collected while streaming the archive.
#[derive(Default)]
struct AssetParts {
    pathname: Option<String>,
    staged_asset: Option<PathBuf>,
}

fn open_entries(package: &Path) -> Result<tar::Archive<GzDecoder<File>>> {
    let file = File::open(package)
        .with_context(|| format!("Failed to open {}", package.display()))?;
    Ok(tar::Archive::new(GzDecoder::new(file)))
}

fn is_unsafe(path: &Path) -> bool {
    path.components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Splits `<guid>/<member>` into its two parts; anything else is ignored.
fn split_member(path: &Path) -> Option<(String, String)> {
    let mut parts = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().to_string());
    let guid = parts.next()?;
    let member = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((guid, member))
}

/// Rejects the whole package if any member path is absolute or climbs out
/// with `..`. Runs before anything is written.
fn validate_members(package: &Path) -> Result<()> {
    let mut archive = open_entries(package)?;
    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?;
        if is_unsafe(&path) {
            bail!(
                "Unsafe path inside {}: {}",
                package.display(),
                path.display()
            );
        }
    }
    Ok(())
}

/// Unpacks a `.unitypackage` and rebuilds the original project layout under
/// `output_dir`, using each asset's recorded `pathname`.
pub fn extract(package: &Path, output_dir: &Path) -> Result<UnpackSummary> {
    validate_members(package)?;

    let staging = output_dir.join(STAGING_DIR);
    fs::create_dir_all(&staging)
        .with_context(|| format!("Failed to create {}", staging.display()))?;

    let result = restore(package, output_dir, &staging);

    if let Err(e) = fs::remove_dir_all(&staging) {
        tracing::warn!(dir = %staging.display(), error = %e, "could not remove staging folder");
    }
    result
}

fn restore(package: &Path, output_dir: &Path, staging: &Path) -> Result<UnpackSummary> {
    let mut assets: BTreeMap<String, AssetParts> = BTreeMap::new();

    let mut archive = open_entries(package)?;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.into_owned();
        let Some((guid, member)) = split_member(&path) else {
            continue;
        };

        match member.as_str() {
            "pathname" => {
                let mut text = String::new();
                entry.read_to_string(&mut text)?;
                let first = text.lines().next().unwrap_or("").trim().to_string();
                assets.entry(guid).or_default().pathname = Some(first);
            }
            "asset" => {
                let staged = staging.join(&guid);
                let mut out = File::create(&staged)
                    .with_context(|| format!("Failed to stage {}", staged.display()))?;
                io::copy(&mut entry, &mut out)?;
                assets.entry(guid).or_default().staged_asset = Some(staged);
            }
            _ => {}
        }
    }

    let mut summary = UnpackSummary::default();
    for (guid, parts) in assets {
        let (Some(pathname), Some(staged)) = (parts.pathname, parts.staged_asset) else {
            tracing::debug!(guid = %guid, "no pathname or asset (folder entry?)");
            summary.skipped += 1;
            continue;
        };
        let Some(relative) = sanitize_relative_path(&pathname) else {
            tracing::warn!(guid = %guid, pathname = %pathname, "empty pathname");
            summary.skipped += 1;
            continue;
        };

        let dest = output_dir.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Err(e) = fs::rename(&staged, &dest).or_else(|_| fs::copy(&staged, &dest).map(|_| ())) {
            tracing::warn!(dest = %dest.display(), error = %e, "failed to place asset");
            summary.skipped += 1;
            continue;
        }
        tracing::debug!(dest = %dest.display(), "asset restored");
        summary.restored += 1;
    }

    tracing::info!(
        package = %package.display(),
        restored = summary.restored,
        skipped = summary.skipped,
        "unitypackage unpacked"
    );
    Ok(summary)
}
