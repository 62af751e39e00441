// SPDX-License-Identifier: MIT OR Apache-2.0
//! ZIP extraction and working-tree root detection (spec.md §4.4 step 4,
//! §9's root-detection test).

use crate::SnapshotError;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Extract `archive_path` into `dest`, returning the resolved working-tree
/// root (a subdirectory of `dest`).
///
/// # Errors
///
/// Returns [`SnapshotError::Zip`] if the file is not a valid archive,
/// [`SnapshotError::Io`] on a filesystem failure, or
/// [`SnapshotError::Structure`] if no usable root directory can be
/// determined.
pub(crate) fn extract_zip(archive_path: &Path, dest: &Path) -> Result<PathBuf, SnapshotError> {
    let file = File::open(archive_path).map_err(|e| SnapshotError::Io(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| SnapshotError::Zip(e.to_string()))?;

    let entry_names: Vec<(bool, String)> = (0..archive.len())
        .map(|i| {
            let entry = archive.by_index(i).map_err(|e| SnapshotError::Zip(e.to_string()))?;
            let name = entry
                .enclosed_name()
                .ok_or_else(|| SnapshotError::Zip(format!("unsafe path in entry {i}")))?
                .to_string_lossy()
                .replace('\\', "/");
            Ok((entry.is_dir(), name))
        })
        .collect::<Result<_, SnapshotError>>()?;

    let root = detect_root(&entry_names).ok_or(SnapshotError::Structure)?;

    std::fs::create_dir_all(dest).map_err(|e| SnapshotError::Io(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| SnapshotError::Zip(e.to_string()))?;
        let Some(enclosed) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(enclosed);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| SnapshotError::Io(e.to_string()))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SnapshotError::Io(e.to_string()))?;
        }
        let mut out_file =
            File::create(&out_path).map_err(|e| SnapshotError::Io(e.to_string()))?;
        std::io::copy(&mut entry, &mut out_file).map_err(|e| SnapshotError::Io(e.to_string()))?;
    }

    Ok(dest.join(root_component(&root)))
}

fn root_component(name: &str) -> &str {
    name.split('/').next().unwrap_or(name)
}

fn detect_root(entries: &[(bool, String)]) -> Option<String> {
    for (is_dir, name) in entries {
        if *is_dir {
            return Some(root_component(name).to_string());
        }
        // A file entry with no directory component can't define a root by
        // itself; keep scanning for the first real directory entry.
        if !name.contains('/') {
            continue;
        }
        break;
    }

    // No directory entry preceded the first nested file: fall back to the
    // longest common top-level path segment across every entry.
    let mut components = entries.iter().map(|(_, name)| root_component(name));
    let first = components.next()?;
    if components.all(|c| c == first) && entries.iter().any(|(_, n)| n.contains('/')) {
        Some(first.to_string())
    } else {
        None
    }
}
