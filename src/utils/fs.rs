// src/utils/fs.rs
//! File-system helpers shared by the write and read paths

use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Write data atomically using a sibling temp file + rename
///
/// A crash mid-write leaves at most a `.tmp` file behind, never a partially
/// written file under the final name.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = fs::write(&temp_path, data) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Sorted names of the files in `dir` accepted by `filter`
///
/// A missing directory yields an empty list.
pub fn sorted_file_names<F>(dir: &Path, filter: F) -> io::Result<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if filter(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Count `.json` files in a directory (0 when it is missing)
pub fn count_json_files(dir: &Path) -> usize {
    sorted_file_names(dir, |name| name.ends_with(".json"))
        .map(|names| names.len())
        .unwrap_or(0)
}

/// Read and parse a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, crate::utils::errors::LoadError> {
    use crate::utils::errors::LoadError;

    let bytes = fs::read(path).map_err(|e| LoadError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| LoadError::decode(path, e))
}
