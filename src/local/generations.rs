/// File layout for one category's buffer
///
/// - `<dir>/<category>.log`: active buffer, appended to
/// - `<dir>/<category>.log.<n>`: rotated generation, `1` is the newest
/// - `<dir>/<category>.log.tmp`: scratch file used by reset
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::entry::Category;

use super::error::Result;

pub fn active_path(dir: &Path, category: Category) -> PathBuf {
    dir.join(format!("{}.log", category.file_stem()))
}

pub fn generation_path(dir: &Path, category: Category, generation: u32) -> PathBuf {
    dir.join(format!("{}.log.{}", category.file_stem(), generation))
}

pub fn scratch_path(dir: &Path, category: Category) -> PathBuf {
    dir.join(format!("{}.log.tmp", category.file_stem()))
}

/// Parse `<category>.log.<n>` into `n`
pub fn parse_generation(file_name: &str, category: Category) -> Option<u32> {
    let prefix = format!("{}.log.", category.file_stem());
    file_name.strip_prefix(&prefix)?.parse().ok()
}

/// Rotated generations of a category, newest (lowest number) first
pub fn list_generations(dir: &Path, category: Category) -> Result<Vec<(u32, PathBuf)>> {
    let mut generations = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(generations),
        Err(err) => return Err(err.into()),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(generation) = name.to_str().and_then(|n| parse_generation(n, category)) {
            generations.push((generation, entry.path()));
        }
    }

    generations.sort_by_key(|(generation, _)| *generation);
    Ok(generations)
}

/// Size of a file, zero when it does not exist
pub fn file_len(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
        Err(err) => Err(err.into()),
    }
}

/// File contents, empty when it does not exist
pub fn read_or_empty(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err.into()),
    }
}
