use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use serde::Serialize;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::DatasetError;

/// Extracts every entry of `zip_path` below `target_dir` and returns the
/// number of files written.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<usize, DatasetError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        DatasetError::Extraction(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| DatasetError::Extraction(err.to_string()))?;

    let mut files = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| DatasetError::Extraction(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(DatasetError::Extraction(format!(
                    "zip entry path traversal detected: {}",
                    entry.name()
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| DatasetError::Extraction(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| DatasetError::Extraction(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| DatasetError::Extraction(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| DatasetError::Extraction(format!("{}: {err}", entry.name())))?;
        files += 1;
    }
    Ok(files)
}

/// Collapses redundant nesting: a directory whose only subdirectory is a
/// single folder resolves to that folder. Files next to it are ignored.
pub fn effective_root(dir: &Path) -> Result<PathBuf, DatasetError> {
    let mut subdirs = Vec::new();
    let entries = fs::read_dir(dir)
        .map_err(|err| DatasetError::Filesystem(format!("read {}: {err}", dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        if entry.path().is_dir() {
            subdirs.push(entry.path());
        }
    }
    if subdirs.len() == 1 {
        Ok(subdirs.remove(0))
    } else {
        Ok(dir.to_path_buf())
    }
}

/// Regular files in `dir`, sorted by path. Missing directories yield nothing.
pub fn list_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, DatasetError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name();
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Immediate subdirectories of `dir`, sorted by name.
pub fn list_subdirs(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Copies `source` next to `dest` through a temp file and persists it, so a
/// failed copy never leaves a truncated file under the final name.
/// Modification time is preserved when the platform allows it.
pub fn copy_file_atomic(source: &Path, dest: &Utf8Path) -> Result<(), DatasetError> {
    let parent = dest
        .parent()
        .ok_or_else(|| DatasetError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".fdb-file")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    fs::copy(source, temp.path()).map_err(|err| {
        DatasetError::Filesystem(format!("copy {}: {err}", source.display()))
    })?;
    if let Ok(modified) = fs::metadata(source).and_then(|meta| meta.modified()) {
        let _ = temp.as_file().set_modified(modified);
    }
    temp.persist(dest.as_std_path())
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let content = serde_json::to_vec_pretty(value)
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    fs::write(&tmp_path, &content).map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    fs::rename(&tmp_path, path).map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn atomic_rename_dir(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        fs::remove_dir_all(to)?;
    }
    fs::rename(from, to)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extract_counts_files() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("a.zip");
        write_zip(&zip_path, &[("top/a.txt", b"a"), ("top/sub/b.txt", b"b")]);
        let out = temp.path().join("out");
        let files = extract_zip(&zip_path, &out).unwrap();
        assert_eq!(files, 2);
        assert_eq!(fs::read(out.join("top/sub/b.txt")).unwrap(), b"b");
    }

    #[test]
    fn extract_rejects_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("broken.zip");
        fs::write(&zip_path, b"not a zip").unwrap();
        let err = extract_zip(&zip_path, &temp.path().join("out")).unwrap_err();
        assert_matches!(err, DatasetError::Extraction(_));
    }

    #[test]
    fn extract_rejects_entries_escaping_target() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("evil.zip");
        write_zip(&zip_path, &[("ok.txt", b"ok"), ("../escaped.txt", b"x")]);
        let out = temp.path().join("out");
        let err = extract_zip(&zip_path, &out).unwrap_err();
        assert_matches!(err, DatasetError::Extraction(ref message) if message.contains("traversal"));
        assert!(!temp.path().join("escaped.txt").exists());
    }

    #[test]
    fn effective_root_collapses_single_subdir() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("only/inner")).unwrap();
        fs::write(temp.path().join("readme.txt"), b"x").unwrap();
        assert_eq!(effective_root(temp.path()).unwrap(), temp.path().join("only"));

        fs::create_dir_all(temp.path().join("second")).unwrap();
        assert_eq!(effective_root(temp.path()).unwrap(), temp.path());
    }

    #[test]
    fn list_files_respects_depth() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("b.png"), b"b").unwrap();
        fs::write(temp.path().join("a.png"), b"a").unwrap();
        fs::write(temp.path().join("nested/c.png"), b"c").unwrap();

        let flat = list_files(temp.path(), false).unwrap();
        assert_eq!(flat, vec![temp.path().join("a.png"), temp.path().join("b.png")]);
        assert_eq!(list_files(temp.path(), true).unwrap().len(), 3);
        assert!(list_files(&temp.path().join("missing"), true).unwrap().is_empty());
    }
}
