use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::error::DatasetError;
use crate::fetch::{self, CacheMarker};
use crate::fs_util;

pub trait KaggleClient: Send + Sync {
    /// Downloads and unzips `dataset` (an `owner/name` slug) into `destination`.
    fn download_dataset(&self, dataset: &str, destination: &Path) -> Result<(), DatasetError>;
}

/// Shells out to the `kaggle` CLI, which reads credentials from
/// `~/.kaggle/kaggle.json` or `KAGGLE_USERNAME`/`KAGGLE_KEY`.
#[derive(Clone)]
pub struct SystemKaggleClient {
    kaggle: Option<PathBuf>,
}

impl SystemKaggleClient {
    pub fn new() -> Self {
        Self {
            kaggle: find_in_path("kaggle"),
        }
    }
}

impl Default for SystemKaggleClient {
    fn default() -> Self {
        Self::new()
    }
}

impl KaggleClient for SystemKaggleClient {
    fn download_dataset(&self, dataset: &str, destination: &Path) -> Result<(), DatasetError> {
        let kaggle = self
            .kaggle
            .as_ref()
            .ok_or_else(|| DatasetError::MissingTool("kaggle".to_string()))?;
        let output = Command::new(kaggle)
            .args(["datasets", "download", "-d", dataset, "-p"])
            .arg(destination)
            .arg("--unzip")
            .output()
            .map_err(|err| DatasetError::KaggleDownload(err.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {} datasets download -d {dataset}", kaggle.display())
        } else {
            stderr
        };
        Err(DatasetError::KaggleDownload(message))
    }
}

/// Materializes a Kaggle dataset under `<cache_dir>/<name>`, downloading it
/// only when no completed copy exists. Returns the effective root.
pub fn fetch_cached<K: KaggleClient + ?Sized>(
    client: &K,
    dataset: &str,
    cache_dir: &Path,
    name: &str,
) -> Result<(PathBuf, bool), DatasetError> {
    let target = cache_dir.join(name);
    if fetch::is_complete(cache_dir, name) {
        info!(dataset, "using cached kaggle dataset");
        return Ok((fs_util::effective_root(&target)?, true));
    }

    fs::create_dir_all(cache_dir).map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    let temp_dir = tempfile::Builder::new()
        .prefix(".fdb-kaggle")
        .tempdir_in(cache_dir)
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    info!(dataset, "downloading kaggle dataset");
    client.download_dataset(dataset, temp_dir.path())?;

    let staged = temp_dir.keep();
    fs_util::atomic_rename_dir(&staged, &target).map_err(|err| {
        let _ = fs::remove_dir_all(&staged);
        DatasetError::Filesystem(format!("move into {}: {err}", target.display()))
    })?;
    let entries = fs_util::list_files(&target, true)?.len();
    fs_util::write_json_atomic(
        &fetch::marker_path(cache_dir, name),
        &CacheMarker::new(&format!("kaggle:{dataset}"), None, entries),
    )?;
    Ok((fs_util::effective_root(&target)?, false))
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
