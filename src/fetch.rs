use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DatasetError;
use crate::fs_util;

pub trait ArchiveClient: Send + Sync {
    /// Streams `url` into `destination`. Fails on transport errors and on
    /// non-success status codes.
    fn download(&self, url: &str, destination: &Path) -> Result<(), DatasetError>;
}

#[derive(Clone)]
pub struct HttpArchiveClient {
    client: Client,
}

impl HttpArchiveClient {
    pub fn new() -> Result<Self, DatasetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("fdb/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DatasetError::Download(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| DatasetError::Download(err.to_string()))?;
        Ok(Self { client })
    }

    fn send_with_retries(&self, url: &str) -> Result<reqwest::blocking::Response, DatasetError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        debug!(url, status, attempt, "retrying download");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        debug!(url, attempt, error = %err, "retrying download");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(DatasetError::Download(format!("{url}: {err}")));
                }
            }
        }
    }
}

impl ArchiveClient for HttpArchiveClient {
    fn download(&self, url: &str, destination: &Path) -> Result<(), DatasetError> {
        let mut response = self.send_with_retries(url)?;
        let status = response.status().as_u16();
        if !is_success_status(status) {
            return Err(status_error(url, status, response.text().ok()));
        }
        let mut file =
            File::create(destination).map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| DatasetError::Download(format!("{url}: {err}")))?;
        Ok(())
    }
}

fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

fn status_error(url: &str, status: u16, body: Option<String>) -> DatasetError {
    let message = body
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| format!("GET {url} failed"));
    DatasetError::DownloadStatus { status, message }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Written next to an extraction directory once it is complete. A directory
/// without its marker is a leftover of a failed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMarker {
    pub origin: String,
    pub archive: Option<String>,
    pub entries: usize,
    pub completed_at: String,
    pub tool: String,
}

impl CacheMarker {
    pub fn new(origin: &str, archive: Option<String>, entries: usize) -> Self {
        Self {
            origin: origin.to_string(),
            archive,
            entries,
            completed_at: chrono::Utc::now().to_rfc3339(),
            tool: format!("fdb/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub fn marker_path(cache_dir: &Path, name: &str) -> PathBuf {
    cache_dir.join(format!(".{name}.complete.json"))
}

/// True only when `dir` exists and its completion marker parses.
pub fn is_complete(cache_dir: &Path, name: &str) -> bool {
    let dir = cache_dir.join(name);
    if !dir.is_dir() {
        return false;
    }
    fs::read_to_string(marker_path(cache_dir, name))
        .ok()
        .and_then(|content| serde_json::from_str::<CacheMarker>(&content).ok())
        .is_some()
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    /// Effective source root after collapsing a single top-level folder.
    pub root: PathBuf,
    pub archive_cached: bool,
    pub extraction_cached: bool,
}

pub struct ArchiveFetcher<'a, A: ArchiveClient> {
    client: &'a A,
    cache_dir: PathBuf,
}

impl<'a, A: ArchiveClient> ArchiveFetcher<'a, A> {
    pub fn new(client: &'a A, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn fetch(&self, url: &str) -> Result<FetchOutcome, DatasetError> {
        fs::create_dir_all(&self.cache_dir)
            .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        let archive_name = archive_name(url)?;
        let zip_path = self.cache_dir.join(&archive_name);

        let archive_cached = zip_path.is_file();
        if archive_cached {
            debug!(archive = %archive_name, "archive already cached");
        } else {
            info!(url, "downloading archive");
            self.download_atomic(url, &zip_path)?;
        }

        let stem = Path::new(&archive_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(archive_name.as_str())
            .to_string();
        let extract_dir = self.cache_dir.join(&stem);

        let extraction_cached = is_complete(&self.cache_dir, &stem);
        if !extraction_cached {
            if extract_dir.exists() {
                warn!(dir = %extract_dir.display(), "discarding incomplete extraction");
            }
            info!(archive = %archive_name, "extracting archive");
            let entries = self.extract_atomic(&zip_path, &extract_dir)?;
            fs_util::write_json_atomic(
                &marker_path(&self.cache_dir, &stem),
                &CacheMarker::new(url, Some(archive_name.clone()), entries),
            )?;
        }

        Ok(FetchOutcome {
            root: fs_util::effective_root(&extract_dir)?,
            archive_cached,
            extraction_cached,
        })
    }

    fn download_atomic(&self, url: &str, zip_path: &Path) -> Result<(), DatasetError> {
        let temp = tempfile::Builder::new()
            .prefix(".fdb-download")
            .tempfile_in(&self.cache_dir)
            .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        // The temp file is removed on drop if the client fails.
        self.client.download(url, temp.path())?;
        temp.persist(zip_path)
            .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn extract_atomic(&self, zip_path: &Path, extract_dir: &Path) -> Result<usize, DatasetError> {
        let temp_dir = tempfile::Builder::new()
            .prefix(".fdb-extract")
            .tempdir_in(&self.cache_dir)
            .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        let entries = fs_util::extract_zip(zip_path, temp_dir.path())?;
        let staged = temp_dir.keep();
        fs_util::atomic_rename_dir(&staged, extract_dir).map_err(|err| {
            let _ = fs::remove_dir_all(&staged);
            DatasetError::Extraction(format!("move into {}: {err}", extract_dir.display()))
        })?;
        Ok(entries)
    }
}

/// Last path segment of `url`, without query string or fragment.
pub fn archive_name(url: &str) -> Result<String, DatasetError> {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    trimmed
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .ok_or_else(|| DatasetError::Download(format!("cannot derive archive name from {url}")))
}
