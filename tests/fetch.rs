use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use zip::write::SimpleFileOptions;

use forgery_dataset_builder::error::DatasetError;
use forgery_dataset_builder::fetch::{self, ArchiveClient, ArchiveFetcher};

const URL: &str = "https://example.org/db/IMD2020.zip";

#[derive(Default)]
struct ZipServer {
    calls: Mutex<usize>,
}

impl ArchiveClient for ZipServer {
    fn download(&self, _url: &str, destination: &Path) -> Result<(), DatasetError> {
        *self.calls.lock().unwrap() += 1;
        let file = File::create(destination).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        zip.start_file("IMD2020/1a1ogs/1a1ogs_orig.jpg", options)
            .unwrap();
        zip.write_all(b"jpeg").unwrap();
        zip.start_file("IMD2020/1a1ogs/c8tf5mq_0.png", options)
            .unwrap();
        zip.write_all(b"png").unwrap();
        zip.finish().unwrap();
        Ok(())
    }
}

struct NotFoundServer;

impl ArchiveClient for NotFoundServer {
    fn download(&self, _url: &str, destination: &Path) -> Result<(), DatasetError> {
        fs::write(destination, b"partial").unwrap();
        Err(DatasetError::DownloadStatus {
            status: 404,
            message: "not found".to_string(),
        })
    }
}

#[test]
fn second_fetch_uses_cache() {
    let temp = tempfile::tempdir().unwrap();
    let server = ZipServer::default();
    let fetcher = ArchiveFetcher::new(&server, temp.path());

    let first = fetcher.fetch(URL).unwrap();
    assert!(!first.archive_cached);
    assert!(!first.extraction_cached);
    assert!(first.root.ends_with("IMD2020/IMD2020"));
    assert!(first.root.join("1a1ogs/1a1ogs_orig.jpg").is_file());

    let second = fetcher.fetch(URL).unwrap();
    assert!(second.archive_cached);
    assert!(second.extraction_cached);
    assert_eq!(second.root, first.root);
    assert_eq!(*server.calls.lock().unwrap(), 1);
}

#[test]
fn interrupted_extraction_is_redone() {
    let temp = tempfile::tempdir().unwrap();
    let server = ZipServer::default();
    let fetcher = ArchiveFetcher::new(&server, temp.path());
    fetcher.fetch(URL).unwrap();

    fs::remove_file(fetch::marker_path(temp.path(), "IMD2020")).unwrap();
    fs::remove_file(temp.path().join("IMD2020/IMD2020/1a1ogs/c8tf5mq_0.png")).unwrap();

    let again = fetcher.fetch(URL).unwrap();
    assert!(again.archive_cached);
    assert!(!again.extraction_cached);
    assert!(again.root.join("1a1ogs/c8tf5mq_0.png").is_file());
    assert_eq!(*server.calls.lock().unwrap(), 1);
}

#[test]
fn failed_download_leaves_no_archive() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = ArchiveFetcher::new(&NotFoundServer, temp.path());

    let err = fetcher.fetch(URL).unwrap_err();
    assert_matches!(err, DatasetError::DownloadStatus { status: 404, .. });
    assert!(!temp.path().join("IMD2020.zip").exists());
    assert!(!fetch::is_complete(temp.path(), "IMD2020"));
    let leftovers = fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn corrupt_archive_reports_extraction_error() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("IMD2020.zip"), b"not a zip").unwrap();
    let server = ZipServer::default();
    let fetcher = ArchiveFetcher::new(&server, temp.path());

    let err = fetcher.fetch(URL).unwrap_err();
    assert_matches!(err, DatasetError::Extraction(_));
    assert_eq!(*server.calls.lock().unwrap(), 0);
    assert!(!temp.path().join("IMD2020").exists());
}
