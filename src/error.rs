use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DatasetError {
    #[error("unknown dataset source: {0}")]
    UnknownSource(String),

    #[error("invalid label: {0}")]
    InvalidLabel(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("download returned status {status}: {message}")]
    DownloadStatus { status: u16, message: String },

    #[error("archive extraction failed: {0}")]
    Extraction(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("kaggle download failed: {0}")]
    KaggleDownload(String),

    #[error("{source_id}: requested {requested} items but only {available} are available")]
    InsufficientData {
        source_id: String,
        requested: usize,
        available: usize,
    },

    #[error("no records collected from any enabled source")]
    #[diagnostic(help("enable at least one source, e.g. --download-columbia or --casia-path <dir>"))]
    EmptyDataset,

    #[error("mask normalization failed: {0}")]
    MaskNormalization(String),

    #[error("EXIF injection failed: {0}")]
    Exif(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
