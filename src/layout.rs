use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::Label;
use crate::error::DatasetError;

pub const IMAGES_DIR: &str = "images";
pub const MASK_DIR: &str = "mask";
pub const MANIFEST_FILE: &str = "manifest.csv";

/// The unified output tree:
///
/// ```text
/// <root>/images/orig/*
/// <root>/images/tampered/*
/// <root>/images/mask/*
/// <root>/manifest.csv
/// ```
///
/// Paths handed to the manifest are relative to `root` and always use `/`.
#[derive(Debug, Clone)]
pub struct OutputTree {
    root: Utf8PathBuf,
}

impl OutputTree {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn label_dir(&self, label: Label) -> Utf8PathBuf {
        self.root.join(IMAGES_DIR).join(label.as_str())
    }

    pub fn mask_dir(&self) -> Utf8PathBuf {
        self.root.join(IMAGES_DIR).join(MASK_DIR)
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn image_record_path(&self, label: Label, file_name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{IMAGES_DIR}/{}/{file_name}", label.as_str()))
    }

    pub fn mask_record_path(&self, file_name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{IMAGES_DIR}/{MASK_DIR}/{file_name}"))
    }

    /// Absolute location of a manifest-relative path.
    pub fn resolve(&self, record_path: &Utf8Path) -> Utf8PathBuf {
        self.root.join(record_path)
    }

    pub fn ensure(&self) -> Result<(), DatasetError> {
        for dir in [
            self.label_dir(Label::Orig),
            self.label_dir(Label::Tampered),
            self.mask_dir(),
        ] {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| DatasetError::Filesystem(format!("create {dir}: {err}")))?;
        }
        Ok(())
    }
}
