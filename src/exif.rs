//! Metadata-only forgeries: JPEG copies whose pixels are untouched but whose
//! EXIF block claims a fabricated camera, capture time and location.

use std::fs;
use std::path::Path;

use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::DatasetError;
use crate::fs_util;

pub const DEFAULT_INPUT_DIR: &str = "dataset/exif/original";
pub const DEFAULT_OUTPUT_DIR: &str = "dataset/exif/exif_edited";

pub const MAKE: &str = "FakeBrand";
pub const MODEL: &str = "ForgeryCam 3000";
pub const DATE_TIME_ORIGINAL: &str = "2020:01:01 12:00:00";
/// Degrees, minutes, seconds.
const LATITUDE: [u32; 3] = [41, 53, 0];
const LONGITUDE: [u32; 3] = [12, 29, 0];

#[derive(Debug, Clone, Serialize)]
pub struct ExifFailure {
    pub file: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExifResult {
    pub output_dir: String,
    pub written: Vec<String>,
    pub failed: Vec<ExifFailure>,
}

fn dms(values: [u32; 3]) -> Vec<uR64> {
    values
        .iter()
        .map(|&value| uR64 {
            nominator: value,
            denominator: 1,
        })
        .collect()
}

pub fn forged_metadata() -> Metadata {
    let mut metadata = Metadata::new();
    metadata.set_tag(ExifTag::Make(MAKE.to_string()));
    metadata.set_tag(ExifTag::Model(MODEL.to_string()));
    metadata.set_tag(ExifTag::DateTimeOriginal(DATE_TIME_ORIGINAL.to_string()));
    metadata.set_tag(ExifTag::GPSLatitudeRef("N".to_string()));
    metadata.set_tag(ExifTag::GPSLatitude(dms(LATITUDE)));
    metadata.set_tag(ExifTag::GPSLongitudeRef("E".to_string()));
    metadata.set_tag(ExifTag::GPSLongitude(dms(LONGITUDE)));
    metadata
}

fn is_jpeg(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}

/// Writes a forged copy of every JPEG directly inside `input` to `output`,
/// keeping file names. A file that fails is reported and the rest go on.
pub fn inject_dir(input: &Path, output: &Path) -> Result<ExifResult, DatasetError> {
    if !input.is_dir() {
        return Err(DatasetError::InvalidConfig(format!(
            "{} is not a directory",
            input.display()
        )));
    }
    fs::create_dir_all(output).map_err(|err| DatasetError::Filesystem(err.to_string()))?;

    let mut result = ExifResult {
        output_dir: output.display().to_string(),
        ..ExifResult::default()
    };
    for file in fs_util::list_files(input, false)? {
        let Some(name) = file.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_jpeg(name) {
            continue;
        }
        match inject_file(&file, &output.join(name)) {
            Ok(()) => result.written.push(name.to_string()),
            Err(err) => {
                warn!(file = name, error = %err, "EXIF injection failed");
                result.failed.push(ExifFailure {
                    file: name.to_string(),
                    message: err.to_string(),
                });
            }
        }
    }
    info!(
        written = result.written.len(),
        failed = result.failed.len(),
        "EXIF injection finished"
    );
    Ok(result)
}

/// Copies `source` to `dest` with the forged EXIF block, through a temp file.
pub fn inject_file(source: &Path, dest: &Path) -> Result<(), DatasetError> {
    let parent = dest
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp = tempfile::Builder::new()
        .prefix(".fdb-exif")
        .suffix(".jpg")
        .tempfile_in(parent)
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    fs::copy(source, temp.path())
        .map_err(|err| DatasetError::Filesystem(format!("copy {}: {err}", source.display())))?;
    forged_metadata()
        .write_to_file(temp.path())
        .map_err(|err| DatasetError::Exif(format!("{}: {err}", source.display())))?;
    temp.persist(dest)
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, ImageFormat, Luma};

    use super::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle)
    }

    #[test]
    fn jpeg_copies_carry_forged_tags() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("original");
        fs::create_dir_all(&input).unwrap();
        GrayImage::from_pixel(16, 16, Luma([128u8]))
            .save_with_format(input.join("a.jpg"), ImageFormat::Jpeg)
            .unwrap();
        fs::write(input.join("notes.txt"), b"skip me").unwrap();

        let output = temp.path().join("edited");
        let result = inject_dir(&input, &output).unwrap();

        assert_eq!(result.written, vec!["a.jpg".to_string()]);
        assert!(result.failed.is_empty());
        assert!(!output.join("notes.txt").exists());
        let bytes = fs::read(output.join("a.jpg")).unwrap();
        assert!(contains(&bytes, MODEL.as_bytes()));
        assert!(contains(&bytes, MAKE.as_bytes()));
        let decoded = image::open(output.join("a.jpg")).unwrap();
        assert_eq!(decoded.width(), 16);
    }

    #[test]
    fn extension_match_ignores_case() {
        assert!(is_jpeg("IMG_01.JPG"));
        assert!(is_jpeg("b.jpeg"));
        assert!(!is_jpeg("c.png"));
    }

    #[test]
    fn missing_input_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let err = inject_dir(&temp.path().join("absent"), &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidConfig(_)));
    }
}
