use std::path::Path;

use camino::Utf8Path;
use image::{GrayImage, ImageFormat, Luma};

use crate::error::DatasetError;

/// Luminance above this value is foreground.
pub const THRESHOLD: u8 = 127;

/// Maps every pixel to 0 or 255.
pub fn binarize_image(gray: &GrayImage) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let Luma([value]) = *gray.get_pixel(x, y);
        Luma([if value > THRESHOLD { 255 } else { 0 }])
    })
}

/// Decodes `source` as grayscale, thresholds it and writes an 8-bit PNG to
/// `dest` through a temp file.
pub fn binarize(source: &Path, dest: &Utf8Path) -> Result<(), DatasetError> {
    let decoded = image::open(source).map_err(|err| {
        DatasetError::MaskNormalization(format!("decode {}: {err}", source.display()))
    })?;
    let binary = binarize_image(&decoded.to_luma8());

    let parent = dest
        .parent()
        .ok_or_else(|| DatasetError::Filesystem("invalid mask destination".to_string()))?;
    std::fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".fdb-mask")
        .suffix(".png")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    binary
        .save_with_format(temp.path(), ImageFormat::Png)
        .map_err(|err| DatasetError::MaskNormalization(format!("encode {dest}: {err}")))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    fn gradient() -> GrayImage {
        GrayImage::from_fn(16, 4, |x, _| Luma([(x * 16) as u8]))
    }

    #[test]
    fn threshold_is_strict() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([[127u8, 128, 0][x as usize]]));
        let binary = binarize_image(&gray);
        assert_eq!(binary.as_raw(), &vec![0, 255, 0]);
    }

    #[test]
    fn output_is_strictly_binary() {
        let binary = binarize_image(&gradient());
        assert!(binary.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn binarizing_twice_is_byte_identical() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let source = root.join("gt.png");
        gradient().save(source.as_std_path()).unwrap();

        let first = root.join("first.png");
        let second = root.join("second.png");
        binarize(source.as_std_path(), &first).unwrap();
        binarize(first.as_std_path(), &second).unwrap();
        assert_eq!(
            std::fs::read(first.as_std_path()).unwrap(),
            std::fs::read(second.as_std_path()).unwrap()
        );
    }
}
