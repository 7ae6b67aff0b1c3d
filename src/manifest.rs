use std::fs;
use std::path::Path;

use camino::Utf8PathBuf;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::domain::{DatasetRecord, Label};
use crate::error::DatasetError;

pub const HEADER: [&str; 3] = ["image_path", "class_label", "mask_path"];

/// Shuffles `records` and writes them with a fixed header to `path`.
///
/// Nothing is written for an empty record list. The file appears under its
/// final name only once fully written. `shuffle_seed` makes the row order
/// reproducible; without it the order is random per run.
pub fn write(
    mut records: Vec<DatasetRecord>,
    path: &Path,
    shuffle_seed: Option<u64>,
) -> Result<usize, DatasetError> {
    if records.is_empty() {
        return Err(DatasetError::EmptyDataset);
    }

    let mut rng = match shuffle_seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    records.shuffle(&mut rng);

    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".fdb-manifest")
        .tempfile_in(parent)
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(temp.as_file());
    writer
        .write_record(HEADER)
        .map_err(|err| DatasetError::Manifest(err.to_string()))?;
    for record in &records {
        let mask = record
            .mask_path
            .as_ref()
            .map(|path| path.as_str())
            .unwrap_or("");
        writer
            .write_record([record.image_path.as_str(), record.label.as_str(), mask])
            .map_err(|err| DatasetError::Manifest(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| DatasetError::Manifest(err.to_string()))?;
    drop(writer);

    temp.persist(path)
        .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
    Ok(records.len())
}

/// Reads a manifest back. `clean` rows are read as [`Label::Orig`].
pub fn read(path: &Path) -> Result<Vec<DatasetRecord>, DatasetError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|err| DatasetError::Manifest(format!("{}: {err}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|err| DatasetError::Manifest(err.to_string()))?
        .clone();
    if headers.iter().collect::<Vec<_>>() != HEADER {
        return Err(DatasetError::Manifest(format!(
            "unexpected header: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| DatasetError::Manifest(err.to_string()))?;
        let label: Label = row.get(1).unwrap_or_default().parse()?;
        let mask = row.get(2).unwrap_or_default();
        records.push(DatasetRecord {
            image_path: Utf8PathBuf::from(row.get(0).unwrap_or_default()),
            label,
            mask_path: (!mask.is_empty()).then(|| Utf8PathBuf::from(mask)),
        });
    }
    Ok(records)
}
