use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// Class label written to the manifest.
///
/// `orig` is the canonical spelling for non-tampered images. Older builders
/// wrote `clean`; parsing accepts it as an alias so those manifests still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[serde(alias = "clean")]
    Orig,
    Tampered,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Orig => "orig",
            Label::Tampered => "tampered",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "orig" | "clean" => Ok(Label::Orig),
            "tampered" => Ok(Label::Tampered),
            _ => Err(DatasetError::InvalidLabel(value.to_string())),
        }
    }
}

/// Role a located file plays inside one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Original,
    Tampered,
    Mask,
}

impl Role {
    /// Label of the manifest row produced for a file with this role.
    pub fn label(&self) -> Option<Label> {
        match self {
            Role::Original => Some(Label::Orig),
            Role::Tampered => Some(Label::Tampered),
            Role::Mask => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Original => write!(f, "original"),
            Role::Tampered => write!(f, "tampered"),
            Role::Mask => write!(f, "mask"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    Columbia,
    #[serde(rename = "micc-f220")]
    MiccF220,
    Comofod,
    Casia,
    Imd2020,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::Columbia,
        SourceId::MiccF220,
        SourceId::Comofod,
        SourceId::Casia,
        SourceId::Imd2020,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Columbia => "columbia",
            SourceId::MiccF220 => "micc-f220",
            SourceId::Comofod => "comofod",
            SourceId::Casia => "casia",
            SourceId::Imd2020 => "imd2020",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "columbia" => Ok(SourceId::Columbia),
            "micc-f220" | "micc" => Ok(SourceId::MiccF220),
            "comofod" => Ok(SourceId::Comofod),
            "casia" | "casia2" => Ok(SourceId::Casia),
            "imd2020" => Ok(SourceId::Imd2020),
            _ => Err(DatasetError::UnknownSource(value.to_string())),
        }
    }
}

/// Identifier shared by an image and its counterparts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Stem(String);

impl Stem {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One manifest row. Paths are relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRecord {
    pub image_path: Utf8PathBuf,
    pub label: Label,
    pub mask_path: Option<Utf8PathBuf>,
}

impl DatasetRecord {
    pub fn orig(image_path: Utf8PathBuf) -> Self {
        Self {
            image_path,
            label: Label::Orig,
            mask_path: None,
        }
    }

    pub fn tampered(image_path: Utf8PathBuf, mask_path: Utf8PathBuf) -> Self {
        Self {
            image_path,
            label: Label::Tampered,
            mask_path: Some(mask_path),
        }
    }

    /// `mask_path` is present exactly when the record is tampered.
    pub fn is_consistent(&self) -> bool {
        match self.label {
            Label::Orig => self.mask_path.is_none(),
            Label::Tampered => self
                .mask_path
                .as_ref()
                .map(|path| !path.as_str().is_empty())
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn label_accepts_legacy_clean() {
        assert_eq!("clean".parse::<Label>().unwrap(), Label::Orig);
        assert_eq!("ORIG".parse::<Label>().unwrap(), Label::Orig);
        assert_eq!(Label::Orig.to_string(), "orig");
    }

    #[test]
    fn label_rejects_unknown() {
        let err = "forged".parse::<Label>().unwrap_err();
        assert_matches!(err, DatasetError::InvalidLabel(_));
    }

    #[test]
    fn parse_source_aliases() {
        assert_eq!("micc".parse::<SourceId>().unwrap(), SourceId::MiccF220);
        assert_eq!("MICC_F220".parse::<SourceId>().unwrap(), SourceId::MiccF220);
        assert_eq!("casia2".parse::<SourceId>().unwrap(), SourceId::Casia);
        let err = "coverage".parse::<SourceId>().unwrap_err();
        assert_matches!(err, DatasetError::UnknownSource(_));
    }

    #[test]
    fn record_serializes_paths_as_strings() {
        let record =
            DatasetRecord::tampered("images/tampered/a.png".into(), "images/mask/a.png".into());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["image_path"], "images/tampered/a.png");
        assert_eq!(json["label"], "tampered");
        assert_eq!(json["mask_path"], "images/mask/a.png");
        let orig = serde_json::to_value(DatasetRecord::orig("images/orig/a.png".into())).unwrap();
        assert!(orig["mask_path"].is_null());
    }

    #[test]
    fn record_consistency() {
        let orig = DatasetRecord::orig("images/orig/a.png".into());
        assert!(orig.is_consistent());
        let tampered =
            DatasetRecord::tampered("images/tampered/a.png".into(), "images/mask/a.png".into());
        assert!(tampered.is_consistent());
        let broken = DatasetRecord {
            image_path: "images/tampered/b.png".into(),
            label: Label::Tampered,
            mask_path: None,
        };
        assert!(!broken.is_consistent());
    }
}
