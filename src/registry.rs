//! Static registry of supported forgery datasets.
//!
//! Every dataset quirk (directory nesting, file naming, where masks live)
//! is expressed as descriptor data so the collector stays source-agnostic.

use crate::domain::{Role, SourceId};

pub const COLUMBIA_URL: &str =
    "https://www.ee.columbia.edu/ln/dvmm/downloads/columbia_USplicingDataSet.zip";
pub const MICC_F220_URL: &str =
    "https://imagelab.ing.unimore.it/imagelab/research/imagelab-datasets/MICC-F220.zip";
pub const IMD2020_URL: &str = "https://staff.utia.cas.cz/novozada/db/IMD2020.zip";
pub const COMOFOD_KAGGLE: &str = "tusharchauhan1898/comofod";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Archive { url: &'static str },
    Kaggle { dataset: &'static str },
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskFormat {
    /// Copy the mask file as-is.
    Verbatim,
    /// Decode, threshold at 127 and re-encode as 0/255 PNG.
    BinaryPng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Key files live directly in `path` (or below it when `recursive`).
    Dir { path: &'static str, recursive: bool },
    /// Every immediate subdirectory of `path` holds one or more items.
    Subdirs { path: &'static str },
}

/// How a counterpart file is found from the key file. Patterns are regex
/// templates matched against file names; `{stem}` is replaced by the escaped
/// stem of the key file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locate {
    /// Same directory as the key file.
    Sibling(&'static str),
    /// `dir` under the source root, mirroring the key file's path relative
    /// to its scope.
    Mirror {
        dir: &'static str,
        pattern: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counterpart {
    pub role: Role,
    pub locate: Locate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRule {
    pub scope: Scope,
    /// Regex over file names with a named `stem` capture.
    pub key: &'static str,
    /// File names matching this regex are never treated as keys.
    pub exclude: Option<&'static str>,
    pub key_role: Role,
    pub counterparts: &'static [Counterpart],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub id: SourceId,
    pub name: &'static str,
    pub origin: Origin,
    pub mask_format: MaskFormat,
    pub rules: &'static [ItemRule],
}

/// `{stem}mask.*` or `{stem}<delimiter>...mask....*`, any case. The stem
/// must end at a delimiter so that `img1` never claims `img10_mask.jpg`.
const SIBLING_MASK: Counterpart = Counterpart {
    role: Role::Mask,
    locate: Locate::Sibling(r"^{stem}(?i:(?:[_\-. ][^.]*)?mask[^.]*)\.\w+$"),
};

static COLUMBIA: SourceDescriptor = SourceDescriptor {
    id: SourceId::Columbia,
    name: "Columbia Uncompressed Image Splicing",
    origin: Origin::Archive { url: COLUMBIA_URL },
    mask_format: MaskFormat::BinaryPng,
    rules: &[
        ItemRule {
            scope: Scope::Dir {
                path: "final_dataset/images",
                recursive: false,
            },
            key: r"(?i)^(?P<stem>.+)\.tiff?$",
            exclude: Some(r"(?i)mask"),
            key_role: Role::Tampered,
            counterparts: &[SIBLING_MASK],
        },
        ItemRule {
            scope: Scope::Dir {
                path: "final_dataset/genuine",
                recursive: false,
            },
            key: r"(?i)^(?P<stem>.+)\.tiff?$",
            exclude: Some(r"(?i)mask"),
            key_role: Role::Original,
            counterparts: &[],
        },
    ],
};

static MICC_F220: SourceDescriptor = SourceDescriptor {
    id: SourceId::MiccF220,
    name: "MICC-F220",
    origin: Origin::Archive { url: MICC_F220_URL },
    mask_format: MaskFormat::Verbatim,
    rules: &[
        ItemRule {
            scope: Scope::Dir {
                path: "f220/tampered",
                recursive: false,
            },
            key: r"(?i)^(?P<stem>[^.]+?)\.jpe?g$",
            exclude: Some(r"(?i)mask"),
            key_role: Role::Tampered,
            counterparts: &[SIBLING_MASK],
        },
        ItemRule {
            scope: Scope::Dir {
                path: "f220/original",
                recursive: false,
            },
            key: r"(?i)^(?P<stem>[^.]+?)\.jpe?g$",
            exclude: Some(r"(?i)mask"),
            key_role: Role::Original,
            counterparts: &[],
        },
    ],
};

static COMOFOD: SourceDescriptor = SourceDescriptor {
    id: SourceId::Comofod,
    name: "CoMoFoD",
    origin: Origin::Kaggle {
        dataset: COMOFOD_KAGGLE,
    },
    mask_format: MaskFormat::Verbatim,
    rules: &[ItemRule {
        scope: Scope::Dir {
            path: "",
            recursive: false,
        },
        key: r"^(?P<stem>[^_]+)_O\.\w+$",
        exclude: None,
        key_role: Role::Original,
        counterparts: &[
            Counterpart {
                role: Role::Tampered,
                locate: Locate::Sibling(r"^{stem}_F\.\w+$"),
            },
            Counterpart {
                role: Role::Mask,
                locate: Locate::Sibling(r"^{stem}_B\.\w+$"),
            },
        ],
    }],
};

static CASIA: SourceDescriptor = SourceDescriptor {
    id: SourceId::Casia,
    name: "CASIA v2.0",
    origin: Origin::Local,
    mask_format: MaskFormat::BinaryPng,
    rules: &[
        ItemRule {
            scope: Scope::Dir {
                path: "Tp",
                recursive: true,
            },
            key: r"(?i)^(?P<stem>Tp_[^.]+)\.(jpe?g|tiff?|bmp|png)$",
            exclude: None,
            key_role: Role::Tampered,
            counterparts: &[Counterpart {
                role: Role::Mask,
                locate: Locate::Mirror {
                    dir: "CASIA 2 Groundtruth",
                    pattern: r"^{stem}_gt\.png$",
                },
            }],
        },
        ItemRule {
            scope: Scope::Dir {
                path: "Au",
                recursive: true,
            },
            key: r"(?i)^(?P<stem>Au_[^.]+)\.(jpe?g|tiff?|bmp|png)$",
            exclude: None,
            key_role: Role::Original,
            counterparts: &[],
        },
    ],
};

static IMD2020: SourceDescriptor = SourceDescriptor {
    id: SourceId::Imd2020,
    name: "IMD2020",
    origin: Origin::Archive { url: IMD2020_URL },
    mask_format: MaskFormat::BinaryPng,
    rules: &[ItemRule {
        scope: Scope::Subdirs { path: "" },
        key: r"(?i)^(?P<stem>[^_.]+_\d+)\.(jpe?g|png)$",
        exclude: None,
        key_role: Role::Tampered,
        counterparts: &[
            Counterpart {
                role: Role::Mask,
                locate: Locate::Sibling(r"^{stem}_mask\.\w+$"),
            },
            Counterpart {
                role: Role::Original,
                locate: Locate::Sibling(r"^.+_orig\.\w+$"),
            },
        ],
    }],
};

static REGISTRY: [&SourceDescriptor; 5] = [&COLUMBIA, &MICC_F220, &COMOFOD, &CASIA, &IMD2020];

pub fn all() -> &'static [&'static SourceDescriptor] {
    &REGISTRY
}

pub fn descriptor(id: SourceId) -> &'static SourceDescriptor {
    match id {
        SourceId::Columbia => &COLUMBIA,
        SourceId::MiccF220 => &MICC_F220,
        SourceId::Comofod => &COMOFOD,
        SourceId::Casia => &CASIA,
        SourceId::Imd2020 => &IMD2020,
    }
}
