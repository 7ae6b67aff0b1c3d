use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::SourceId;
use crate::error::DatasetError;
use crate::registry::{self, Origin};

pub const DEFAULT_CACHE_DIR: &str = "./_cache";

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub output_root: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
    #[serde(default)]
    pub fail_fast: Option<bool>,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SourceEntry {
    Shorthand(String),
    Detailed(SourceEntryObject),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceEntryObject {
    pub id: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sample: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub id: SourceId,
    /// Pre-extracted source root; skips download when set.
    pub local_path: Option<PathBuf>,
    pub sample: usize,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub output_root: Utf8PathBuf,
    pub cache_dir: PathBuf,
    pub seed: Option<u64>,
    pub shuffle_seed: Option<u64>,
    pub fail_fast: bool,
    /// In registry order.
    pub sources: Vec<SourceRequest>,
}

impl Config {
    /// Overlays `other` on top of `self`: scalar values set in `other` win,
    /// source lists are concatenated so later entries override earlier ones.
    pub fn merge(mut self, other: Config) -> Config {
        self.schema_version = other.schema_version.or(self.schema_version);
        self.output_root = other.output_root.or(self.output_root);
        self.cache_dir = other.cache_dir.or(self.cache_dir);
        self.seed = other.seed.or(self.seed);
        self.shuffle_seed = other.shuffle_seed.or(self.shuffle_seed);
        self.fail_fast = other.fail_fast.or(self.fail_fast);
        self.sources.extend(other.sources);
        self
    }
}

impl ResolvedConfig {
    /// Sets the sample size of a source enabled by an earlier layer.
    pub fn override_sample(&mut self, id: SourceId, sample: usize) -> Result<(), DatasetError> {
        let request = self
            .sources
            .iter_mut()
            .find(|request| request.id == id)
            .ok_or_else(|| {
                DatasetError::InvalidConfig(format!(
                    "sample size given for {id}, which is not enabled"
                ))
            })?;
        request.sample = sample;
        Ok(())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &str) -> Result<Config, DatasetError> {
        let config_path = PathBuf::from(path);
        let content = fs::read_to_string(&config_path)
            .map_err(|_| DatasetError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| DatasetError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DatasetError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(DatasetError::InvalidConfig(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let output_root = config
            .output_root
            .filter(|root| !root.trim().is_empty())
            .map(Utf8PathBuf::from)
            .ok_or_else(|| DatasetError::InvalidConfig("output_root is required".to_string()))?;
        let cache_dir = PathBuf::from(
            config
                .cache_dir
                .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
        );

        let mut merged = BTreeMap::<SourceId, SourceRequest>::new();
        for entry in config.sources {
            let object = match entry {
                SourceEntry::Shorthand(id) => SourceEntryObject {
                    id,
                    ..SourceEntryObject::default()
                },
                SourceEntry::Detailed(obj) => obj,
            };
            let id: SourceId = object.id.parse()?;
            let request = merged.entry(id).or_insert(SourceRequest {
                id,
                local_path: None,
                sample: 0,
            });
            if let Some(path) = object.path {
                request.local_path = Some(PathBuf::from(path));
            }
            if let Some(sample) = object.sample {
                request.sample = sample;
            }
        }

        for request in merged.values() {
            let descriptor = registry::descriptor(request.id);
            if descriptor.origin == Origin::Local && request.local_path.is_none() {
                return Err(DatasetError::InvalidConfig(format!(
                    "{} is not downloadable; provide a local path",
                    request.id
                )));
            }
        }

        Ok(ResolvedConfig {
            schema_version,
            output_root,
            cache_dir,
            seed: config.seed,
            shuffle_seed: config.shuffle_seed,
            fail_fast: config.fail_fast.unwrap_or(false),
            sources: merged.into_values().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_config_shorthand() {
        let config: Config = serde_json::from_str(
            r#"{
                "output_root": "./data",
                "sources": ["imd2020", {"id": "casia", "path": "/d/CASIA2", "sample": 10}]
            }"#,
        )
        .unwrap();

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));
        assert_eq!(resolved.sources.len(), 2);
        // registry order, not listing order
        assert_eq!(resolved.sources[0].id, SourceId::Casia);
        assert_eq!(resolved.sources[0].sample, 10);
        assert_eq!(resolved.sources[1].id, SourceId::Imd2020);
    }

    #[test]
    fn local_source_requires_path() {
        let config = Config {
            output_root: Some("out".to_string()),
            sources: vec![SourceEntry::Shorthand("casia".to_string())],
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, DatasetError::InvalidConfig(_));
    }

    #[test]
    fn later_layer_wins() {
        let file = Config {
            output_root: Some("from-file".to_string()),
            seed: Some(1),
            sources: vec![SourceEntry::Detailed(SourceEntryObject {
                id: "comofod".to_string(),
                path: None,
                sample: Some(5),
            })],
            ..Config::default()
        };
        let flags = Config {
            seed: Some(42),
            sources: vec![SourceEntry::Detailed(SourceEntryObject {
                id: "comofod".to_string(),
                path: None,
                sample: Some(50),
            })],
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(file.merge(flags)).unwrap();
        assert_eq!(resolved.output_root, Utf8PathBuf::from("from-file"));
        assert_eq!(resolved.seed, Some(42));
        assert_eq!(resolved.sources.len(), 1);
        assert_eq!(resolved.sources[0].sample, 50);
    }

    #[test]
    fn sample_override_requires_enabled_source() {
        let config = Config {
            output_root: Some("out".to_string()),
            sources: vec![SourceEntry::Shorthand("columbia".to_string())],
            ..Config::default()
        };
        let mut resolved = ConfigLoader::resolve_config(config).unwrap();
        resolved.override_sample(SourceId::Columbia, 25).unwrap();
        assert_eq!(resolved.sources[0].sample, 25);

        let err = resolved.override_sample(SourceId::Imd2020, 5).unwrap_err();
        assert_matches!(err, DatasetError::InvalidConfig(_));
    }

    #[test]
    fn unknown_source_is_rejected() {
        let config = Config {
            output_root: Some("out".to_string()),
            sources: vec![SourceEntry::Shorthand("coverage".to_string())],
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, DatasetError::UnknownSource(_));
    }
}
