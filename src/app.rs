use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::collect::{Collector, MissingCounterpart, Sampling};
use crate::config::{ResolvedConfig, SourceRequest};
use crate::domain::{DatasetRecord, SourceId};
use crate::error::DatasetError;
use crate::fetch::{ArchiveClient, ArchiveFetcher};
use crate::kaggle::{self, KaggleClient};
use crate::layout::OutputTree;
use crate::manifest;
use crate::registry::{self, Origin};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Collected,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: SourceId,
    pub status: SourceStatus,
    /// "cache", "download" or "local".
    pub origin: Option<String>,
    pub root: Option<String>,
    pub available: usize,
    pub selected: usize,
    pub records: usize,
    pub skipped: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub manifest_path: String,
    pub rows: usize,
    pub sources: Vec<SourceOutcome>,
    pub skipped: Vec<MissingCounterpart>,
}

struct SourceRun {
    outcome: SourceOutcome,
    records: Vec<DatasetRecord>,
    skipped: Vec<MissingCounterpart>,
}

pub struct App<A: ArchiveClient, K: KaggleClient> {
    archives: A,
    kaggle: K,
}

impl<A: ArchiveClient, K: KaggleClient> App<A, K> {
    pub fn new(archives: A, kaggle: K) -> Self {
        Self { archives, kaggle }
    }

    /// Runs every requested source in order, then writes the manifest.
    ///
    /// A failing source is reported and the run goes on with the next one,
    /// unless `fail_fast` is set. Records of sources already processed are
    /// kept either way; only an empty aggregate aborts without a manifest.
    pub fn build(
        &self,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<BuildResult, DatasetError> {
        let tree = OutputTree::new(config.output_root.clone());
        let mut records = Vec::new();
        let mut skipped = Vec::new();
        let mut sources = Vec::new();

        for request in &config.sources {
            let start = Instant::now();
            sink.event(ProgressEvent {
                message: format!("phase=Collect; source {}", request.id),
                elapsed: None,
            });
            match self.build_source(request, config, &tree, sink) {
                Ok(mut run) => {
                    sink.event(ProgressEvent {
                        message: format!(
                            "{}: {} records, {} skipped",
                            request.id, run.outcome.records, run.outcome.skipped
                        ),
                        elapsed: Some(start.elapsed()),
                    });
                    records.append(&mut run.records);
                    skipped.append(&mut run.skipped);
                    sources.push(run.outcome);
                }
                Err(err) if !config.fail_fast => {
                    error!(source = %request.id, error = %err, "source failed; continuing");
                    sources.push(SourceOutcome {
                        source: request.id,
                        status: SourceStatus::Failed,
                        origin: None,
                        root: None,
                        available: 0,
                        selected: 0,
                        records: 0,
                        skipped: 0,
                        error: Some(err.to_string()),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        if records.is_empty() {
            let stale = tree.manifest_path();
            if stale.is_file() {
                warn!(path = %stale, "removing manifest left by a previous run");
                fs::remove_file(stale.as_std_path())
                    .map_err(|err| DatasetError::Filesystem(format!("remove {stale}: {err}")))?;
            }
            return Err(DatasetError::EmptyDataset);
        }

        sink.event(ProgressEvent {
            message: "phase=Manifest; writing manifest".to_string(),
            elapsed: None,
        });
        let manifest_path = tree.manifest_path();
        let rows = manifest::write(records, manifest_path.as_std_path(), config.shuffle_seed)?;
        info!(rows, path = %manifest_path, "manifest written");

        Ok(BuildResult {
            manifest_path: manifest_path.to_string(),
            rows,
            sources,
            skipped,
        })
    }

    fn build_source(
        &self,
        request: &SourceRequest,
        config: &ResolvedConfig,
        tree: &OutputTree,
        sink: &dyn ProgressSink,
    ) -> Result<SourceRun, DatasetError> {
        let descriptor = registry::descriptor(request.id);
        let (root, origin) = self.materialize(request, config, sink)?;

        sink.event(ProgressEvent {
            message: format!("phase=Copy; {} from {}", descriptor.name, root.display()),
            elapsed: None,
        });
        let collection = Collector::new(descriptor, tree).collect(
            &root,
            Sampling {
                size: request.sample,
                seed: config.seed,
            },
        )?;

        Ok(SourceRun {
            outcome: SourceOutcome {
                source: request.id,
                status: SourceStatus::Collected,
                origin: Some(origin.to_string()),
                root: Some(root.display().to_string()),
                available: collection.available,
                selected: collection.selected,
                records: collection.records.len(),
                skipped: collection.skipped.len(),
                error: None,
            },
            records: collection.records,
            skipped: collection.skipped,
        })
    }

    /// Resolves the local root of a source, downloading it when needed.
    fn materialize(
        &self,
        request: &SourceRequest,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<(PathBuf, &'static str), DatasetError> {
        if let Some(path) = &request.local_path {
            if !path.is_dir() {
                return Err(DatasetError::InvalidConfig(format!(
                    "{}: {} is not a directory",
                    request.id,
                    path.display()
                )));
            }
            return Ok((path.clone(), "local"));
        }

        let descriptor = registry::descriptor(request.id);
        match descriptor.origin {
            Origin::Archive { url } => {
                sink.event(ProgressEvent {
                    message: format!("phase=Fetch; {url}"),
                    elapsed: None,
                });
                let outcome = ArchiveFetcher::new(&self.archives, &config.cache_dir).fetch(url)?;
                let origin = if outcome.archive_cached {
                    "cache"
                } else {
                    "download"
                };
                Ok((outcome.root, origin))
            }
            Origin::Kaggle { dataset } => {
                sink.event(ProgressEvent {
                    message: format!("phase=Fetch; kaggle {dataset}"),
                    elapsed: None,
                });
                let (root, cached) = kaggle::fetch_cached(
                    &self.kaggle,
                    dataset,
                    &config.cache_dir,
                    request.id.as_str(),
                )?;
                Ok((root, if cached { "cache" } else { "download" }))
            }
            Origin::Local => Err(DatasetError::InvalidConfig(format!(
                "{} requires a local path",
                request.id
            ))),
        }
    }
}
