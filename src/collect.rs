//! Locates matched (image, counterpart) items for one source and copies them
//! into the unified output tree.
//!
//! Collection runs in three phases so that nothing is copied for a source
//! whose sample request cannot be satisfied:
//!
//! 1. plan: enumerate key files per rule and resolve every counterpart,
//!    skipping incomplete items with a warning;
//! 2. sample: narrow the complete items when a sample size is set;
//! 3. copy: copy images verbatim and masks verbatim or binarized.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{DatasetRecord, Label, Role, SourceId, Stem};
use crate::error::DatasetError;
use crate::fs_util;
use crate::layout::OutputTree;
use crate::mask;
use crate::registry::{Counterpart, ItemRule, Locate, MaskFormat, Scope, SourceDescriptor};
use crate::sampler;

#[derive(Debug, Clone, Copy, Default)]
pub struct Sampling {
    /// Number of items to keep; 0 keeps all.
    pub size: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissingReason {
    NotFound,
    Ambiguous { candidates: usize },
    Unreadable { message: String },
    /// Another file of the same source maps to the same output name.
    NameCollision { existing: String },
}

/// An item dropped because a required file could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingCounterpart {
    pub source: SourceId,
    pub stem: Stem,
    pub role: Role,
    pub reason: MissingReason,
}

/// Sampling unit: the stem plus the key file, which keeps keys unique when
/// two rules share a stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ItemKey {
    pub stem: Stem,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub key: ItemKey,
    pub files: Vec<(Role, PathBuf)>,
}

impl PlannedItem {
    fn file(&self, role: Role) -> Option<&PathBuf> {
        self.files
            .iter()
            .find(|(candidate, _)| *candidate == role)
            .map(|(_, path)| path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub items: Vec<PlannedItem>,
    pub skipped: Vec<MissingCounterpart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub source: SourceId,
    pub available: usize,
    pub selected: usize,
    pub records: Vec<DatasetRecord>,
    pub skipped: Vec<MissingCounterpart>,
}

struct Placement<'p> {
    role: Role,
    source: &'p Path,
    record_path: Utf8PathBuf,
}

enum Lookup {
    Found(PathBuf),
    Missing(MissingReason),
}

pub struct Collector<'a> {
    descriptor: &'a SourceDescriptor,
    tree: &'a OutputTree,
    listings: HashMap<PathBuf, Vec<String>>,
}

impl<'a> Collector<'a> {
    pub fn new(descriptor: &'a SourceDescriptor, tree: &'a OutputTree) -> Self {
        Self {
            descriptor,
            tree,
            listings: HashMap::new(),
        }
    }

    pub fn collect(
        mut self,
        source_root: &Path,
        sampling: Sampling,
    ) -> Result<Collection, DatasetError> {
        let id = self.descriptor.id;
        let plan = self.plan(source_root)?;
        let available = plan.items.len();

        let keys: Vec<ItemKey> = plan.items.iter().map(|item| item.key.clone()).collect();
        let chosen: BTreeSet<ItemKey> =
            sampler::sample(id.as_str(), &keys, sampling.size, sampling.seed)?
                .into_iter()
                .collect();
        let mut selected: Vec<PlannedItem> = plan
            .items
            .into_iter()
            .filter(|item| chosen.contains(&item.key))
            .collect();
        selected.sort_by(|a, b| a.key.cmp(&b.key));
        info!(source = %id, available, selected = selected.len(), "collecting items");

        self.tree.ensure()?;
        let mut skipped = plan.skipped;
        let mut records = Vec::new();
        let mut emitted = HashMap::new();
        for item in &selected {
            match self.copy_item(item, &mut emitted) {
                Ok(Ok(mut item_records)) => records.append(&mut item_records),
                Ok(Err((role, reason))) => {
                    warn!(source = %id, stem = %item.key.stem, role = %role, ?reason, "output name already taken; skipping item");
                    skipped.push(MissingCounterpart {
                        source: id,
                        stem: item.key.stem.clone(),
                        role,
                        reason,
                    });
                }
                Err(DatasetError::MaskNormalization(message)) => {
                    warn!(source = %id, stem = %item.key.stem, %message, "unreadable mask; skipping item");
                    skipped.push(MissingCounterpart {
                        source: id,
                        stem: item.key.stem.clone(),
                        role: Role::Mask,
                        reason: MissingReason::Unreadable { message },
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Collection {
            source: id,
            available,
            selected: selected.len(),
            records,
            skipped,
        })
    }

    /// Enumerates items and resolves their counterparts without touching the
    /// output tree.
    pub fn plan(&mut self, source_root: &Path) -> Result<Plan, DatasetError> {
        let mut plan = Plan::default();
        for rule in self.descriptor.rules {
            self.plan_rule(source_root, rule, &mut plan)?;
        }
        Ok(plan)
    }

    fn plan_rule(
        &mut self,
        source_root: &Path,
        rule: &ItemRule,
        plan: &mut Plan,
    ) -> Result<(), DatasetError> {
        let id = self.descriptor.id;
        let key_re = compile(id, rule.key)?;
        let exclude_re = rule.exclude.map(|pattern| compile(id, pattern)).transpose()?;

        let scopes: Vec<(PathBuf, bool)> = match rule.scope {
            Scope::Dir { path, recursive } => vec![(source_root.join(path), recursive)],
            Scope::Subdirs { path } => fs_util::list_subdirs(&source_root.join(path))?
                .into_iter()
                .map(|dir| (dir, false))
                .collect(),
        };

        for (scope_dir, recursive) in scopes {
            for file in fs_util::list_files(&scope_dir, recursive)? {
                let Some(name) = file.file_name().and_then(|name| name.to_str()) else {
                    debug!(path = %file.display(), "skipping non-utf8 file name");
                    continue;
                };
                if exclude_re.as_ref().is_some_and(|re| re.is_match(name)) {
                    continue;
                }
                let Some(caps) = key_re.captures(name) else {
                    continue;
                };
                let stem = Stem::new(&caps["stem"]);

                match self.resolve_item(source_root, &scope_dir, &file, &stem, rule)? {
                    Ok(files) => plan.items.push(PlannedItem {
                        key: ItemKey {
                            stem,
                            path: file.clone(),
                        },
                        files,
                    }),
                    Err((role, reason)) => {
                        warn!(source = %id, stem = %stem, role = %role, ?reason, "missing counterpart; skipping item");
                        plan.skipped.push(MissingCounterpart {
                            source: id,
                            stem,
                            role,
                            reason,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn resolve_item(
        &mut self,
        source_root: &Path,
        scope_dir: &Path,
        key_file: &Path,
        stem: &Stem,
        rule: &ItemRule,
    ) -> Result<Result<Vec<(Role, PathBuf)>, (Role, MissingReason)>, DatasetError> {
        let mut files = vec![(rule.key_role, key_file.to_path_buf())];
        for counterpart in rule.counterparts {
            match self.locate(source_root, scope_dir, key_file, stem, counterpart)? {
                Lookup::Found(path) => files.push((counterpart.role, path)),
                Lookup::Missing(reason) => return Ok(Err((counterpart.role, reason))),
            }
        }
        let has = |role: Role| files.iter().any(|(candidate, _)| *candidate == role);
        if has(Role::Tampered) && !has(Role::Mask) {
            return Ok(Err((Role::Mask, MissingReason::NotFound)));
        }
        Ok(Ok(files))
    }

    fn locate(
        &mut self,
        source_root: &Path,
        scope_dir: &Path,
        key_file: &Path,
        stem: &Stem,
        counterpart: &Counterpart,
    ) -> Result<Lookup, DatasetError> {
        let (search_dir, template) = match counterpart.locate {
            Locate::Sibling(template) => (
                key_file.parent().unwrap_or(scope_dir).to_path_buf(),
                template,
            ),
            Locate::Mirror { dir, pattern } => {
                let relative = key_file
                    .parent()
                    .and_then(|parent| parent.strip_prefix(scope_dir).ok())
                    .unwrap_or_else(|| Path::new(""));
                (source_root.join(dir).join(relative), pattern)
            }
        };

        let re = compile(
            self.descriptor.id,
            &template.replace("{stem}", &regex::escape(stem.as_str())),
        )?;
        let key_name = key_file.file_name().and_then(|name| name.to_str());
        let names = self.listing(&search_dir)?;
        // Templates anchored on the stem only need the sorted range sharing
        // that prefix.
        let candidates: &[String] = if template.starts_with("^{stem}") {
            let start = names.partition_point(|name| name.as_str() < stem.as_str());
            let len = names[start..]
                .iter()
                .take_while(|name| name.starts_with(stem.as_str()))
                .count();
            &names[start..start + len]
        } else {
            names
        };

        let matches: Vec<&String> = candidates
            .iter()
            .filter(|name| Some(name.as_str()) != key_name && re.is_match(name))
            .collect();
        Ok(match matches.as_slice() {
            [only] => Lookup::Found(search_dir.join(only.as_str())),
            [] => Lookup::Missing(MissingReason::NotFound),
            many => Lookup::Missing(MissingReason::Ambiguous {
                candidates: many.len(),
            }),
        })
    }

    fn listing(&mut self, dir: &Path) -> Result<&Vec<String>, DatasetError> {
        if !self.listings.contains_key(dir) {
            let mut names: Vec<String> = fs_util::list_files(dir, false)?
                .iter()
                .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
                .map(|name| name.to_string())
                .collect();
            names.sort();
            self.listings.insert(dir.to_path_buf(), names);
        }
        self.listings
            .get(dir)
            .ok_or_else(|| DatasetError::Filesystem(format!("listing lost for {}", dir.display())))
    }

    /// Copies one item. A destination already written from the same file
    /// (an original shared by several tampered items) is reused; one written
    /// from a different file rejects the item.
    #[allow(clippy::type_complexity)]
    fn copy_item(
        &self,
        item: &PlannedItem,
        emitted: &mut HashMap<Utf8PathBuf, PathBuf>,
    ) -> Result<Result<Vec<DatasetRecord>, (Role, MissingReason)>, DatasetError> {
        let placements = self.placements(item)?;
        let collision = placements.iter().find_map(|placement| {
            emitted
                .get(&placement.record_path)
                .filter(|previous| previous.as_path() != placement.source)
                .map(|previous| (placement.role, previous))
        });
        if let Some((role, previous)) = collision {
            return Ok(Err((
                role,
                MissingReason::NameCollision {
                    existing: previous.display().to_string(),
                },
            )));
        }

        let mut mask_record = None;
        for placement in placements.iter().filter(|p| p.role == Role::Mask) {
            if !emitted.contains_key(&placement.record_path) {
                let dest = self.tree.resolve(&placement.record_path);
                match self.descriptor.mask_format {
                    MaskFormat::Verbatim => fs_util::copy_file_atomic(placement.source, &dest)?,
                    MaskFormat::BinaryPng => mask::binarize(placement.source, &dest)?,
                }
                emitted.insert(placement.record_path.clone(), placement.source.to_path_buf());
            }
            mask_record = Some(placement.record_path.clone());
        }

        let mut records = Vec::new();
        for placement in &placements {
            let Some(label) = placement.role.label() else {
                continue;
            };
            if emitted.contains_key(&placement.record_path) {
                continue;
            }
            fs_util::copy_file_atomic(
                placement.source,
                &self.tree.resolve(&placement.record_path),
            )?;
            emitted.insert(placement.record_path.clone(), placement.source.to_path_buf());
            let record = match (label, &mask_record) {
                (Label::Orig, _) => DatasetRecord::orig(placement.record_path.clone()),
                (Label::Tampered, Some(mask_path)) => {
                    DatasetRecord::tampered(placement.record_path.clone(), mask_path.clone())
                }
                (Label::Tampered, None) => {
                    return Err(DatasetError::Filesystem(format!(
                        "tampered item {} reached copy without a mask",
                        item.key.stem
                    )));
                }
            };
            records.push(record);
        }
        Ok(Ok(records))
    }

    fn placements<'p>(&self, item: &'p PlannedItem) -> Result<Vec<Placement<'p>>, DatasetError> {
        let mut placements = Vec::with_capacity(item.files.len());
        for (role, source) in &item.files {
            let record_path = match role.label() {
                Some(label) => self
                    .tree
                    .image_record_path(label, &self.output_name(source)?),
                None => self.tree.mask_record_path(&self.mask_name(source)?),
            };
            placements.push(Placement {
                role: *role,
                source: source.as_path(),
                record_path,
            });
        }
        Ok(placements)
    }

    fn mask_name(&self, source: &Path) -> Result<String, DatasetError> {
        match self.descriptor.mask_format {
            MaskFormat::Verbatim => self.output_name(source),
            MaskFormat::BinaryPng => {
                let stem = source
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .ok_or_else(|| non_utf8(source))?;
                Ok(format!("{}_{stem}.png", self.descriptor.id))
            }
        }
    }

    /// `<source id>_<file name>`, keeping names unique across sources.
    fn output_name(&self, source: &Path) -> Result<String, DatasetError> {
        let name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| non_utf8(source))?;
        Ok(format!("{}_{name}", self.descriptor.id))
    }
}

fn compile(id: SourceId, pattern: &str) -> Result<Regex, DatasetError> {
    Regex::new(pattern)
        .map_err(|err| DatasetError::InvalidConfig(format!("{id}: bad pattern {pattern}: {err}")))
}

fn non_utf8(path: &Path) -> DatasetError {
    DatasetError::Filesystem(format!("non-utf8 file name: {}", path.display()))
}
