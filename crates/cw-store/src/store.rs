//! Whole-document JSON store for circular weighing records.
//!
//! The document is read once, copied verbatim to an indexed backup, held in
//! memory and rewritten in full on every save. Only one writer per document
//! is supported.

use std::fs;
use std::path::{Path, PathBuf};

use cw_core::records::{analysis_key, measurement_key, ROOT_CONTAINER};
use cw_core::{AnalysisRecord, CwError, ErrorInfo, MeasurementRun};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

fn io_error(code: &str, err: impl ToString, path: &Path) -> CwError {
    CwError::Persistence(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Where a save ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// The document was written to its primary location.
    Primary,
    /// The primary write failed and the document went to this local path.
    Fallback(PathBuf),
}

/// In-memory weighing document bound to one scheme entry.
#[derive(Debug, Clone)]
pub struct WeighingStore {
    url: PathBuf,
    scheme_entry: String,
    document: Value,
    backup: Option<PathBuf>,
}

impl WeighingStore {
    /// Opens (or starts) the document at `url` for `scheme_entry`.
    ///
    /// An existing document is copied unmodified to the next free
    /// `<stem>_backup<N>.json` beside it before anything else happens.
    pub fn open(url: impl Into<PathBuf>, scheme_entry: &str) -> Result<Self, CwError> {
        let url = url.into();
        let (document, backup) = if url.exists() {
            let contents = fs::read(&url).map_err(|err| io_error("store-read", err, &url))?;
            let backup = next_backup_path(&url)?;
            fs::write(&backup, &contents).map_err(|err| io_error("store-backup", err, &backup))?;
            info!(path = %url.display(), backup = %backup.display(), "backed up weighing document");
            let document: Value = serde_json::from_slice(&contents).map_err(|err| {
                CwError::Serde(
                    ErrorInfo::new("store-parse", err.to_string())
                        .with_context("path", url.display().to_string()),
                )
            })?;
            (document, Some(backup))
        } else {
            (Value::Object(Map::new()), None)
        };

        let mut store = Self {
            url,
            scheme_entry: scheme_entry.to_string(),
            document,
            backup,
        };
        store.scheme_container_mut()?;
        Ok(store)
    }

    /// Primary location of the document.
    pub fn url(&self) -> &Path {
        &self.url
    }

    /// Scheme entry this store reads and writes.
    pub fn scheme_entry(&self) -> &str {
        &self.scheme_entry
    }

    /// Backup written when the document was opened, if it existed.
    pub fn backup_path(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    /// Whole in-memory document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    fn scheme_container(&self) -> Option<&Map<String, Value>> {
        self.document
            .get(ROOT_CONTAINER)?
            .get(&self.scheme_entry)?
            .as_object()
    }

    fn scheme_container_mut(&mut self) -> Result<&mut Map<String, Value>, CwError> {
        let path = self.url.display().to_string();
        let malformed = move |what: &str| {
            CwError::Serde(
                ErrorInfo::new("store-shape", format!("{what} is not a JSON object"))
                    .with_context("path", path.clone()),
            )
        };
        let scheme_entry = self.scheme_entry.clone();

        let root = self
            .document
            .as_object_mut()
            .ok_or_else(|| malformed("document root"))?;
        let weighings = root
            .entry(ROOT_CONTAINER)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| malformed(ROOT_CONTAINER))?;
        weighings
            .entry(scheme_entry)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| malformed("scheme entry container"))
    }

    fn get_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CwError> {
        let Some(value) = self.scheme_container().and_then(|c| c.get(key)) else {
            return Ok(None);
        };
        serde_json::from_value(value.clone()).map(Some).map_err(|err| {
            CwError::Serde(
                ErrorInfo::new("store-record-parse", err.to_string())
                    .with_context("scheme_entry", self.scheme_entry.as_str())
                    .with_context("record", key),
            )
        })
    }

    fn put_record<T: Serialize>(&mut self, key: String, record: &T) -> Result<(), CwError> {
        let value = serde_json::to_value(record).map_err(|err| {
            CwError::Serde(ErrorInfo::new("store-record-serialize", err.to_string()))
        })?;
        self.scheme_container_mut()?.insert(key, value);
        Ok(())
    }

    /// Measurement run `run_id`, if present.
    pub fn measurement_run(&self, run_id: u32) -> Result<Option<MeasurementRun>, CwError> {
        self.get_record(&measurement_key(run_id))
    }

    /// Analysis of run `run_id`, if present.
    pub fn analysis_record(&self, run_id: u32) -> Result<Option<AnalysisRecord>, CwError> {
        self.get_record(&analysis_key(run_id))
    }

    /// Inserts or replaces measurement run `run_id` in memory.
    pub fn put_measurement_run(&mut self, run_id: u32, run: &MeasurementRun) -> Result<(), CwError> {
        self.put_record(measurement_key(run_id), run)
    }

    /// Replaces the analysis of run `run_id` in memory.
    pub fn put_analysis_record(
        &mut self,
        run_id: u32,
        record: &AnalysisRecord,
    ) -> Result<(), CwError> {
        self.put_record(analysis_key(run_id), record)
    }

    /// Drops a measurement run that never captured a reading.
    pub fn discard_measurement_run(&mut self, run_id: u32) -> Result<(), CwError> {
        self.scheme_container_mut()?.remove(&measurement_key(run_id));
        Ok(())
    }

    /// Ids of every stored measurement run, ascending.
    pub fn run_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .scheme_container()
            .map(|container| {
                container
                    .keys()
                    .filter_map(|key| key.strip_prefix("measurement_run_")?.parse().ok())
                    .collect()
            })
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Overwrites the primary document with the in-memory content.
    pub fn save(&self) -> Result<(), CwError> {
        self.write_to(&self.url)
    }

    /// Saves to the primary location, falling back to `fallback_dir` on failure.
    pub fn save_with_fallback(&self, fallback_dir: &Path) -> Result<SaveTarget, CwError> {
        match self.save() {
            Ok(()) => Ok(SaveTarget::Primary),
            Err(primary) => {
                let file_name = self
                    .url
                    .file_name()
                    .map(|name| name.to_os_string())
                    .unwrap_or_else(|| "circular_weighings.json".into());
                let fallback = fallback_dir.join(file_name);
                warn!(
                    primary = %self.url.display(),
                    fallback = %fallback.display(),
                    error = %primary,
                    "primary save failed, writing fallback copy"
                );
                self.write_to(&fallback).map_err(|err| match err {
                    CwError::Persistence(info) => CwError::Persistence(
                        info.with_context("primary_error", primary.info().message.clone()),
                    ),
                    other => other,
                })?;
                Ok(SaveTarget::Fallback(fallback))
            }
        }
    }

    fn write_to(&self, path: &Path) -> Result<(), CwError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| io_error("store-mkdir", err, parent))?;
        }
        let json = serde_json::to_string_pretty(&self.document).map_err(|err| {
            CwError::Serde(
                ErrorInfo::new("store-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| io_error("store-write", err, path))
    }
}

/// Next unused `<stem>_backup<N>.json` beside `url`.
///
/// `N` is the number of backups already present, raised past the highest
/// existing index so a new backup always sorts after the older ones.
pub fn next_backup_path(url: &Path) -> Result<PathBuf, CwError> {
    let parent = url
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stem = url
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("circular_weighings");
    let prefix = format!("{stem}_backup");
    let indices: Vec<u32> = fs::read_dir(parent)
        .map_err(|err| io_error("store-list-backups", err, parent))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix(&prefix))
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|index| index.parse::<u32>().ok())
        })
        .collect();
    let after_highest = indices.iter().max().map_or(0, |max| max + 1);
    let mut index = after_highest.max(indices.len() as u32);
    loop {
        let candidate = parent.join(format!("{prefix}{index}.json"));
        if !candidate.exists() {
            return Ok(candidate);
        }
        index += 1;
    }
}
