//! Loading and saving sweep datasets as JSON.
//!
//! Files hold a flat, pretty-printed array of records. Writes go through a
//! sibling temp file and a rename, so readers never see a half-written file.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::record::{Dataset, SweepRecord};
use crate::sweep::Checkpoint;

fn persistence_error(path: &Path, action: &str, err: impl std::fmt::Display) -> HarnessError {
    HarnessError::Persistence(format!("failed to {} {}: {}", action, path.display(), err))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `records` to `path`, replacing any previous content.
pub fn save_records(path: &Path, records: &[SweepRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| persistence_error(parent, "create", e))?;
    }

    let tmp = temp_path(path);
    let file = File::create(&tmp).map_err(|e| persistence_error(&tmp, "create", e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)
        .map_err(|e| persistence_error(&tmp, "serialize", e))?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|e| persistence_error(&tmp, "write", e))?;
    drop(writer);

    fs::rename(&tmp, path).map_err(|e| persistence_error(path, "replace", e))?;
    debug!(path = %path.display(), records = records.len(), "dataset saved");
    Ok(())
}

/// Writes a whole dataset to `path`.
pub fn save_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    save_records(path, &dataset.records)
}

/// Reads a dataset written by [`save_dataset`] (or any flat JSON array of
/// records in the same shape).
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| persistence_error(path, "open", e))?;
    let records: Vec<SweepRecord> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| persistence_error(path, "parse", e))?;
    debug!(path = %path.display(), records = records.len(), "dataset loaded");
    Ok(Dataset::new(records))
}

/// Rewrites a dataset file after every record of a sweep.
///
/// An interrupted sweep leaves the file holding every record measured so far.
#[derive(Debug, Clone)]
pub struct JsonCheckpoint {
    path: PathBuf,
}

impl JsonCheckpoint {
    /// Checkpoint writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Checkpoint for JsonCheckpoint {
    fn save(&mut self, records: &[SweepRecord]) -> Result<()> {
        save_records(&self.path, records)
    }
}
