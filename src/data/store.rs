//! Directory-backed dataset store

use super::{Dataset, SampleDataset};
use crate::error::{OdysseyError, Result};
use crate::utils::{self, fs::is_temp_file};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SUFFIX: &str = ".csv";

/// What to do when a name is already taken by different content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaveMode {
    /// Keep the existing file and save under the next free `_vN` name
    #[default]
    CreateNew,
    /// Replace the existing file
    Overwrite,
}

/// Reference to a persisted dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRef {
    /// Normalized file name, e.g. `my_data.csv`
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

impl DatasetRef {
    fn from_path(path: PathBuf) -> Result<Self> {
        let meta = fs::metadata(&path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            path,
            size_bytes: meta.len(),
            modified: DateTime::<Utc>::from(meta.modified()?),
        })
    }

    /// Name without the `.csv` suffix
    pub fn stem(&self) -> &str {
        self.name.strip_suffix(SUFFIX).unwrap_or(&self.name)
    }
}

/// Normalize a logical dataset name into its stored file name.
///
/// `"My Data"`, `"my data.CSV"` and `"my_data.csv.csv"` all become
/// `my_data.csv`. After whitespace runs collapse to `_`, only `[a-z0-9_.-]`
/// is accepted.
pub fn normalize_name(name: &str) -> Result<String> {
    let lowered = name.trim().to_lowercase();
    let mut stem = lowered.as_str();
    while let Some(rest) = stem.strip_suffix(SUFFIX) {
        stem = rest.trim_end();
    }
    let stem = stem.split_whitespace().collect::<Vec<_>>().join("_");

    if stem.is_empty() {
        return Err(OdysseyError::InvalidData("dataset name is empty".to_string()));
    }
    let plain = stem
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'));
    if !plain || stem.starts_with('.') {
        return Err(OdysseyError::InvalidData(format!(
            "dataset name '{}' is not a plain file name (allowed: a-z, 0-9, '_', '.', '-')",
            name
        )));
    }
    Ok(format!("{}{}", stem, SUFFIX))
}

/// Dataset store rooted at a directory
#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: PathBuf,
}

impl DatasetStore {
    /// Open the store, creating its directory if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            OdysseyError::Data(format!("failed to create dataset dir {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and persist a CSV payload under `name`
    pub fn save(&self, name: &str, rows: &[u8]) -> Result<DatasetRef> {
        self.save_with_mode(name, rows, SaveMode::CreateNew)
    }

    pub fn save_with_mode(&self, name: &str, rows: &[u8], mode: SaveMode) -> Result<DatasetRef> {
        let mut df = utils::parse_csv_bytes(rows)?;
        self.save_frame(name, &mut df, mode)
    }

    /// Persist an in-memory frame under `name`
    #[tracing::instrument(skip(self, df), fields(rows = df.height(), cols = df.width()))]
    pub fn save_frame(&self, name: &str, df: &mut DataFrame, mode: SaveMode) -> Result<DatasetRef> {
        let file_name = normalize_name(name)?;
        if df.width() == 0 || df.height() == 0 {
            return Err(OdysseyError::InvalidData(format!("dataset '{}' has no rows", file_name)));
        }
        let content = utils::to_csv_bytes(df)?;

        let (path, unchanged) = self.resolve_target(&file_name, &content, mode)?;
        if unchanged {
            debug!(path = %path.display(), "identical dataset already stored");
        } else {
            utils::write_atomic(&path, &content).map_err(|e| {
                OdysseyError::InvalidData(format!("failed to write {}: {}", path.display(), e))
            })?;
            info!(path = %path.display(), "dataset saved");
        }

        DatasetRef::from_path(path)
    }

    /// Pick the file to write: the normalized name, or the next `_vN` version
    /// when the name holds different content and overwriting is not allowed.
    /// The flag is true when an identical file already exists.
    fn resolve_target(&self, file_name: &str, content: &[u8], mode: SaveMode) -> Result<(PathBuf, bool)> {
        let primary = self.root.join(file_name);
        if mode == SaveMode::Overwrite {
            let unchanged = primary.exists() && fs::read(&primary)? == content;
            return Ok((primary, unchanged));
        }

        let stem = file_name.strip_suffix(SUFFIX).unwrap_or(file_name);
        let mut version = 1u32;
        loop {
            let candidate = match version {
                1 => file_name.to_string(),
                v => format!("{}_v{}{}", stem, v, SUFFIX),
            };
            let path = self.root.join(&candidate);
            if !path.exists() {
                return Ok((path, false));
            }
            if fs::read(&path)? == content {
                return Ok((path, true));
            }
            version += 1;
        }
    }

    /// Enumerate persisted datasets, sorted by name
    pub fn list(&self) -> Result<Vec<DatasetRef>> {
        let mut refs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_temp_file(&name) || !name.ends_with(SUFFIX) || !entry.file_type()?.is_file() {
                continue;
            }
            refs.push(DatasetRef::from_path(entry.path())?);
        }
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(refs)
    }

    /// Load a dataset's rows and schema
    pub fn load(&self, name: &str) -> Result<Dataset> {
        let file_name = normalize_name(name)?;
        let path = self.root.join(&file_name);
        if !path.is_file() {
            return Err(OdysseyError::NotFound(file_name));
        }

        let df = utils::load_csv(&path)?;
        debug!(dataset = %file_name, rows = df.height(), "dataset loaded");
        Ok(Dataset::new(file_name, df))
    }

    pub fn exists(&self, name: &str) -> bool {
        normalize_name(name)
            .map(|file_name| self.root.join(file_name).is_file())
            .unwrap_or(false)
    }

    /// Remove a dataset
    pub fn delete(&self, name: &str) -> Result<()> {
        let file_name = normalize_name(name)?;
        let path = self.root.join(&file_name);
        if !path.exists() {
            return Err(OdysseyError::NotFound(file_name));
        }

        fs::remove_file(&path).map_err(|e| OdysseyError::Deletion {
            name: file_name.clone(),
            reason: e.to_string(),
        })?;
        info!(dataset = %file_name, "dataset deleted");
        Ok(())
    }

    /// Generate a built-in sample and persist it under its canonical name
    pub fn load_sample(&self, sample: SampleDataset) -> Result<DatasetRef> {
        let mut df = sample.generate()?;
        self.save_frame(sample.name(), &mut df, SaveMode::CreateNew)
    }
}
