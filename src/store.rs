use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{Record, SourcePlatform};
use crate::error::HarvestError;

#[derive(Debug, Clone)]
pub struct Store {
    data_root: Utf8PathBuf,
    scratch_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, HarvestError> {
        let cwd = std::env::current_dir().map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let data_root = Utf8PathBuf::from_path_buf(cwd.join(".geoharvest"))
            .map_err(|_| HarvestError::Filesystem("invalid data path".to_string()))?;

        let scratch_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir()
                        .join(".cache")
                        .join("geoharvest")
                        .join("downloads"),
                )
                .ok()
            })
            .ok_or_else(|| {
                HarvestError::Filesystem("unable to resolve download scratch directory".to_string())
            })?;

        Ok(Self {
            data_root,
            scratch_root,
        })
    }

    pub fn new_with_paths(data_root: Utf8PathBuf, scratch_root: Utf8PathBuf) -> Self {
        Self {
            data_root,
            scratch_root,
        }
    }

    pub fn data_root(&self) -> &Utf8Path {
        &self.data_root
    }

    pub fn scratch_root(&self) -> &Utf8Path {
        &self.scratch_root
    }

    pub fn records_path(&self, platform: SourcePlatform) -> Utf8PathBuf {
        self.data_root
            .join("records")
            .join(format!("{platform}.json"))
    }

    pub fn checkpoint_path(&self, platform: SourcePlatform) -> Utf8PathBuf {
        self.data_root
            .join("checkpoints")
            .join(format!("{platform}.json"))
    }

    pub fn results_path(&self) -> Utf8PathBuf {
        self.data_root.join("bbox_results.csv")
    }

    pub fn map_path(&self) -> Utf8PathBuf {
        self.data_root.join("footprints.html")
    }

    pub fn ensure_dirs(&self) -> Result<(), HarvestError> {
        fs::create_dir_all(self.data_root.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        fs::create_dir_all(self.scratch_root.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), HarvestError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))
    }

    pub fn save_records(
        &self,
        platform: SourcePlatform,
        records: &[Record],
    ) -> Result<(), HarvestError> {
        let content = serde_json::to_vec_pretty(records)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Self::write_bytes_atomic(&self.records_path(platform), &content)
    }

    pub fn load_records(&self, platform: SourcePlatform) -> Result<Vec<Record>, HarvestError> {
        let path = self.records_path(platform);
        if !path.as_std_path().exists() {
            return Err(HarvestError::RecordsNotFound(path.to_string()));
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        serde_json::from_str(&content).map_err(|err| HarvestError::Filesystem(err.to_string()))
    }
}

/// Persisted set of processed record indices; rewritten after every record
/// so a rerun skips everything already finished.
#[derive(Debug)]
pub struct CheckpointStore {
    path: Utf8PathBuf,
    processed: BTreeSet<u64>,
}

impl CheckpointStore {
    pub fn load(path: Utf8PathBuf) -> Result<Self, HarvestError> {
        let processed = if path.as_std_path().exists() {
            let content = fs::read_to_string(path.as_std_path())
                .map_err(|err| HarvestError::Checkpoint(err.to_string()))?;
            serde_json::from_str(&content)
                .map_err(|err| HarvestError::Checkpoint(err.to_string()))?
        } else {
            BTreeSet::new()
        };
        Ok(Self { path, processed })
    }

    pub fn contains(&self, index: u64) -> bool {
        self.processed.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    pub fn mark_processed(&mut self, index: u64) -> Result<(), HarvestError> {
        self.processed.insert(index);
        let content = serde_json::to_vec(&self.processed)
            .map_err(|err| HarvestError::Checkpoint(err.to_string()))?;
        Store::write_bytes_atomic(&self.path, &content)
            .map_err(|err| HarvestError::Checkpoint(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub filename: String,
    pub bbox: String,
    pub geometry: String,
    pub doi_url: String,
}

pub fn append_results(path: &Utf8Path, rows: &[ResultRow]) -> Result<(), HarvestError> {
    if rows.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| HarvestError::Results(err.to_string()))?;
    }
    let write_header = !path.as_std_path().exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map_err(|err| HarvestError::Results(err.to_string()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| HarvestError::Results(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| HarvestError::Results(err.to_string()))
}

pub fn read_results(path: &Utf8Path) -> Result<Vec<ResultRow>, HarvestError> {
    let mut reader = csv::Reader::from_path(path.as_std_path())
        .map_err(|err| HarvestError::Results(err.to_string()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.map_err(|err| HarvestError::Results(err.to_string()))?);
    }
    Ok(rows)
}
