use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigValue(String),

    #[error("Zenodo request failed: {0}")]
    ZenodoHttp(String),

    #[error("Zenodo returned status {status}: {message}")]
    ZenodoStatus { status: u16, message: String },

    #[error("Figshare request failed: {0}")]
    FigshareHttp(String),

    #[error("Figshare returned status {status}: {message}")]
    FigshareStatus { status: u16, message: String },

    #[error("Dataverse request failed: {0}")]
    DataverseHttp(String),

    #[error("Dataverse returned status {status}: {message}")]
    DataverseStatus { status: u16, message: String },

    #[error("download request failed: {0}")]
    DownloadHttp(String),

    #[error("download returned status {status}: {message}")]
    DownloadStatus { status: u16, message: String },

    #[error("records file not found: {0} (run `geoharvest harvest` first)")]
    RecordsNotFound(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("extent extraction failed: {0}")]
    Extraction(String),

    #[error("invalid WKT geometry: {0}")]
    InvalidWkt(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("results table error: {0}")]
    Results(String),
}
