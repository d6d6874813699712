use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HarvestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourcePlatform {
    Zenodo,
    Figshare,
    Dataverse,
}

impl SourcePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePlatform::Zenodo => "zenodo",
            SourcePlatform::Figshare => "figshare",
            SourcePlatform::Dataverse => "dataverse",
        }
    }
}

impl fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourcePlatform {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "zenodo" => Ok(SourcePlatform::Zenodo),
            "figshare" => Ok(SourcePlatform::Figshare),
            "dataverse" => Ok(SourcePlatform::Dataverse),
            other => Err(HarvestError::InvalidPlatform(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub doi_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub sum_size: u64,
    #[serde(default)]
    pub query_key: Option<String>,
    pub platform: SourcePlatform,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Record {
    pub fn total_file_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_platform_valid() {
        let platform: SourcePlatform = " Zenodo ".parse().unwrap();
        assert_eq!(platform, SourcePlatform::Zenodo);
        assert_eq!(platform.to_string(), "zenodo");
    }

    #[test]
    fn parse_platform_invalid() {
        let err = "osf".parse::<SourcePlatform>().unwrap_err();
        assert_matches!(err, HarvestError::InvalidPlatform(_));
    }

    #[test]
    fn total_file_size_sums_all_entries() {
        let record = Record {
            id: "42".to_string(),
            doi_url: None,
            title: None,
            files: vec![
                FileEntry {
                    name: "a.shp".to_string(),
                    size: 100,
                    download_url: None,
                    checksum: None,
                },
                FileEntry {
                    name: "b.txt".to_string(),
                    size: 50,
                    download_url: None,
                    checksum: None,
                },
            ],
            sum_size: 0,
            query_key: None,
            platform: SourcePlatform::Zenodo,
            metadata: Map::new(),
        };
        assert_eq!(record.total_file_size(), 150);
    }
}
