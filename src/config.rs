use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HarvestError;
use crate::http_util::{BackoffSchedule, RetryPolicy};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub queries: Option<Vec<String>>,
    #[serde(default)]
    pub formats: Option<Vec<String>>,
    #[serde(default)]
    pub page_size: Option<u64>,
    #[serde(default)]
    pub target_records: Option<usize>,
    #[serde(default)]
    pub sample_fraction: Option<f64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub backoff_initial_secs: Option<u64>,
    #[serde(default)]
    pub backoff_max_secs: Option<u64>,
    #[serde(default)]
    pub zenodo_base_url: Option<String>,
    #[serde(default)]
    pub figshare_base_url: Option<String>,
    #[serde(default)]
    pub dataverse_base_url: Option<String>,
    #[serde(default)]
    pub dataverse_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub queries: Vec<String>,
    pub formats: Vec<String>,
    pub page_size: u64,
    pub target_records: usize,
    pub sample_fraction: f64,
    pub max_consecutive_failures: u32,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub zenodo_base_url: String,
    pub figshare_base_url: String,
    pub dataverse_base_url: String,
    pub dataverse_api_key: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HarvestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("geoharvest.json"),
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(HarvestError::ConfigRead(config_path));
            }
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HarvestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HarvestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HarvestError> {
        let sample_fraction = config.sample_fraction.unwrap_or(0.10);
        if !(0.0..=1.0).contains(&sample_fraction) {
            return Err(HarvestError::ConfigValue(format!(
                "sample_fraction must be within [0, 1], got {sample_fraction}"
            )));
        }

        let page_size = config.page_size.unwrap_or(200);
        if page_size == 0 {
            return Err(HarvestError::ConfigValue(
                "page_size must be greater than zero".to_string(),
            ));
        }

        let dataverse_api_key = config
            .dataverse_api_key
            .or_else(|| std::env::var("GEOHARVEST_DATAVERSE_KEY").ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            queries: config.queries.unwrap_or_else(default_queries),
            formats: config.formats.unwrap_or_else(default_formats),
            page_size,
            target_records: config.target_records.unwrap_or(500),
            sample_fraction,
            max_consecutive_failures: config.max_consecutive_failures.unwrap_or(5),
            request_timeout: Duration::from_secs(config.request_timeout_secs.unwrap_or(30)),
            retry: RetryPolicy {
                max_retries: config.max_retries.unwrap_or(3),
                backoff: BackoffSchedule {
                    initial: Duration::from_secs(config.backoff_initial_secs.unwrap_or(4)),
                    max: Duration::from_secs(config.backoff_max_secs.unwrap_or(64)),
                },
            },
            zenodo_base_url: config
                .zenodo_base_url
                .unwrap_or_else(|| "https://zenodo.org/api/records".to_string()),
            figshare_base_url: config
                .figshare_base_url
                .unwrap_or_else(|| "https://api.figshare.com/v2/articles".to_string()),
            dataverse_base_url: config
                .dataverse_base_url
                .unwrap_or_else(|| "https://dataverse.harvard.edu/api".to_string()),
            dataverse_api_key,
        })
    }
}

pub fn default_queries() -> Vec<String> {
    [
        "geospatial",
        "gis",
        "remote sensing",
        "ISO 19115",
        "ISO 19119",
        "ISO 19139",
        "shapefile",
        "geodatabase",
        "vector",
        "raster",
    ]
    .iter()
    .map(|query| query.to_string())
    .collect()
}

pub fn default_formats() -> Vec<String> {
    [
        ".shp", ".geojson", ".kml", ".gml", ".asc", ".tif", ".tiff", ".img", ".rst", ".gdb",
    ]
    .iter()
    .map(|format| format.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn resolve_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.page_size, 200);
        assert_eq!(resolved.target_records, 500);
        assert_eq!(resolved.sample_fraction, 0.10);
        assert_eq!(resolved.max_consecutive_failures, 5);
        assert_eq!(resolved.request_timeout, Duration::from_secs(30));
        assert_eq!(resolved.retry.max_retries, 3);
        assert_eq!(resolved.retry.backoff.initial, Duration::from_secs(4));
        assert_eq!(resolved.retry.backoff.max, Duration::from_secs(64));
        assert!(resolved.queries.contains(&"geospatial".to_string()));
        assert!(resolved.formats.contains(&".tif".to_string()));
    }

    #[test]
    fn reject_sample_fraction_out_of_range() {
        let config = Config {
            sample_fraction: Some(1.5),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, HarvestError::ConfigValue(_));
    }

    #[test]
    fn reject_zero_page_size() {
        let config = Config {
            page_size: Some(0),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, HarvestError::ConfigValue(_));
    }

    #[test]
    fn overrides_take_effect() {
        let config = Config {
            queries: Some(vec!["lidar".to_string()]),
            page_size: Some(50),
            target_records: Some(10),
            backoff_initial_secs: Some(2),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.queries, vec!["lidar".to_string()]);
        assert_eq!(resolved.page_size, 50);
        assert_eq!(resolved.target_records, 10);
        assert_eq!(resolved.retry.backoff.initial, Duration::from_secs(2));
    }
}
