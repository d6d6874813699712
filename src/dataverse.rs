use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{FileEntry, Record, SourcePlatform};
use crate::error::HarvestError;
use crate::http_util::{self, HttpFailure, RetryPolicy, page_count};
use crate::repository::{Page, Pagination, RepositoryClient};

#[derive(Clone)]
pub struct DataverseHttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    api_key: Option<String>,
}

impl DataverseHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, HarvestError> {
        let client = http_util::build_client(config.request_timeout)
            .map_err(|err| HarvestError::DataverseHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.dataverse_base_url.clone(),
            retry: config.retry,
            api_key: config.dataverse_api_key.clone(),
        })
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("X-Dataverse-key", key),
            None => request,
        }
    }

    fn fetch_search(&self, query: &str, start: u64, per_page: u64) -> Result<Value, HarvestError> {
        let url = format!("{}/search", self.base_url);
        let response = http_util::send_with_retries(&self.retry, || {
            self.with_key(
                self.client
                    .get(&url)
                    .query(&[("q", query)])
                    .query(&[("start", start), ("per_page", per_page)]),
            )
        })
        .map_err(map_failure)?;
        response
            .json()
            .map_err(|err| HarvestError::DataverseHttp(err.to_string()))
    }

    /// Dataset files live behind the export endpoint, one child request per
    /// dataset in the page.
    fn dataset_files(&self, persistent_id: &str) -> Result<Vec<FileEntry>, HarvestError> {
        let url = format!("{}/datasets/export", self.base_url);
        let response = http_util::send_with_retries(&self.retry, || {
            self.with_key(
                self.client
                    .get(&url)
                    .query(&[("exporter", "dataverse_json"), ("persistentId", persistent_id)]),
            )
        })
        .map_err(map_failure)?;
        let payload: Value = response
            .json()
            .map_err(|err| HarvestError::DataverseHttp(err.to_string()))?;
        let files = payload["datasetVersion"]["files"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|entry| parse_file(entry, &self.base_url))
                    .collect()
            })
            .unwrap_or_default();
        Ok(files)
    }
}

impl RepositoryClient for DataverseHttpClient {
    fn platform(&self) -> SourcePlatform {
        SourcePlatform::Dataverse
    }

    fn pagination(&self) -> Pagination {
        Pagination::Counted
    }

    fn total_pages(&self, query: &str, page_size: u64) -> Result<u64, HarvestError> {
        let payload = self.fetch_search(query, 0, page_size)?;
        let total = payload["data"]["total_count"].as_u64().ok_or_else(|| {
            HarvestError::DataverseHttp("missing data.total_count in search response".to_string())
        })?;
        info!(total, query = %query, "dataverse record count");
        Ok(page_count(total, page_size))
    }

    fn search_page(&self, query: &str, page: u64, page_size: u64) -> Result<Page, HarvestError> {
        let start = page.saturating_sub(1) * page_size;
        let payload = self.fetch_search(query, start, page_size)?;
        let items = payload["data"]["items"].as_array().ok_or_else(|| {
            HarvestError::DataverseHttp("missing data.items in search response".to_string())
        })?;

        let mut records = Vec::new();
        for item in items {
            // search results mix datasets with their files; only datasets count
            if item.get("type").and_then(Value::as_str) != Some("dataset") {
                continue;
            }
            let Some(mut record) = parse_record(item) else {
                continue;
            };
            match self.dataset_files(&record.id) {
                Ok(files) => record.files = files,
                Err(err) => warn!(
                    dataset = %record.id,
                    error = %err,
                    "file listing failed, keeping record with empty file list"
                ),
            }
            records.push(record);
        }
        let has_more = items.len() as u64 == page_size;
        Ok(Page { records, has_more })
    }
}

fn map_failure(failure: HttpFailure) -> HarvestError {
    match failure {
        HttpFailure::Transport(message) => HarvestError::DataverseHttp(message),
        HttpFailure::Status { status, message } => {
            HarvestError::DataverseStatus { status, message }
        }
    }
}

fn parse_record(item: &Value) -> Option<Record> {
    let object = item.as_object()?;
    let id = object.get("global_id").and_then(Value::as_str)?.to_string();
    let title = object
        .get("name")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let doi_url = object
        .get("url")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .or_else(|| {
            id.strip_prefix("doi:")
                .map(|doi| format!("https://doi.org/{doi}"))
        });
    Some(Record {
        id,
        doi_url,
        title,
        files: Vec::new(),
        sum_size: 0,
        query_key: None,
        platform: SourcePlatform::Dataverse,
        metadata: object.clone(),
    })
}

fn parse_file(entry: &Value, base_url: &str) -> Option<FileEntry> {
    let data_file = entry.get("dataFile")?;
    let name = data_file
        .get("filename")
        .and_then(Value::as_str)?
        .to_string();
    let size = data_file
        .get("filesize")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let download_url = data_file
        .get("id")
        .and_then(Value::as_u64)
        .map(|id| format!("{base_url}/access/datafile/{id}"));
    let checksum = data_file
        .get("md5")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .or_else(|| {
            data_file["checksum"]["value"]
                .as_str()
                .map(ToString::to_string)
        });
    Some(FileEntry {
        name,
        size,
        download_url,
        checksum,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_record_requires_global_id() {
        let item = json!({
            "type": "dataset",
            "name": "Soil moisture grids",
            "global_id": "doi:10.7910/DVN/ABC123",
            "url": "https://doi.org/10.7910/DVN/ABC123"
        });
        let record = parse_record(&item).unwrap();
        assert_eq!(record.id, "doi:10.7910/DVN/ABC123");
        assert_eq!(record.platform, SourcePlatform::Dataverse);

        let without = json!({"type": "dataset", "name": "no id"});
        assert!(parse_record(&without).is_none());
    }

    #[test]
    fn parse_file_builds_access_url() {
        let entry = json!({
            "dataFile": {
                "id": 42,
                "filename": "moisture.tif",
                "filesize": 1024,
                "md5": "cc"
            }
        });
        let file = parse_file(&entry, "https://dataverse.harvard.edu/api").unwrap();
        assert_eq!(
            file.download_url.as_deref(),
            Some("https://dataverse.harvard.edu/api/access/datafile/42")
        );
        assert_eq!(file.checksum.as_deref(), Some("cc"));
    }
}
