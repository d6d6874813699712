use reqwest::blocking::Client;
use serde_json::Value;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::domain::{FileEntry, Record, SourcePlatform};
use crate::error::HarvestError;
use crate::http_util::{self, HttpFailure, RetryPolicy, page_count};
use crate::repository::{Page, Pagination, RepositoryClient};

#[derive(Clone)]
pub struct ZenodoHttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ZenodoHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, HarvestError> {
        let client = http_util::build_client(config.request_timeout)
            .map_err(|err| HarvestError::ZenodoHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.zenodo_base_url.clone(),
            retry: config.retry,
        })
    }

    fn fetch_page_json(&self, query: &str, page: u64, size: u64) -> Result<Value, HarvestError> {
        let response = http_util::send_with_retries(&self.retry, || {
            self.client
                .get(&self.base_url)
                .query(&[("q", query)])
                .query(&[("size", size), ("page", page)])
        })
        .map_err(map_failure)?;
        response
            .json()
            .map_err(|err| HarvestError::ZenodoHttp(err.to_string()))
    }
}

impl RepositoryClient for ZenodoHttpClient {
    fn platform(&self) -> SourcePlatform {
        SourcePlatform::Zenodo
    }

    fn pagination(&self) -> Pagination {
        Pagination::Counted
    }

    fn total_pages(&self, query: &str, page_size: u64) -> Result<u64, HarvestError> {
        let payload = self.fetch_page_json(query, 1, page_size)?;
        let total = payload["hits"]["total"].as_u64().ok_or_else(|| {
            HarvestError::ZenodoHttp("missing hits.total in search response".to_string())
        })?;
        info!(total, query = %query, "zenodo record count");
        Ok(page_count(total, page_size))
    }

    fn search_page(&self, query: &str, page: u64, page_size: u64) -> Result<Page, HarvestError> {
        let payload = self.fetch_page_json(query, page, page_size)?;
        let hits = payload["hits"]["hits"].as_array().ok_or_else(|| {
            HarvestError::ZenodoHttp("missing hits.hits in search response".to_string())
        })?;
        let records: Vec<Record> = hits.iter().filter_map(parse_record).collect();
        let has_more = hits.len() as u64 == page_size;
        Ok(Page { records, has_more })
    }
}

fn map_failure(failure: HttpFailure) -> HarvestError {
    match failure {
        HttpFailure::Transport(message) => HarvestError::ZenodoHttp(message),
        HttpFailure::Status { status, message } => HarvestError::ZenodoStatus { status, message },
    }
}

fn parse_record(hit: &Value) -> Option<Record> {
    let object = hit.as_object()?;
    let id = value_to_string(object.get("id")?)?;
    let files = object
        .get("files")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(parse_file).collect())
        .unwrap_or_default();
    let doi_url = object
        .get("doi_url")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .or_else(|| {
            object
                .get("doi")
                .and_then(Value::as_str)
                .map(|doi| format!("https://doi.org/{doi}"))
        });
    let title = object
        .get("title")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .or_else(|| {
            object
                .get("metadata")
                .and_then(|metadata| metadata.get("title"))
                .and_then(Value::as_str)
                .map(ToString::to_string)
        });
    let mut metadata = object.clone();
    metadata.remove("files");
    Some(Record {
        id,
        doi_url,
        title,
        files,
        sum_size: 0,
        query_key: None,
        platform: SourcePlatform::Zenodo,
        metadata,
    })
}

fn parse_file(value: &Value) -> Option<FileEntry> {
    let name = value.get("key").and_then(Value::as_str)?.to_string();
    let size = value.get("size").and_then(Value::as_u64).unwrap_or(0);
    let download_url = value
        .get("links")
        .and_then(|links| links.get("self"))
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let checksum = value
        .get("checksum")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    Some(FileEntry {
        name,
        size,
        download_url,
        checksum,
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_record_from_hit() {
        let hit = json!({
            "id": 123456,
            "doi_url": "https://doi.org/10.5281/zenodo.123456",
            "title": "Land cover rasters",
            "files": [
                {"key": "cover.tif", "size": 2048, "links": {"self": "https://zenodo.org/api/files/abc/cover.tif"}, "checksum": "md5:aa"},
                {"key": "readme.md", "size": 10, "links": {}}
            ],
            "created": "2024-01-01"
        });
        let record = parse_record(&hit).unwrap();
        assert_eq!(record.id, "123456");
        assert_eq!(record.files.len(), 2);
        assert_eq!(record.files[0].size, 2048);
        assert!(record.files[0].download_url.is_some());
        assert!(record.files[1].download_url.is_none());
        assert_eq!(record.platform, SourcePlatform::Zenodo);
        assert!(record.metadata.contains_key("created"));
        assert!(!record.metadata.contains_key("files"));
    }

    #[test]
    fn doi_url_falls_back_to_doi_field() {
        let hit = json!({"id": "7", "doi": "10.5281/zenodo.7"});
        let record = parse_record(&hit).unwrap();
        assert_eq!(
            record.doi_url.as_deref(),
            Some("https://doi.org/10.5281/zenodo.7")
        );
    }
}
