use reqwest::blocking::Client;
use serde_json::Value;
use tracing::warn;

use crate::config::ResolvedConfig;
use crate::domain::{FileEntry, Record, SourcePlatform};
use crate::error::HarvestError;
use crate::http_util::{self, HttpFailure, RetryPolicy};
use crate::repository::{Page, Pagination, RepositoryClient};

#[derive(Clone)]
pub struct FigshareHttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl FigshareHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, HarvestError> {
        let client = http_util::build_client(config.request_timeout)
            .map_err(|err| HarvestError::FigshareHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.figshare_base_url.clone(),
            retry: config.retry,
        })
    }

    /// File metadata is not embedded in the search listing; each article
    /// needs one child request.
    fn article_files(&self, article_id: &str) -> Result<Vec<FileEntry>, HarvestError> {
        let url = format!("{}/{}", self.base_url, article_id);
        let response = http_util::send_with_retries(&self.retry, || self.client.get(&url))
            .map_err(map_failure)?;
        let payload: Value = response
            .json()
            .map_err(|err| HarvestError::FigshareHttp(err.to_string()))?;
        let files = payload
            .get("files")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(parse_file).collect())
            .unwrap_or_default();
        Ok(files)
    }
}

impl RepositoryClient for FigshareHttpClient {
    fn platform(&self) -> SourcePlatform {
        SourcePlatform::Figshare
    }

    fn pagination(&self) -> Pagination {
        Pagination::OpenEnded
    }

    fn total_pages(&self, _query: &str, _page_size: u64) -> Result<u64, HarvestError> {
        Err(HarvestError::FigshareHttp(
            "article search exposes no record count endpoint".to_string(),
        ))
    }

    fn search_page(&self, query: &str, page: u64, page_size: u64) -> Result<Page, HarvestError> {
        let response = http_util::send_with_retries(&self.retry, || {
            self.client
                .get(&self.base_url)
                .query(&[("search_for", query)])
                .query(&[("page", page), ("page_size", page_size)])
        })
        .map_err(map_failure)?;
        let payload: Value = response
            .json()
            .map_err(|err| HarvestError::FigshareHttp(err.to_string()))?;
        let articles = payload.as_array().ok_or_else(|| {
            HarvestError::FigshareHttp("expected a top-level article array".to_string())
        })?;

        let mut records = Vec::new();
        for article in articles {
            let Some(mut record) = parse_record(article) else {
                continue;
            };
            match self.article_files(&record.id) {
                Ok(files) => record.files = files,
                // one article's file listing must not fail the page
                Err(err) => warn!(
                    article = %record.id,
                    error = %err,
                    "file listing failed, keeping record with empty file list"
                ),
            }
            records.push(record);
        }
        let has_more = articles.len() as u64 == page_size;
        Ok(Page { records, has_more })
    }
}

fn map_failure(failure: HttpFailure) -> HarvestError {
    match failure {
        HttpFailure::Transport(message) => HarvestError::FigshareHttp(message),
        HttpFailure::Status { status, message } => HarvestError::FigshareStatus { status, message },
    }
}

fn parse_record(article: &Value) -> Option<Record> {
    let object = article.as_object()?;
    let id = match object.get("id")? {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    let title = object
        .get("title")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let doi_url = object
        .get("doi")
        .and_then(Value::as_str)
        .filter(|doi| !doi.is_empty())
        .map(|doi| format!("https://doi.org/{doi}"))
        .or_else(|| {
            object
                .get("url_public_html")
                .and_then(Value::as_str)
                .map(ToString::to_string)
        });
    Some(Record {
        id,
        doi_url,
        title,
        files: Vec::new(),
        sum_size: 0,
        query_key: None,
        platform: SourcePlatform::Figshare,
        metadata: object.clone(),
    })
}

fn parse_file(value: &Value) -> Option<FileEntry> {
    let name = value.get("name").and_then(Value::as_str)?.to_string();
    let size = value.get("size").and_then(Value::as_u64).unwrap_or(0);
    let download_url = value
        .get("download_url")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let checksum = value
        .get("supplied_md5")
        .and_then(Value::as_str)
        .filter(|md5| !md5.is_empty())
        .or_else(|| value.get("computed_md5").and_then(Value::as_str))
        .map(ToString::to_string);
    Some(FileEntry {
        name,
        size,
        download_url,
        checksum,
    })
}
