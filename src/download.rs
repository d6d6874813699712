use std::fs::File;
use std::path::Path;

use reqwest::blocking::Client;

use crate::config::ResolvedConfig;
use crate::error::HarvestError;
use crate::http_util::{self, HttpFailure, RetryPolicy};

pub trait FileDownloader: Send + Sync {
    /// Fetches `url` into `destination`, returning the number of bytes
    /// written. Non-success statuses are errors, never empty files.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, HarvestError>;
}

#[derive(Clone)]
pub struct HttpFileDownloader {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFileDownloader {
    pub fn new(config: &ResolvedConfig) -> Result<Self, HarvestError> {
        let client = http_util::build_client(config.request_timeout)
            .map_err(|err| HarvestError::DownloadHttp(err.to_string()))?;
        Ok(Self {
            client,
            retry: config.retry,
        })
    }
}

impl FileDownloader for HttpFileDownloader {
    fn download(&self, url: &str, destination: &Path) -> Result<u64, HarvestError> {
        let mut response = http_util::send_with_retries(&self.retry, || self.client.get(url))
            .map_err(|failure| match failure {
                HttpFailure::Transport(message) => HarvestError::DownloadHttp(message),
                HttpFailure::Status { status, message } => {
                    HarvestError::DownloadStatus { status, message }
                }
            })?;
        let mut file =
            File::create(destination).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let written = std::io::copy(&mut response, &mut file)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Ok(written)
    }
}
