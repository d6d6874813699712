use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{FileEntry, Record};
use crate::download::FileDownloader;
use crate::error::HarvestError;
use crate::extent::ExtentExtractor;
use crate::filter::has_geospatial_extension;
use crate::geometry::Geometry;
use crate::store::{CheckpointStore, ResultRow, append_results};

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub processed: usize,
    pub skipped: usize,
    pub rows_written: usize,
    pub bytes_downloaded: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SampleOutcome {
    pub rows: Vec<ResultRow>,
    pub downloaded_bytes: u64,
}

pub struct ExtentPipeline<'a, D: FileDownloader, E: ExtentExtractor> {
    downloader: &'a D,
    extractor: &'a E,
    config: &'a ResolvedConfig,
    scratch_dir: Utf8PathBuf,
}

impl<'a, D: FileDownloader, E: ExtentExtractor> ExtentPipeline<'a, D, E> {
    pub fn new(
        downloader: &'a D,
        extractor: &'a E,
        config: &'a ResolvedConfig,
        scratch_dir: Utf8PathBuf,
    ) -> Self {
        Self {
            downloader,
            extractor,
            config,
            scratch_dir,
        }
    }

    pub fn run(
        &self,
        records: &[Record],
        checkpoint: &mut CheckpointStore,
        results_path: &Utf8Path,
    ) -> Result<RunReport, HarvestError> {
        let total_bytes: u64 = records.iter().map(|record| record.sum_size).sum();
        let total_gib = total_bytes as f64 / (1u64 << 30) as f64;
        info!(
            records = records.len(),
            already_processed = checkpoint.len(),
            total_gib,
            "starting extraction run"
        );

        let mut report = RunReport::default();
        let mut rng = rand::thread_rng();
        for (position, record) in records.iter().enumerate() {
            let index = position as u64 + 1;
            if checkpoint.contains(index) {
                debug!(index, "record already processed, skipping");
                report.skipped += 1;
                continue;
            }
            let outcome = self.sample_record(index, record, &mut rng)?;
            append_results(results_path, &outcome.rows)?;
            checkpoint.mark_processed(index)?;
            info!(
                index,
                rows = outcome.rows.len(),
                bytes = outcome.downloaded_bytes,
                "record finished"
            );
            report.processed += 1;
            report.rows_written += outcome.rows.len();
            report.bytes_downloaded += outcome.downloaded_bytes;
        }
        Ok(report)
    }

    pub fn sample_record<R: Rng>(
        &self,
        index: u64,
        record: &Record,
        rng: &mut R,
    ) -> Result<SampleOutcome, HarvestError> {
        let mut files = record.files.clone();
        files.shuffle(rng);
        self.process_files(index, record, files)
    }

    /// Walks files in the given order until 10% of the record's total size
    /// has been fetched or five consecutive files fail extraction. Entries
    /// that would push past the target are skipped, never partially
    /// downloaded, so the achieved size can undershoot the target.
    pub fn process_files(
        &self,
        index: u64,
        record: &Record,
        files: Vec<FileEntry>,
    ) -> Result<SampleOutcome, HarvestError> {
        let target_bytes = record.sum_size as f64 * self.config.sample_fraction;
        let doi_url = record
            .doi_url
            .clone()
            .unwrap_or_else(|| "N/A".to_string());

        let mut outcome = SampleOutcome::default();
        let mut cumulative: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        for file in files {
            if cumulative as f64 >= target_bytes
                || consecutive_failures >= self.config.max_consecutive_failures
            {
                break;
            }
            if !has_geospatial_extension(&file.name, &self.config.formats) {
                continue;
            }
            let Some(url) = file.download_url.as_deref() else {
                warn!(index, file = %file.name, "no download url, skipping file");
                continue;
            };
            if (cumulative + file.size) as f64 > target_bytes {
                debug!(index, file = %file.name, size = file.size, "file would exceed size target, skipping");
                continue;
            }

            let local_name = numbered_file_name(index, &file.name);
            let local_path = self.scratch_dir.join(&local_name);
            match self.downloader.download(url, local_path.as_std_path()) {
                Ok(written) => debug!(index, file = %local_name, bytes = written, "downloaded"),
                Err(err) => {
                    warn!(index, file = %file.name, error = %err, "download failed, skipping file");
                    continue;
                }
            }

            let extraction = match self.extractor.extract(local_path.as_std_path(), true, true) {
                Ok(extraction) => extraction,
                Err(err) => {
                    warn!(index, file = %local_name, error = %err, "extent extraction failed");
                    consecutive_failures += 1;
                    remove_file(&local_path)?;
                    continue;
                }
            };

            let Some(bbox) = extraction.bbox else {
                warn!(index, file = %local_name, "no bounding box produced");
                consecutive_failures += 1;
                remove_file(&local_path)?;
                continue;
            };

            let geometry = match Geometry::from_wkt(&bbox.to_wkt()) {
                Ok(geometry) => geometry,
                Err(err) => {
                    warn!(index, file = %local_name, error = %err, "bbox transform failed");
                    consecutive_failures += 1;
                    remove_file(&local_path)?;
                    continue;
                }
            };

            consecutive_failures = 0;
            cumulative += file.size;
            outcome.rows.push(ResultRow {
                filename: local_name,
                bbox: serde_json::to_string(&bbox.as_array()).unwrap_or_default(),
                geometry: geometry.to_wkt(),
                doi_url: doi_url.clone(),
            });
            remove_file(&local_path)?;
        }

        outcome.downloaded_bytes = cumulative;
        Ok(outcome)
    }
}

pub fn numbered_file_name(index: u64, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|ch| {
            if ch == ':' || ch == '/' || ch == '\\' {
                '_'
            } else {
                ch
            }
        })
        .collect();
    format!("{index}_{safe}")
}

fn remove_file(path: &Utf8Path) -> Result<(), HarvestError> {
    fs::remove_file(path.as_std_path()).map_err(|err| HarvestError::Filesystem(err.to_string()))
}
