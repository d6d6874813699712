use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::domain::Record;
use crate::error::HarvestError;
use crate::filter::filter_geospatial;
use crate::repository::{Pagination, RepositoryClient};

/// Consecutive failed pages that end an open-ended forward pass; without a
/// successful page there is no `has_more` signal to stop on.
const OPEN_ENDED_FAILURE_LIMIT: u32 = 2;

#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    pub collected: usize,
    pub selected: usize,
    pub failed_pages: BTreeMap<String, Vec<u64>>,
}

pub struct Harvester<'a> {
    client: &'a dyn RepositoryClient,
    config: &'a ResolvedConfig,
}

impl<'a> Harvester<'a> {
    pub fn new(client: &'a dyn RepositoryClient, config: &'a ResolvedConfig) -> Self {
        Self { client, config }
    }

    pub fn run(&self) -> Result<(Vec<Record>, HarvestReport), HarvestError> {
        let mut collected = Vec::new();
        let mut report = HarvestReport::default();

        for query in &self.config.queries {
            info!(query = %query, platform = %self.client.platform(), "searching");
            let still_failed = self.harvest_query(query, &mut collected);
            if !still_failed.is_empty() {
                warn!(query = %query, pages = ?still_failed, "pages failed after retry");
                report.failed_pages.insert(query.clone(), still_failed);
            }
        }

        report.collected = collected.len();
        let selected = select_records(
            collected,
            self.config.target_records,
            &mut rand::thread_rng(),
        );
        report.selected = selected.len();
        info!(
            collected = report.collected,
            selected = report.selected,
            "harvest selection complete"
        );
        Ok((selected, report))
    }

    fn harvest_query(&self, query: &str, collected: &mut Vec<Record>) -> Vec<u64> {
        let mut failed_pages = Vec::new();

        match self.client.pagination() {
            Pagination::Counted => {
                let total = match self.client.total_pages(query, self.config.page_size) {
                    // a count of 0 means the count fetch did not work, not zero matches
                    Ok(0) => {
                        warn!(query = %query, "record count unavailable, skipping query");
                        return Vec::new();
                    }
                    Ok(total) => total,
                    Err(err) => {
                        warn!(query = %query, error = %err, "record count fetch failed, skipping query");
                        return Vec::new();
                    }
                };
                for page in 1..=total {
                    match self.fetch_filtered(query, page) {
                        Ok(mut records) => {
                            info!(page, count = records.len(), "page harvested");
                            collected.append(&mut records);
                        }
                        Err(err) => {
                            warn!(page, error = %err, "page failed, will retry at end");
                            failed_pages.push(page);
                        }
                    }
                }
            }
            Pagination::OpenEnded => {
                let mut page = 1u64;
                let mut consecutive = 0u32;
                loop {
                    match self.client.search_page(query, page, self.config.page_size) {
                        Ok(result) => {
                            consecutive = 0;
                            let records =
                                filter_geospatial(result.records, &self.config.formats, query);
                            info!(page, count = records.len(), "page harvested");
                            collected.extend(records);
                            if !result.has_more {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(page, error = %err, "page failed, will retry at end");
                            failed_pages.push(page);
                            consecutive += 1;
                            if consecutive >= OPEN_ENDED_FAILURE_LIMIT {
                                break;
                            }
                        }
                    }
                    page += 1;
                }
            }
        }

        if failed_pages.is_empty() {
            return failed_pages;
        }

        info!(count = failed_pages.len(), query = %query, "retrying failed pages");
        let mut still_failed = Vec::new();
        for page in failed_pages {
            match self.fetch_filtered(query, page) {
                Ok(mut records) => {
                    info!(page, count = records.len(), "retry succeeded");
                    collected.append(&mut records);
                }
                Err(err) => {
                    warn!(page, error = %err, "retry failed, dropping page");
                    still_failed.push(page);
                }
            }
        }
        still_failed
    }

    fn fetch_filtered(&self, query: &str, page: u64) -> Result<Vec<Record>, HarvestError> {
        let result = self
            .client
            .search_page(query, page, self.config.page_size)?;
        Ok(filter_geospatial(result.records, &self.config.formats, query))
    }
}

/// Uniform sample without replacement once the target is exceeded; below the
/// target every record is kept.
pub fn select_records<R: Rng>(mut records: Vec<Record>, target: usize, rng: &mut R) -> Vec<Record> {
    if records.len() <= target {
        return records;
    }
    records.shuffle(rng);
    records.truncate(target);
    records
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::Map;

    use crate::domain::SourcePlatform;

    use super::*;

    fn record(id: u32) -> Record {
        Record {
            id: id.to_string(),
            doi_url: None,
            title: None,
            files: Vec::new(),
            sum_size: 0,
            query_key: None,
            platform: SourcePlatform::Zenodo,
            metadata: Map::new(),
        }
    }

    #[test]
    fn selection_keeps_all_below_target() {
        let records: Vec<Record> = (0..3).map(record).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let selected = select_records(records, 10, &mut rng);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn selection_truncates_to_target_without_duplicates() {
        let records: Vec<Record> = (0..100).map(record).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let selected = select_records(records, 10, &mut rng);
        assert_eq!(selected.len(), 10);
        let mut ids: Vec<&str> = selected.iter().map(|record| record.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }
}
