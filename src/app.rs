use tracing::info;

use crate::config::ResolvedConfig;
use crate::domain::SourcePlatform;
use crate::download::FileDownloader;
use crate::error::HarvestError;
use crate::extent::ExtentExtractor;
use crate::harvest::{HarvestReport, Harvester};
use crate::map::{self, MapSummary};
use crate::normalize::{key_map, normalize};
use crate::repository::RepositoryClient;
use crate::sampler::{ExtentPipeline, RunReport};
use crate::store::{CheckpointStore, Store};

pub struct App<Z, F, V, D, E>
where
    Z: RepositoryClient,
    F: RepositoryClient,
    V: RepositoryClient,
    D: FileDownloader,
    E: ExtentExtractor,
{
    store: Store,
    config: ResolvedConfig,
    zenodo: Z,
    figshare: F,
    dataverse: V,
    downloader: D,
    extractor: E,
}

impl<Z, F, V, D, E> App<Z, F, V, D, E>
where
    Z: RepositoryClient,
    F: RepositoryClient,
    V: RepositoryClient,
    D: FileDownloader,
    E: ExtentExtractor,
{
    pub fn new(
        store: Store,
        config: ResolvedConfig,
        zenodo: Z,
        figshare: F,
        dataverse: V,
        downloader: D,
        extractor: E,
    ) -> Self {
        Self {
            store,
            config,
            zenodo,
            figshare,
            dataverse,
            downloader,
            extractor,
        }
    }

    fn client_for(&self, platform: SourcePlatform) -> &dyn RepositoryClient {
        match platform {
            SourcePlatform::Zenodo => &self.zenodo,
            SourcePlatform::Figshare => &self.figshare,
            SourcePlatform::Dataverse => &self.dataverse,
        }
    }

    pub fn harvest(&self, platform: SourcePlatform) -> Result<HarvestReport, HarvestError> {
        self.store.ensure_dirs()?;
        let harvester = Harvester::new(self.client_for(platform), &self.config);
        let (records, report) = harvester.run()?;

        let mapping = key_map(platform);
        let harvested_at = chrono::Utc::now().to_rfc3339();
        let normalized: Vec<_> = records
            .into_iter()
            .map(|mut record| {
                record.metadata = normalize(&record.metadata, &mapping);
                record.metadata.insert(
                    "harvested_at".to_string(),
                    serde_json::Value::String(harvested_at.clone()),
                );
                record
            })
            .collect();
        self.store.save_records(platform, &normalized)?;
        info!(
            platform = %platform,
            selected = report.selected,
            path = %self.store.records_path(platform),
            "harvest complete"
        );
        Ok(report)
    }

    pub fn extract(&self, platform: SourcePlatform) -> Result<RunReport, HarvestError> {
        self.store.ensure_dirs()?;
        let records = self.store.load_records(platform)?;
        let mut checkpoint = CheckpointStore::load(self.store.checkpoint_path(platform))?;
        let pipeline = ExtentPipeline::new(
            &self.downloader,
            &self.extractor,
            &self.config,
            self.store.scratch_root().to_owned(),
        );
        let report = pipeline.run(&records, &mut checkpoint, &self.store.results_path())?;
        info!(
            platform = %platform,
            processed = report.processed,
            skipped = report.skipped,
            rows = report.rows_written,
            "extraction complete"
        );
        Ok(report)
    }

    pub fn render_map(&self) -> Result<MapSummary, HarvestError> {
        self.store.ensure_dirs()?;
        map::render_map(&self.store.results_path(), &self.store.map_path())
    }
}
