use std::path::Path;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use geoharvest::app::App;
use geoharvest::config::{ConfigLoader, ResolvedConfig};
use geoharvest::dataverse::DataverseHttpClient;
use geoharvest::domain::SourcePlatform;
use geoharvest::download::{FileDownloader, HttpFileDownloader};
use geoharvest::error::HarvestError;
use geoharvest::extent::{ExtentExtractor, Extraction, GeoextentCli};
use geoharvest::figshare::FigshareHttpClient;
use geoharvest::harvest::HarvestReport;
use geoharvest::repository::{Page, Pagination, RepositoryClient};
use geoharvest::sampler::RunReport;
use geoharvest::store::Store;
use geoharvest::zenodo::ZenodoHttpClient;

#[derive(Parser)]
#[command(name = "geoharvest")]
#[command(about = "Harvest geospatial datasets from research repositories and map their extents")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search a repository platform and persist matching records")]
    Harvest(PlatformArgs),
    #[command(about = "Download sampled files and extract their spatial extents")]
    Extract(PlatformArgs),
    #[command(about = "Render harvested extents as an HTML map")]
    Map(MapArgs),
}

#[derive(Args)]
struct PlatformArgs {
    #[arg(value_enum)]
    platform: SourcePlatform,

    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct MapArgs {
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::InvalidPlatform(_)
        | HarvestError::ConfigRead(_)
        | HarvestError::ConfigParse(_)
        | HarvestError::ConfigValue(_)
        | HarvestError::RecordsNotFound(_) => 2,
        HarvestError::ZenodoHttp(_)
        | HarvestError::ZenodoStatus { .. }
        | HarvestError::FigshareHttp(_)
        | HarvestError::FigshareStatus { .. }
        | HarvestError::DataverseHttp(_)
        | HarvestError::DataverseStatus { .. }
        | HarvestError::DownloadHttp(_)
        | HarvestError::DownloadStatus { .. }
        | HarvestError::MissingTool(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = Store::new().into_diagnostic()?;

    match cli.command {
        Commands::Harvest(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
            let zenodo = ZenodoHttpClient::new(&config).into_diagnostic()?;
            let figshare = FigshareHttpClient::new(&config).into_diagnostic()?;
            let dataverse = DataverseHttpClient::new(&config).into_diagnostic()?;
            let app = App::new(
                store,
                config,
                zenodo,
                figshare,
                dataverse,
                NopDownloader,
                NopExtractor,
            );
            let report = app.harvest(args.platform).into_diagnostic()?;
            print_harvest_summary(args.platform, &report);
            Ok(())
        }
        Commands::Extract(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
            let downloader = HttpFileDownloader::new(&config).into_diagnostic()?;
            let extractor = GeoextentCli::new().into_diagnostic()?;
            if let Some(version) = extractor.tool_version() {
                tracing::info!(version = %version, "using geoextent");
            }
            let app = nop_search_app(store, config, downloader, extractor);
            let report = app.extract(args.platform).into_diagnostic()?;
            print_extract_summary(args.platform, &report);
            Ok(())
        }
        Commands::Map(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
            let app = nop_search_app(store, config, NopDownloader, NopExtractor);
            let summary = app.render_map().into_diagnostic()?;
            println!(
                "rendered {} overlays from {} result rows to {}",
                summary.overlays, summary.rows, summary.path
            );
            Ok(())
        }
    }
}

fn nop_search_app<D: FileDownloader, E: ExtentExtractor>(
    store: Store,
    config: ResolvedConfig,
    downloader: D,
    extractor: E,
) -> App<NopRepository, NopRepository, NopRepository, D, E> {
    App::new(
        store,
        config,
        NopRepository(SourcePlatform::Zenodo),
        NopRepository(SourcePlatform::Figshare),
        NopRepository(SourcePlatform::Dataverse),
        downloader,
        extractor,
    )
}

fn print_harvest_summary(platform: SourcePlatform, report: &HarvestReport) {
    println!(
        "{platform}: collected {} records, selected {}",
        report.collected, report.selected
    );
    for (query, pages) in &report.failed_pages {
        println!("  query '{query}': pages {pages:?} failed after retry");
    }
}

fn print_extract_summary(platform: SourcePlatform, report: &RunReport) {
    println!(
        "{platform}: processed {} records ({} skipped via checkpoint), wrote {} result rows, downloaded {} bytes",
        report.processed, report.skipped, report.rows_written, report.bytes_downloaded
    );
}

struct NopRepository(SourcePlatform);

impl NopRepository {
    fn not_configured(&self) -> HarvestError {
        match self.0 {
            SourcePlatform::Zenodo => {
                HarvestError::ZenodoHttp("Zenodo client not configured".to_string())
            }
            SourcePlatform::Figshare => {
                HarvestError::FigshareHttp("Figshare client not configured".to_string())
            }
            SourcePlatform::Dataverse => {
                HarvestError::DataverseHttp("Dataverse client not configured".to_string())
            }
        }
    }
}

impl RepositoryClient for NopRepository {
    fn platform(&self) -> SourcePlatform {
        self.0
    }

    fn pagination(&self) -> Pagination {
        Pagination::Counted
    }

    fn total_pages(&self, _query: &str, _page_size: u64) -> Result<u64, HarvestError> {
        Err(self.not_configured())
    }

    fn search_page(&self, _query: &str, _page: u64, _page_size: u64) -> Result<Page, HarvestError> {
        Err(self.not_configured())
    }
}

struct NopDownloader;

impl FileDownloader for NopDownloader {
    fn download(&self, _url: &str, _destination: &Path) -> Result<u64, HarvestError> {
        Err(HarvestError::DownloadHttp(
            "downloader not configured".to_string(),
        ))
    }
}

struct NopExtractor;

impl ExtentExtractor for NopExtractor {
    fn extract(
        &self,
        _path: &Path,
        _want_bbox: bool,
        _want_tbox: bool,
    ) -> Result<Extraction, HarvestError> {
        Err(HarvestError::Extraction(
            "extractor not configured".to_string(),
        ))
    }
}
