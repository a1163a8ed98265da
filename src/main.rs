use clap::{Parser, ValueEnum};
use log::info;
use ro_asset_scraper::config::{CatalogConfig, Config};
use ro_asset_scraper::crawler::{CrawlSettings, Crawler};
use ro_asset_scraper::export::{write_csv, write_json, CsvRow};
use ro_asset_scraper::http_client::Fetcher;
use ro_asset_scraper::models::ArtifactLayout;
use ro_asset_scraper::sources::{Catalog, ItemDb, MobDb};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ro_asset_scraper", version, about)]
struct Cli {
    /// Which listing to crawl.
    #[arg(value_enum, default_value_t = CatalogChoice::Monsters)]
    catalog: CatalogChoice,

    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory for downloaded images and silhouettes.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Pause between listing pages, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Stop after this many pages.
    #[arg(long)]
    max_pages: Option<u32>,

    /// Records of one page processed at the same time.
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CatalogChoice {
    Monsters,
    Items,
}

impl Cli {
    fn apply(&self, cfg: &mut Config) {
        let catalog = match self.catalog {
            CatalogChoice::Monsters => &mut cfg.monsters,
            CatalogChoice::Items => &mut cfg.items,
        };
        if let Some(dir) = &self.output_dir {
            catalog.output_dir = dir.clone();
        }
        if let Some(delay_ms) = self.delay_ms {
            catalog.delay_ms = delay_ms;
        }
        if self.max_pages.is_some() {
            catalog.max_pages = self.max_pages;
        }
        if let Some(concurrency) = self.concurrency {
            cfg.concurrency = concurrency.max(1);
        }
    }
}

fn init_logging() {
    if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::debug!("log4rs.yml not loaded ({}), using env_logger", e);
    }
}

async fn crawl<F, C>(
    fetcher: &F,
    cfg: &Config,
    catalog_cfg: &CatalogConfig,
    catalog: C,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Fetcher + ?Sized,
    C: Catalog,
    C::Record: CsvRow,
{
    let settings = CrawlSettings::new(cfg, catalog_cfg);
    let report = Crawler::new(fetcher, settings).run(&catalog).await;

    write_csv(&catalog_cfg.csv_file, &report.records, &catalog_cfg.name_delimiter)?;
    write_json(&catalog_cfg.json_file, &report.records)?;
    info!(
        "{} {} saved after {} pages ({:?})",
        report.records.len(),
        catalog.name(),
        report.pages_fetched,
        report.termination
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    let mut cfg = Config::load(&cli.config);
    cli.apply(&mut cfg);

    let client = cfg.http.create_http_client()?;
    info!("HTTP client initialized:");
    info!("  Max retries: {}", cfg.http.max_retries);
    info!("  Timeout: {}s", cfg.http.timeout_secs);
    info!("  Concurrency: {}", cfg.concurrency);

    match cli.catalog {
        CatalogChoice::Monsters => {
            let catalog_cfg = cfg.monsters.clone();
            let catalog = MobDb::new(
                ArtifactLayout::new(&catalog_cfg.output_dir),
                catalog_cfg.name_delimiter.clone(),
            );
            crawl(&client, &cfg, &catalog_cfg, catalog).await
        }
        CatalogChoice::Items => {
            let catalog_cfg = cfg.items.clone();
            let catalog = ItemDb::new(ArtifactLayout::new(&catalog_cfg.output_dir));
            crawl(&client, &cfg, &catalog_cfg, catalog).await
        }
    }
}
