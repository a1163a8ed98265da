use crate::artifact_cache::{ArtifactCache, ArtifactOutcome};
use crate::config::{CatalogConfig, Config};
use crate::http_client::Fetcher;
use crate::models::{ArtifactPaths, ArtifactPlan};
use crate::silhouette::{ensure_silhouette, SilhouetteOutcome};
use crate::sources::Catalog;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub base_url: String,
    pub catalog: CatalogConfig,
    /// Records of one page processed concurrently
    pub concurrency: usize,
}

impl CrawlSettings {
    pub fn new(config: &Config, catalog: &CatalogConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            catalog: catalog.clone(),
            concurrency: config.concurrency,
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        self.catalog.page_url(&self.base_url, page)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.catalog.delay_ms)
    }
}

/// Why a crawl stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// `page` had no records: the natural end of the listing
    Exhausted { page: u32 },
    /// `page` could not be fetched; everything before it was kept
    FetchFailed { page: u32, reason: String },
    /// Stopped after the configured `max_pages`
    PageLimit { page: u32 },
    /// Pagination disabled for this catalog
    SinglePage,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArtifactTally {
    pub fetched: usize,
    pub cached: usize,
    pub failed: usize,
    /// Records without an image URL
    pub missing_url: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SilhouetteTally {
    pub created: usize,
    pub cached: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct CrawlReport<R> {
    pub records: Vec<R>,
    pub pages_fetched: u32,
    /// Inter-page delays actually slept
    pub pauses: u32,
    pub termination: Termination,
    pub artifacts: ArtifactTally,
    pub silhouettes: SilhouetteTally,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<R> CrawlReport<R> {
    /// True when the listing ended normally and every record has all its artifacts
    pub fn is_complete(&self) -> bool {
        !matches!(self.termination, Termination::FetchFailed { .. })
            && self.artifacts.failed == 0
            && self.silhouettes.skipped == 0
    }
}

#[derive(Debug, Default)]
struct RecordOutcome {
    artifact: Option<ArtifactOutcome>,
    silhouette: Option<SilhouetteOutcome>,
}

enum CrawlState<E> {
    Fetching(u32),
    Extracting { page: u32, url: String, html: String },
    Accumulating { page: u32, entries: Vec<E> },
    Done(Termination),
}

/// Pagination driver: fetch, extract, materialize artifacts, accumulate.
pub struct Crawler<'a, F: Fetcher + ?Sized> {
    fetcher: &'a F,
    settings: CrawlSettings,
}

impl<'a, F: Fetcher + ?Sized> Crawler<'a, F> {
    pub fn new(fetcher: &'a F, settings: CrawlSettings) -> Self {
        Self { fetcher, settings }
    }

    pub async fn run<C: Catalog>(&self, catalog: &C) -> CrawlReport<C::Record> {
        let started_at = Utc::now();
        let mut records = Vec::new();
        let mut pages_fetched = 0u32;
        let mut pauses = 0u32;
        let mut artifacts = ArtifactTally::default();
        let mut silhouettes = SilhouetteTally::default();

        let mut state: CrawlState<C::Entry> = CrawlState::Fetching(1);
        let termination = loop {
            state = match state {
                CrawlState::Fetching(page) => {
                    let url = self.settings.page_url(page);
                    info!("Fetching {} page {} -> {}", catalog.name(), page, url);
                    match self.fetcher.fetch_text(&url).await {
                        Ok(html) => {
                            pages_fetched += 1;
                            CrawlState::Extracting { page, url, html }
                        }
                        Err(e) => {
                            error!("Error loading {} page {}: {}", catalog.name(), page, e);
                            CrawlState::Done(Termination::FetchFailed { page, reason: e.to_string() })
                        }
                    }
                }
                CrawlState::Extracting { page, url, html } => {
                    let entries = catalog.extract_html(&html, &url);
                    info!("Found {} {} on page {}", entries.len(), catalog.name(), page);
                    if entries.is_empty() {
                        CrawlState::Done(Termination::Exhausted { page })
                    } else {
                        CrawlState::Accumulating { page, entries }
                    }
                }
                CrawlState::Accumulating { page, entries } => {
                    for (record, outcome) in self.process_page(catalog, entries).await {
                        tally(&mut artifacts, &mut silhouettes, outcome);
                        records.push(record);
                    }

                    if !self.settings.catalog.paginate {
                        CrawlState::Done(Termination::SinglePage)
                    } else if self.settings.catalog.max_pages.is_some_and(|max| page >= max) {
                        CrawlState::Done(Termination::PageLimit { page })
                    } else {
                        sleep(self.settings.delay()).await;
                        pauses += 1;
                        CrawlState::Fetching(page + 1)
                    }
                }
                CrawlState::Done(termination) => break termination,
            };
        };

        let report = CrawlReport {
            records,
            pages_fetched,
            pauses,
            termination,
            artifacts,
            silhouettes,
            started_at,
            finished_at: Utc::now(),
        };
        log_summary(catalog.name(), &report);
        report
    }

    /// Records come back in extraction order regardless of which finishes first.
    async fn process_page<C: Catalog>(
        &self,
        catalog: &C,
        entries: Vec<C::Entry>,
    ) -> Vec<(C::Record, RecordOutcome)> {
        let cache = ArtifactCache::new(self.fetcher);
        let cache = &cache;
        stream::iter(entries)
            .map(|entry| async move {
                let (paths, outcome) = materialize(cache, catalog.plan(&entry)).await;
                (catalog.finish(entry, paths), outcome)
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await
    }
}

/// Download the image, then derive the silhouette from the cached file.
async fn materialize<F: Fetcher + ?Sized>(
    cache: &ArtifactCache<'_, F>,
    plan: ArtifactPlan,
) -> (ArtifactPaths, RecordOutcome) {
    let Some(url) = plan.image_url else {
        return (ArtifactPaths::default(), RecordOutcome::default());
    };

    let artifact = cache.ensure(&url, &plan.image_path).await;
    if !artifact.is_available() {
        let outcome = RecordOutcome { artifact: Some(artifact), silhouette: None };
        return (ArtifactPaths::default(), outcome);
    }

    let mut paths = ArtifactPaths { image: Some(plan.image_path.clone()), silhouette: None };
    let silhouette = match plan.silhouette_path {
        Some(output) => {
            let outcome = derive_silhouette(plan.image_path, output.clone()).await;
            if matches!(outcome, SilhouetteOutcome::Created | SilhouetteOutcome::AlreadyPresent) {
                paths.silhouette = Some(output);
            }
            Some(outcome)
        }
        None => None,
    };

    (paths, RecordOutcome { artifact: Some(artifact), silhouette })
}

async fn derive_silhouette(input: PathBuf, output: PathBuf) -> SilhouetteOutcome {
    match tokio::task::spawn_blocking(move || ensure_silhouette(&input, &output)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Silhouette task failed: {}", e);
            SilhouetteOutcome::Skipped(e.to_string())
        }
    }
}

fn tally(artifacts: &mut ArtifactTally, silhouettes: &mut SilhouetteTally, outcome: RecordOutcome) {
    match outcome.artifact {
        Some(ArtifactOutcome::Fetched) => artifacts.fetched += 1,
        Some(ArtifactOutcome::AlreadyPresent) => artifacts.cached += 1,
        Some(ArtifactOutcome::Failed(_)) => artifacts.failed += 1,
        None => artifacts.missing_url += 1,
    }
    match outcome.silhouette {
        Some(SilhouetteOutcome::Created) => silhouettes.created += 1,
        Some(SilhouetteOutcome::AlreadyPresent) => silhouettes.cached += 1,
        Some(SilhouetteOutcome::Skipped(_)) => silhouettes.skipped += 1,
        None => {}
    }
}

fn log_summary<R>(name: &str, report: &CrawlReport<R>) {
    match &report.termination {
        Termination::Exhausted { page } => {
            info!("Done! No more {} found after page {}.", name, page)
        }
        Termination::FetchFailed { page, reason } => warn!(
            "Stopped {} crawl early: page {} could not be fetched ({}); results may be incomplete",
            name, page, reason
        ),
        Termination::PageLimit { page } => info!("Stopped {} crawl at page limit {}", name, page),
        Termination::SinglePage => info!("Read single {} page", name),
    }

    let elapsed = report.finished_at - report.started_at;
    info!(
        "Finished scraping {} {} in {}s: images {} fetched / {} cached / {} failed, silhouettes {} created / {} cached / {} skipped",
        report.records.len(),
        name,
        elapsed.num_seconds(),
        report.artifacts.fetched,
        report.artifacts.cached,
        report.artifacts.failed,
        report.silhouettes.created,
        report.silhouettes.cached,
        report.silhouettes.skipped,
    );
    if !report.is_complete() {
        warn!("{} crawl finished with missing data", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(termination: Termination) -> CrawlReport<()> {
        CrawlReport {
            records: Vec::new(),
            pages_fetched: 0,
            pauses: 0,
            termination,
            artifacts: ArtifactTally::default(),
            silhouettes: SilhouetteTally::default(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_fetch_failure_is_incomplete() {
        assert!(report(Termination::Exhausted { page: 4 }).is_complete());
        assert!(!report(Termination::FetchFailed { page: 2, reason: "timeout".into() }).is_complete());

        let mut partial = report(Termination::SinglePage);
        partial.artifacts.failed = 1;
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_tally() {
        let mut artifacts = ArtifactTally::default();
        let mut silhouettes = SilhouetteTally::default();
        tally(
            &mut artifacts,
            &mut silhouettes,
            RecordOutcome {
                artifact: Some(ArtifactOutcome::Fetched),
                silhouette: Some(SilhouetteOutcome::Skipped("no frames".into())),
            },
        );
        tally(&mut artifacts, &mut silhouettes, RecordOutcome::default());
        assert_eq!(artifacts.fetched, 1);
        assert_eq!(artifacts.missing_url, 1);
        assert_eq!(silhouettes.skipped, 1);
    }

    #[test]
    fn test_settings_page_url() {
        let config = Config::default();
        let settings = CrawlSettings::new(&config, &config.monsters);
        assert!(settings.page_url(1).starts_with("https://ratemyserver.net/index.php?page=mob_db"));
        assert!(settings.page_url(2).ends_with("&page_num=2"));
        assert_eq!(settings.delay(), Duration::from_millis(1000));
    }
}
