use std::time::Instant;

use indicatif::ProgressBar;
use reqwest::Url;
use scraper::ElementRef;
use tracing::{debug, info, warn};

use crate::db::Store;
use crate::error::{CrawlError, Malformed};
use crate::fetcher::{listing_url, FilterCombination, PageSource};
use crate::parser::{extract, pagination, ListingPage, PageCeiling};
use crate::settings::CrawlSettings;

/// What happened to one listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    /// IMO already stored; the first observation is kept.
    Duplicate,
    Malformed(Malformed),
    PersistFailed(String),
}

/// Per-combination tally.
#[derive(Debug, Clone)]
pub struct CombinationReport {
    pub combo: FilterCombination,
    /// `None` when page 1 had no results table.
    pub ceiling: Option<PageCeiling>,
    pub pages_fetched: u32,
    pub inserted: usize,
    pub duplicates: usize,
    pub malformed: usize,
    pub persist_failed: usize,
}

impl CombinationReport {
    fn new(combo: FilterCombination) -> Self {
        CombinationReport {
            combo,
            ceiling: None,
            pages_fetched: 0,
            inserted: 0,
            duplicates: 0,
            malformed: 0,
            persist_failed: 0,
        }
    }

    fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Duplicate => self.duplicates += 1,
            RowOutcome::Malformed(_) => self.malformed += 1,
            RowOutcome::PersistFailed(_) => self.persist_failed += 1,
        }
    }
}

/// Whole-run totals.
#[derive(Debug, Default)]
pub struct CrawlSummary {
    pub combinations: usize,
    pub pages: u32,
    pub inserted: usize,
    pub duplicates: usize,
    pub malformed: usize,
    pub persist_failed: usize,
    pub reports: Vec<CombinationReport>,
}

impl CrawlSummary {
    fn add(&mut self, report: CombinationReport) {
        self.combinations += 1;
        self.pages += report.pages_fetched;
        self.inserted += report.inserted;
        self.duplicates += report.duplicates;
        self.malformed += report.malformed;
        self.persist_failed += report.persist_failed;
        self.reports.push(report);
    }
}

/// Sequential driver over categories × regions × pages.
pub struct Crawler<'a, S> {
    source: S,
    store: &'a Store,
    settings: &'a CrawlSettings,
    base_url: Url,
    progress: ProgressBar,
}

impl<'a, S: PageSource> Crawler<'a, S> {
    pub fn new(source: S, store: &'a Store, settings: &'a CrawlSettings) -> Result<Self, CrawlError> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| {
            CrawlError::InvalidConfig(format!("base_url {:?}: {}", settings.base_url, e))
        })?;
        Ok(Crawler {
            source,
            store,
            settings,
            base_url,
            progress: ProgressBar::hidden(),
        })
    }

    /// Reports progress over filter combinations on `pb`.
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = pb;
        self
    }

    /// Crawls every filter combination in order. The first fetch failure aborts the run.
    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        let combos = FilterCombination::all(&self.settings.categories, &self.settings.regions);
        let t0 = Instant::now();

        let pb = &self.progress;
        pb.set_length(combos.len() as u64);

        let mut summary = CrawlSummary::default();
        for combo in &combos {
            pb.set_message(combo.to_string());
            let report = match self.crawl_combination(combo).await {
                Ok(report) => report,
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            };
            summary.add(report);
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            combinations = summary.combinations,
            pages = summary.pages,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            malformed = summary.malformed,
            persist_failed = summary.persist_failed,
            elapsed_s = t0.elapsed().as_secs_f64(),
            "crawl finished"
        );
        Ok(summary)
    }

    /// Start → BoundResolving → Paging → Done for one combination.
    pub async fn crawl_combination(
        &self,
        combo: &FilterCombination,
    ) -> Result<CombinationReport, CrawlError> {
        let mut report = CombinationReport::new(combo.clone());

        let body = self.fetch(combo, 1).await?;
        report.pages_fetched += 1;

        let ceiling = {
            let page = ListingPage::parse(&body);
            let Some(rows) = page.rows() else {
                info!(category = combo.category, region = %combo.region, "no results");
                return Ok(report);
            };
            let ceiling = pagination::resolve(page.document(), self.settings.max_pages, combo);
            self.ingest(combo, 1, rows, &mut report);
            ceiling
        };
        report.ceiling = Some(ceiling);
        debug!(category = combo.category, region = %combo.region, ?ceiling, "page ceiling");

        for page_no in 2..=ceiling.limit() {
            let body = self.fetch(combo, page_no).await?;
            report.pages_fetched += 1;

            let page = ListingPage::parse(&body);
            let Some(rows) = page.rows() else {
                warn!(
                    category = combo.category,
                    region = %combo.region,
                    page = page_no,
                    "results table missing; stopping this combination"
                );
                break;
            };
            self.ingest(combo, page_no, rows, &mut report);
        }

        info!(
            category = combo.category,
            region = %combo.region,
            pages = report.pages_fetched,
            inserted = report.inserted,
            duplicates = report.duplicates,
            malformed = report.malformed,
            persist_failed = report.persist_failed,
            "combination done"
        );
        Ok(report)
    }

    async fn fetch(&self, combo: &FilterCombination, page: u32) -> Result<String, CrawlError> {
        info!(category = combo.category, region = %combo.region, page, "fetching page");
        let url = listing_url(&self.base_url, combo, page, self.settings.min_year);
        self.source.fetch(&url).await
    }

    fn ingest(
        &self,
        combo: &FilterCombination,
        page: u32,
        rows: Vec<ElementRef<'_>>,
        report: &mut CombinationReport,
    ) {
        for (index, row) in rows.into_iter().enumerate() {
            let outcome = self.ingest_row(combo, row);
            match &outcome {
                RowOutcome::Malformed(reason) => {
                    warn!(category = combo.category, region = %combo.region, page, row = index, %reason, "dropping malformed row");
                }
                RowOutcome::PersistFailed(err) => {
                    warn!(category = combo.category, region = %combo.region, page, row = index, error = %err, "failed to store row");
                }
                RowOutcome::Duplicate => {
                    debug!(page, row = index, "already stored");
                }
                RowOutcome::Inserted => {}
            }
            report.record(&outcome);
        }
    }

    fn ingest_row(&self, combo: &FilterCombination, row: ElementRef<'_>) -> RowOutcome {
        let record = match extract::extract(row, combo) {
            Ok(record) => record,
            Err(reason) => return RowOutcome::Malformed(reason),
        };
        match self.store.upsert(&record) {
            Ok(true) => RowOutcome::Inserted,
            Ok(false) => RowOutcome::Duplicate,
            Err(e) => RowOutcome::PersistFailed(e.to_string()),
        }
    }
}
