use crate::aggregate::Aggregator;
use crate::config::CrawlConfig;
use crate::export::{ExportFormat, ReportDataset};
use crate::fetch::{FetchError, FetchedDocument, Fetcher, HttpFetcher};
use crate::limiter::RequestLimiter;
use crate::model::{CompletedRecord, CrawlReport, FollowRequest, ListingContext, PeriodContext};
use crate::parser::{PageSelectors, parse_detail, parse_index, parse_listing};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    pub config: CrawlConfig,
    pub out_path: Option<PathBuf>,
    pub format: Option<ExportFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Index,
    Listing,
    Detail,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Index => "index",
            Stage::Listing => "listing",
            Stage::Detail => "detail",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub requests: Vec<FollowRequest<ListingContext>>,
    pub rows: usize,
    pub unlinked: usize,
}

enum StageOutcome {
    Index(Vec<FollowRequest<PeriodContext>>),
    Listing(ListingPage),
    Detail,
    Failed {
        stage: Stage,
        url: Url,
        error: FetchError,
    },
}

pub fn index_stage(
    selectors: &PageSelectors,
    doc: &FetchedDocument,
) -> Vec<FollowRequest<PeriodContext>> {
    let requests: Vec<_> = parse_index(selectors, &doc.body)
        .into_iter()
        .filter_map(|link| match doc.source_url.join(&link.href) {
            Ok(url) => Some(FollowRequest::new(url, PeriodContext::new(link.label))),
            Err(err) => {
                warn!(page = %doc.source_url, href = %link.href, error = %err, "unresolvable listing link; skipping");
                None
            }
        })
        .collect();

    info!(url = %doc.source_url, listings = requests.len(), "archive index parsed");
    requests
}

pub fn listing_stage(
    selectors: &PageSelectors,
    doc: &FetchedDocument,
    context: &PeriodContext,
) -> ListingPage {
    let rows = parse_listing(selectors, &doc.body);
    let mut page = ListingPage {
        requests: Vec::with_capacity(rows.len()),
        rows: rows.len(),
        unlinked: 0,
    };

    for row in rows {
        if !row.has_link() {
            warn!(
                page = %doc.source_url,
                period = %context.period_label,
                city = %row.city,
                "listing row has no report link; skipping"
            );
            page.unlinked += 1;
            continue;
        }
        let url = match doc.source_url.join(&row.detail_link) {
            Ok(url) => url,
            Err(err) => {
                warn!(page = %doc.source_url, href = %row.detail_link, error = %err, "unresolvable report link; skipping");
                page.unlinked += 1;
                continue;
            }
        };
        page.requests.push(FollowRequest::new(url, context.merge_row(row)));
    }

    debug!(
        url = %doc.source_url,
        period = %context.period_label,
        rows = page.rows,
        follows = page.requests.len(),
        "listing page parsed"
    );
    page
}

pub fn detail_stage(
    selectors: &PageSelectors,
    doc: &FetchedDocument,
    context: ListingContext,
) -> CompletedRecord {
    let free_text = parse_detail(selectors, &doc.body);
    debug!(url = %doc.source_url, chars = free_text.len(), "report page parsed");
    context.complete(free_text)
}

/// The index -> listing -> detail crawl. Each fetch runs as its own task and
/// carries the context of the page that discovered it; only the aggregator
/// is shared between tasks. A URL is requested at most once per run.
pub struct Pipeline<F> {
    fetcher: Arc<F>,
    limiter: Arc<RequestLimiter>,
    selectors: Arc<PageSelectors>,
    aggregator: Arc<Aggregator>,
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(
        fetcher: F,
        limiter: RequestLimiter,
        selectors: PageSelectors,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            limiter: Arc::new(limiter),
            selectors: Arc::new(selectors),
            aggregator,
        }
    }

    pub fn from_config(
        fetcher: F,
        config: &CrawlConfig,
        aggregator: Arc<Aggregator>,
    ) -> Result<Self> {
        let selectors = PageSelectors::from_config(&config.selectors, &config.columns)?;
        let limiter = RequestLimiter::new(
            config.fetch.max_concurrent_requests,
            config.fetch.max_requests_per_domain,
        );
        Ok(Self::new(fetcher, limiter, selectors, aggregator))
    }

    /// Crawls from `root` until every discovered page has been fetched or has
    /// failed. Completed records land in the aggregator.
    pub async fn run(&self, root: Url) -> CrawlReport {
        let mut report = CrawlReport::default();
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();

        first_request(&mut seen, &root);
        self.spawn_stage(
            &mut tasks,
            Stage::Index,
            FollowRequest::new(root, ()),
            |selectors, doc, ()| StageOutcome::Index(index_stage(selectors, doc)),
        );

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, "crawl task aborted");
                    report.task_failures += 1;
                    continue;
                }
            };

            match outcome {
                StageOutcome::Index(requests) => {
                    report.index_pages += 1;
                    for request in requests {
                        if !admit(&mut seen, &mut report, Stage::Listing, &request.url) {
                            continue;
                        }
                        self.spawn_stage(
                            &mut tasks,
                            Stage::Listing,
                            request,
                            |selectors, doc, period| {
                                StageOutcome::Listing(listing_stage(selectors, doc, &period))
                            },
                        );
                    }
                }
                StageOutcome::Listing(page) => {
                    report.listing_pages += 1;
                    report.listing_rows += page.rows;
                    report.unlinked_rows += page.unlinked;
                    for request in page.requests {
                        if !admit(&mut seen, &mut report, Stage::Detail, &request.url) {
                            continue;
                        }
                        let aggregator = Arc::clone(&self.aggregator);
                        self.spawn_stage(
                            &mut tasks,
                            Stage::Detail,
                            request,
                            move |selectors, doc, listing| {
                                aggregator.push(detail_stage(selectors, doc, listing));
                                StageOutcome::Detail
                            },
                        );
                    }
                }
                StageOutcome::Detail => report.detail_pages += 1,
                StageOutcome::Failed { stage, url, error } => {
                    report.fetch_failures += 1;
                    warn!(stage = stage.as_str(), %url, error = %error, "fetch failed; dropping branch");
                }
            }
        }

        info!(
            listing_pages = report.listing_pages,
            rows = report.listing_rows,
            detail_pages = report.detail_pages,
            duplicates = report.duplicate_requests,
            failures = report.fetch_failures,
            "crawl drained"
        );
        report
    }

    fn spawn_stage<C, H>(
        &self,
        tasks: &mut JoinSet<StageOutcome>,
        stage: Stage,
        request: FollowRequest<C>,
        handle: H,
    ) where
        C: Send + 'static,
        H: FnOnce(&PageSelectors, &FetchedDocument, C) -> StageOutcome + Send + 'static,
    {
        let fetcher = Arc::clone(&self.fetcher);
        let limiter = Arc::clone(&self.limiter);
        let selectors = Arc::clone(&self.selectors);

        tasks.spawn(async move {
            let FollowRequest { url, context } = request;
            match fetch_page(fetcher.as_ref(), limiter.as_ref(), &url).await {
                Ok(doc) => handle(selectors.as_ref(), &doc, context),
                Err(error) => StageOutcome::Failed { stage, url, error },
            }
        });
    }
}

/// Marks `url` as requested and reports whether this is its first request.
/// URLs differing only in their fragment name the same page.
fn first_request(seen: &mut HashSet<Url>, url: &Url) -> bool {
    let mut key = url.clone();
    key.set_fragment(None);
    seen.insert(key)
}

fn admit(seen: &mut HashSet<Url>, report: &mut CrawlReport, stage: Stage, url: &Url) -> bool {
    if first_request(seen, url) {
        return true;
    }
    report.duplicate_requests += 1;
    debug!(stage = stage.as_str(), %url, "already requested; skipping");
    false
}

async fn fetch_page<F: Fetcher>(
    fetcher: &F,
    limiter: &RequestLimiter,
    url: &Url,
) -> Result<FetchedDocument, FetchError> {
    let _permit = limiter.acquire(url).await?;
    fetcher.fetch(url).await
}

pub async fn run_crawl(options: &CrawlOptions) -> Result<CrawlReport> {
    options.config.validate()?;
    let fetcher = HttpFetcher::from_config(&options.config.fetch)?;
    crawl_and_export(fetcher, options).await
}

pub async fn crawl_and_export<F: Fetcher>(
    fetcher: F,
    options: &CrawlOptions,
) -> Result<CrawlReport> {
    let config = &options.config;
    let root = config.root_url()?;
    let aggregator = Arc::new(Aggregator::new());
    let pipeline = Pipeline::from_config(fetcher, config, Arc::clone(&aggregator))?;

    info!(root = %root, "crawl start");
    let mut report = pipeline.run(root).await;

    let records = aggregator.drain();
    report.records = records.len();
    let dataset = ReportDataset::from_records(records, &config.archive.link_base);
    let out_path = options
        .out_path
        .clone()
        .unwrap_or_else(|| config.output.path.clone());
    let format = options.format.unwrap_or(config.output.format);
    dataset
        .write(&out_path, format)
        .with_context(|| format!("export failed for {}", out_path.display()))?;

    report.exported_rows = dataset.len();
    report.output = Some(out_path);
    Ok(report)
}
