use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::config::{MAX_RETRY_AFTER, RetryPolicy, ScrapeConfig};
use super::error::Result;
use super::session::{ProfileUrls, Session, SessionProvider};
use super::types::{FetchOutcome, ListingCoverage, ListingKind, PageFetchResult};

/// Fetch one page with bounded retries. Every failure mode is folded into the
/// returned outcome; nothing escapes as an error.
pub async fn fetch_page<S: Session + ?Sized>(
    session: &S,
    url: &str,
    page: u32,
    policy: &RetryPolicy,
    label: &str,
) -> PageFetchResult {
    let attempts = policy.attempts.max(1);
    for attempt in 0..attempts {
        let last_attempt = attempt + 1 == attempts;
        let wait = match session.get(url).await {
            Ok(response) => {
                debug!(label, page, attempt, status = response.status, "fetch attempt");
                match response.status {
                    200 => return PageFetchResult::ok(page, response.body),
                    404 => return PageFetchResult::failed(page, FetchOutcome::PermanentFailure),
                    503 => policy.challenge_delay(attempt),
                    429 => response
                        .retry_after
                        .unwrap_or_else(|| policy.challenge_delay(attempt))
                        .min(MAX_RETRY_AFTER),
                    _ => policy.retry_delay,
                }
            }
            Err(err) => {
                warn!(label, page, attempt, error = %err, "fetch attempt failed");
                policy.retry_delay
            }
        };
        if !last_attempt {
            tokio::time::sleep(wait).await;
        }
    }

    PageFetchResult::failed(page, FetchOutcome::TransientFailure)
}

/// Raw pages gathered for one listing.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub kind: ListingKind,
    pub total_pages: u32,
    pub max_acceptable_failures: usize,
    /// Pages missing after both passes, ascending.
    pub failed: Vec<u32>,
    /// At least one page was retried after the cool-down.
    pub second_pass_ran: bool,
    pages: BTreeMap<u32, String>,
}

impl Acquisition {
    fn empty(kind: ListingKind) -> Self {
        Self {
            kind,
            total_pages: 0,
            max_acceptable_failures: 0,
            failed: Vec::new(),
            second_pass_ran: false,
            pages: BTreeMap::new(),
        }
    }

    pub fn fetched_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn coverage_ratio(&self) -> f64 {
        if self.total_pages == 0 {
            1.0
        } else {
            f64::from(self.fetched_pages()) / f64::from(self.total_pages)
        }
    }

    pub fn coverage(&self) -> ListingCoverage {
        ListingCoverage {
            expected_pages: self.total_pages,
            fetched_pages: self.fetched_pages(),
            ratio: self.coverage_ratio(),
        }
    }

    /// Page indices that were fetched, ascending.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    /// Bodies ordered by page index.
    pub fn bodies(&self) -> impl Iterator<Item = &str> {
        self.pages.values().map(String::as_str)
    }
}

/// Gather every listing page for `kind`: a bounded parallel pass followed by
/// a sequential retry pass over the pages that failed.
pub async fn acquire<P: SessionProvider>(
    provider: &P,
    urls: &ProfileUrls,
    kind: ListingKind,
    total_items: u64,
    config: &ScrapeConfig,
) -> Result<Acquisition> {
    let label = kind.label();
    let plan = config.plan(total_items);
    if plan.total_pages == 0 {
        debug!(label, "nothing to fetch");
        return Ok(Acquisition::empty(kind));
    }

    info!(
        label,
        total_pages = plan.total_pages,
        max_acceptable_failures = plan.max_acceptable_failures,
        workers = config.parallel_requests,
        "starting parallel fetch"
    );

    let mut acquisition = Acquisition {
        total_pages: plan.total_pages,
        max_acceptable_failures: plan.max_acceptable_failures,
        ..Acquisition::empty(kind)
    };
    let mut failed = first_pass(provider, urls, kind, plan.total_pages, config)
        .await?
        .into_iter()
        .filter_map(|result| match (result.outcome, result.body) {
            (FetchOutcome::Ok, Some(body)) => {
                acquisition.pages.insert(result.page, body);
                None
            }
            (outcome, _) => Some((result.page, outcome)),
        })
        .collect::<Vec<_>>();

    // A worker that died mid-page never reported; count its page as failed.
    for page in 1..=plan.total_pages {
        if !acquisition.pages.contains_key(&page) && !failed.iter().any(|(p, _)| *p == page) {
            failed.push((page, FetchOutcome::TransientFailure));
        }
    }
    failed.sort_by_key(|(page, _)| *page);

    let retry_cap = plan.max_acceptable_failures.saturating_mul(2);
    if !failed.is_empty() && failed.len() <= retry_cap {
        failed = second_pass(provider, urls, &mut acquisition, failed, config).await?;
    } else if !failed.is_empty() {
        warn!(
            label,
            failed = failed.len(),
            retry_cap,
            "too many failed pages, skipping retry pass"
        );
    }

    acquisition.failed = failed.into_iter().map(|(page, _)| page).collect();

    let ratio = acquisition.coverage_ratio();
    info!(
        label,
        fetched = acquisition.fetched_pages(),
        total = acquisition.total_pages,
        coverage = %format!("{:.1}%", ratio * 100.0),
        "acquisition finished"
    );
    if config.coverage_is_degraded(ratio) {
        warn!(
            label,
            missing = ?acquisition.failed,
            "coverage below acceptable threshold, statistics are a lower bound"
        );
    }

    Ok(acquisition)
}

/// Fan pages out to `parallel_requests` workers, each owning one session.
/// Results are returned in completion order.
async fn first_pass<P: SessionProvider>(
    provider: &P,
    urls: &ProfileUrls,
    kind: ListingKind,
    total_pages: u32,
    config: &ScrapeConfig,
) -> Result<Vec<PageFetchResult>> {
    let label = kind.label();
    let queue = Arc::new(Mutex::new((1..=total_pages).collect::<VecDeque<u32>>()));
    let (tx, mut rx) = mpsc::unbounded_channel::<PageFetchResult>();
    let worker_count = config.parallel_requests.clamp(1, total_pages as usize);
    let policy = config.page_retry();

    let mut workers = JoinSet::new();
    for _ in 0..worker_count {
        let session = provider.session()?;
        let queue = queue.clone();
        let tx = tx.clone();
        let urls = urls.clone();
        workers.spawn(async move {
            while let Some(page) = next_page(&queue) {
                let url = urls.listing(kind, page);
                let result = fetch_page(&session, url.as_str(), page, &policy, label).await;
                if tx.send(result).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(total_pages as usize);
    while let Some(result) = rx.recv().await {
        if result.is_ok() {
            debug!(label, page = result.page, "page fetched");
        } else {
            warn!(
                label,
                page = result.page,
                outcome = result.outcome.label(),
                "page failed, queued for retry"
            );
        }
        results.push(result);
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            warn!(label, error = %err, "fetch worker failed");
        }
    }

    Ok(results)
}

/// Retry failed pages one at a time after a cool-down. Returns the pages that
/// are still missing.
async fn second_pass<P: SessionProvider>(
    provider: &P,
    urls: &ProfileUrls,
    acquisition: &mut Acquisition,
    failed: Vec<(u32, FetchOutcome)>,
    config: &ScrapeConfig,
) -> Result<Vec<(u32, FetchOutcome)>> {
    let kind = acquisition.kind;
    let retryable = failed
        .iter()
        .filter(|(_, outcome)| *outcome != FetchOutcome::PermanentFailure)
        .count();
    info!(label = kind.label(), pages = retryable, "retrying failed pages");
    if retryable == 0 {
        return Ok(failed);
    }

    acquisition.second_pass_ran = true;
    tokio::time::sleep(config.cooldown).await;
    let session = provider.session()?;
    let policy = config.page_retry();
    let mut still_failed = Vec::new();
    let mut attempted = 0usize;

    for (page, outcome) in failed {
        if outcome == FetchOutcome::PermanentFailure {
            still_failed.push((page, outcome));
            continue;
        }
        if attempted > 0 {
            tokio::time::sleep(config.retry_gap).await;
        }
        attempted += 1;

        let url = urls.listing(kind, page);
        let result = fetch_page(&session, url.as_str(), page, &policy, "RETRY").await;
        match (result.outcome, result.body) {
            (FetchOutcome::Ok, Some(body)) => {
                info!(label = kind.label(), page, "retry succeeded");
                acquisition.pages.insert(page, body);
            }
            (outcome, _) => {
                warn!(label = kind.label(), page, "retry still failed");
                still_failed.push((page, outcome));
            }
        }
    }

    Ok(still_failed)
}

fn next_page(queue: &Mutex<VecDeque<u32>>) -> Option<u32> {
    queue.lock().ok().and_then(|mut pending| pending.pop_front())
}
