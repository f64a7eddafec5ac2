use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Instant;

use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::cli::{Cli, Command};
use super::config::ScrapeConfig;
use super::crawl::{Acquisition, acquire};
use super::error::{Result, StatsError};
use super::local_index::LocalIndex;
use super::parse::{parse_bookmark_listing, parse_work_listing};
use super::profile::resolve_profile;
use super::session::{BrowserSessions, ProfileUrls, SessionProvider};
use super::stats::{aggregate, quick_result};
use super::types::{AggregateResult, CoverageReport, ErrorReport, ListingKind};

/// Runs quick and full scrapes against one session provider.
pub struct Scraper<P> {
    provider: P,
    config: ScrapeConfig,
}

impl<P: SessionProvider> Scraper<P> {
    pub fn new(provider: P, config: ScrapeConfig) -> Self {
        Self {
            provider,
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Dashboard counters only; no listing page is fetched.
    pub async fn quick(&self, username: &str) -> Result<AggregateResult> {
        let urls = ProfileUrls::new(&self.config.base_url, username)?;
        let session = self.provider.session()?;
        let counters = resolve_profile(&session, &urls, &self.config).await?;
        Ok(quick_result(urls.username(), urls.dashboard().as_str(), &counters).stamped(now()))
    }

    /// Counters, then bookmarks and works listings, folded into statistics.
    pub async fn full(&self, username: &str) -> Result<AggregateResult> {
        let urls = ProfileUrls::new(&self.config.base_url, username)?;
        let counters = {
            let session = self.provider.session()?;
            resolve_profile(&session, &urls, &self.config).await?
        };

        let bookmark_pages = acquire(
            &self.provider,
            &urls,
            ListingKind::Bookmarks,
            counters.bookmarks,
            &self.config,
        )
        .await?;
        let work_pages = acquire(
            &self.provider,
            &urls,
            ListingKind::Works,
            counters.works,
            &self.config,
        )
        .await?;

        let bookmarks = bookmark_pages
            .bodies()
            .flat_map(parse_bookmark_listing)
            .collect::<Vec<_>>();
        let works = work_pages
            .bodies()
            .flat_map(parse_work_listing)
            .collect::<Vec<_>>();
        info!(
            bookmarks = bookmarks.len(),
            works = works.len(),
            "listing items parsed"
        );
        if (bookmarks.len() as u64) < counters.bookmarks {
            info!(
                scraped = bookmarks.len(),
                reported = counters.bookmarks,
                "fewer bookmarks scraped than the dashboard reports"
            );
        }

        let mut result = aggregate(
            urls.username(),
            urls.dashboard().as_str(),
            &works,
            &bookmarks,
            &counters,
        );
        result.coverage = Some(coverage_report(&bookmark_pages, &work_pages, &self.config));
        Ok(result.stamped(now()))
    }
}

/// Combined page coverage across both listings.
pub fn coverage_report(
    bookmarks: &Acquisition,
    works: &Acquisition,
    config: &ScrapeConfig,
) -> CoverageReport {
    let expected = bookmarks.total_pages + works.total_pages;
    let fetched = bookmarks.fetched_pages() + works.fetched_pages();
    let overall_ratio = if expected == 0 {
        1.0
    } else {
        f64::from(fetched) / f64::from(expected)
    };
    let degraded = config.coverage_is_degraded(bookmarks.coverage_ratio())
        || config.coverage_is_degraded(works.coverage_ratio());
    if degraded {
        warn!(
            overall = %format!("{:.1}%", overall_ratio * 100.0),
            "run coverage degraded, totals are a lower bound"
        );
    }
    CoverageReport {
        bookmarks: bookmarks.coverage(),
        works: works.coverage(),
        overall_ratio,
        degraded,
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let started = Instant::now();

    let outcome = match &cli.command {
        Command::Quick { username, fetch } => {
            info!(username = username.as_str(), "quick scrape");
            let config = ScrapeConfig::from(fetch);
            let scraper = Scraper::new(BrowserSessions::new(&config), config);
            scraper
                .quick(username)
                .await
                .and_then(|result| to_json(&result, cli.pretty))
        }
        Command::Full { username, fetch } => {
            info!(username = username.as_str(), "full scrape");
            let config = ScrapeConfig::from(fetch);
            let scraper = Scraper::new(BrowserSessions::new(&config), config);
            scraper
                .full(username)
                .await
                .and_then(|result| to_json(&result, cli.pretty))
        }
        Command::Index { username, data_dir } => LocalIndex::load(data_dir)
            .and_then(|index| to_json(&index.stats(username), cli.pretty)),
    };

    info!(elapsed = %format!("{:.1}s", started.elapsed().as_secs_f64()), "completed");

    let (payload, code) = match outcome {
        Ok(json) => (json, ExitCode::SUCCESS),
        Err(err) => {
            warn!(error = %err, "run failed");
            let report = ErrorReport::from(err);
            let json = to_json(&report, cli.pretty)
                .unwrap_or_else(|_| r#"{"error":"unknown error"}"#.to_string());
            (json, ExitCode::FAILURE)
        }
    };

    let mut stdout = io::stdout().lock();
    if writeln!(stdout, "{payload}").and_then(|_| stdout.flush()).is_err() {
        return ExitCode::FAILURE;
    }
    code
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "ao3_stats=debug"
    } else {
        "ao3_stats=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

impl From<StatsError> for ErrorReport {
    fn from(err: StatsError) -> Self {
        ErrorReport {
            error: err.to_string(),
        }
    }
}
