use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::config::ScrapeConfig;
use super::crawl::fetch_page;
use super::error::{Result, StatsError};
use super::parse::{element_text, parse_count};
use super::session::{ProfileUrls, Session};
use super::types::{FetchOutcome, ProfileCounters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Counter {
    Works,
    Bookmarks,
    Series,
    Collections,
    Gifts,
}

impl Counter {
    // Checked in this order; the first label found in a link wins.
    const ALL: [Counter; 5] = [
        Counter::Works,
        Counter::Bookmarks,
        Counter::Series,
        Counter::Collections,
        Counter::Gifts,
    ];

    fn label(self) -> &'static str {
        match self {
            Counter::Works => "Works",
            Counter::Bookmarks => "Bookmarks",
            Counter::Series => "Series",
            Counter::Collections => "Collections",
            Counter::Gifts => "Gifts",
        }
    }

    fn slot(self, counters: &mut ProfileCounters) -> &mut u64 {
        match self {
            Counter::Works => &mut counters.works,
            Counter::Bookmarks => &mut counters.bookmarks,
            Counter::Series => &mut counters.series,
            Counter::Collections => &mut counters.collections,
            Counter::Gifts => &mut counters.gifts,
        }
    }
}

/// Fetch the dashboard and profile pages once and read the user's counters
/// and joined date.
pub async fn resolve_profile<S: Session + ?Sized>(
    session: &S,
    urls: &ProfileUrls,
    config: &ScrapeConfig,
) -> Result<ProfileCounters> {
    let username = urls.username();
    let policy = config.profile_retry();
    let dashboard_url = urls.dashboard();
    info!(url = %dashboard_url, "fetching dashboard");

    let dashboard = fetch_page(session, dashboard_url.as_str(), 0, &policy, "PROFILE").await;
    let mut counters = match (dashboard.outcome, dashboard.body) {
        (FetchOutcome::Ok, Some(body)) => match parse_dashboard(&body) {
            Some(counters) => counters,
            None => {
                warn!(url = %dashboard_url, "dashboard markup missing from 200 response");
                return Err(StatsError::DashboardUnreachable {
                    username: username.to_string(),
                    reason: "dashboard markup missing (challenge page?)".to_string(),
                });
            }
        },
        (FetchOutcome::PermanentFailure, _) => {
            return Err(StatsError::NotFound {
                username: username.to_string(),
            });
        }
        _ => {
            return Err(StatsError::DashboardUnreachable {
                username: username.to_string(),
                reason: format!("no successful response after {} attempts", policy.attempts),
            });
        }
    };
    info!(
        works = counters.works,
        bookmarks = counters.bookmarks,
        series = counters.series,
        "dashboard counters"
    );

    let profile_url = urls.profile();
    let profile = fetch_page(session, profile_url.as_str(), 0, &policy, "PROFILE").await;
    match (profile.outcome, profile.body) {
        (FetchOutcome::Ok, Some(body)) => match extract_joined(&body) {
            Some(joined) => {
                info!(joined = joined.as_str(), "joined date parsed");
                counters.joined = joined;
            }
            None => warn!("joined date not found on profile page"),
        },
        (FetchOutcome::PermanentFailure, _) => {
            return Err(StatsError::NotFound {
                username: username.to_string(),
            });
        }
        _ => warn!("profile page unavailable, joined date left empty"),
    }

    Ok(counters)
}

/// Read the parenthesized count out of a dashboard link if its text carries
/// `label`. `"Bookmarks (1,204)"` with label `"Bookmarks"` gives 1204.
pub fn counter_by_label(text: &str, label: &str) -> Option<u64> {
    if !text.contains(label) {
        return None;
    }
    parenthesized_count(text)
}

fn parenthesized_count(text: &str) -> Option<u64> {
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let close = after.find(')')?;
        let inner = &after[..close];
        if inner.chars().any(|ch| ch.is_ascii_digit())
            && inner.chars().all(|ch| ch.is_ascii_digit() || ch == ',')
        {
            return parse_count(inner);
        }
        rest = &after[close + 1..];
    }
    None
}

/// Scan `#dashboard` links for labeled counts. Missing labels stay zero.
///
/// `None` when the page has no dashboard links at all, which is what a
/// challenge or rate-limit page served with status 200 looks like.
pub fn parse_dashboard(body: &str) -> Option<ProfileCounters> {
    let links = Selector::parse("#dashboard a").ok()?;
    let doc = Html::parse_document(body);

    let mut counters = ProfileCounters::default();
    let mut seen_links = 0usize;
    for link in doc.select(&links) {
        seen_links += 1;
        let text = element_text(link);
        let hit = Counter::ALL
            .into_iter()
            .find_map(|counter| counter_by_label(&text, counter.label()).map(|n| (counter, n)));
        if let Some((counter, count)) = hit {
            *counter.slot(&mut counters) = count;
        }
    }

    (seen_links > 0).then_some(counters)
}

/// Joined date from the profile page, trying a labeled definition list, then
/// a `<time datetime>`, then any date-looking definition value.
pub fn extract_joined(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let found = joined_from_meta_list(&doc)
        .or_else(|| joined_from_time_element(&doc))
        .or_else(|| joined_from_date_like_value(&doc));
    if found.is_none() {
        debug!("no joined-date marker matched");
    }
    found
}

fn joined_from_meta_list(doc: &Html) -> Option<String> {
    let lists = Selector::parse("dl.meta, dl.profile, dl.stats").ok()?;
    let terms = Selector::parse("dt").ok()?;

    doc.select(&lists)
        .flat_map(|list| list.select(&terms))
        .filter(|dt| {
            element_text(*dt)
                .to_lowercase()
                .trim_end_matches(':')
                .contains("joined")
        })
        .find_map(|dt| {
            dt.next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|sibling| sibling.value().name() == "dd")
                .map(element_text)
                .filter(|text| !text.is_empty())
        })
}

fn joined_from_time_element(doc: &Html) -> Option<String> {
    let selector = Selector::parse("time[datetime]").ok()?;
    let el = doc.select(&selector).next()?;
    let text = element_text(el);
    if !text.is_empty() {
        return Some(text);
    }
    el.value()
        .attr("datetime")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn joined_from_date_like_value(doc: &Html) -> Option<String> {
    let selector = Selector::parse("dl dd").ok()?;
    doc.select(&selector)
        .map(element_text)
        .find(|text| looks_like_date(text))
}

fn looks_like_date(text: &str) -> bool {
    text.chars().any(|ch| ch.is_ascii_digit()) && (text.contains('-') || text.contains('/'))
}
