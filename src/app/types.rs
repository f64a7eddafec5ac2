use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Number of entries kept in every ranked tag list.
pub const TOP_N: usize = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ListingKind {
    Works,
    Bookmarks,
}

impl ListingKind {
    pub fn label(self) -> &'static str {
        match self {
            ListingKind::Works => "WORKS",
            ListingKind::Bookmarks => "BOOKMARKS",
        }
    }

    pub fn path_segment(self) -> &'static str {
        match self {
            ListingKind::Works => "works",
            ListingKind::Bookmarks => "bookmarks",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok,
    TransientFailure,
    PermanentFailure,
}

impl FetchOutcome {
    pub fn label(self) -> &'static str {
        match self {
            FetchOutcome::Ok => "ok",
            FetchOutcome::TransientFailure => "transient_failure",
            FetchOutcome::PermanentFailure => "permanent_failure",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageFetchResult {
    pub page: u32,
    pub body: Option<String>,
    pub outcome: FetchOutcome,
}

impl PageFetchResult {
    pub fn ok(page: u32, body: String) -> Self {
        Self {
            page,
            body: Some(body),
            outcome: FetchOutcome::Ok,
        }
    }

    pub fn failed(page: u32, outcome: FetchOutcome) -> Self {
        Self {
            page,
            body: None,
            outcome,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == FetchOutcome::Ok && self.body.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    pub title: String,
    #[serde(rename = "words")]
    pub word_count: u64,
    pub kudos: u64,
    pub hits: u64,
    pub fandoms: Vec<String>,
    pub relationships: Vec<String>,
    pub characters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub title: String,
    #[serde(rename = "words")]
    pub word_count: u64,
    pub fandoms: Vec<String>,
    pub relationships: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileCounters {
    pub works: u64,
    pub bookmarks: u64,
    pub series: u64,
    pub collections: u64,
    pub gifts: u64,
    pub joined: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub name: String,
    pub count: u64,
}

/// Tag occurrence counts that remember the order in which each tag was first
/// seen, so ranking ties resolve to the earliest tag.
#[derive(Debug, Clone, Default)]
pub struct TagFrequencyTable {
    entries: Vec<(String, u64)>,
    positions: HashMap<String, usize>,
}

impl TagFrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tag: &str) {
        if tag.is_empty() {
            return;
        }
        match self.positions.get(tag) {
            Some(&idx) => self.entries[idx].1 += 1,
            None => {
                self.positions.insert(tag.to_string(), self.entries.len());
                self.entries.push((tag.to_string(), 1));
            }
        }
    }

    pub fn extend<'a>(&mut self, tags: impl IntoIterator<Item = &'a String>) {
        for tag in tags {
            self.add(tag);
        }
    }

    pub fn get(&self, tag: &str) -> Option<u64> {
        self.positions.get(tag).map(|&idx| self.entries[idx].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top(&self, limit: usize) -> Vec<TagCount> {
        let mut ranked = self.entries.iter().collect::<Vec<_>>();
        // sort_by is stable: equal counts keep first-insertion order.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .take(limit)
            .map(|(name, count)| TagCount {
                name: name.clone(),
                count: *count,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingCoverage {
    pub expected_pages: u32,
    pub fetched_pages: u32,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub bookmarks: ListingCoverage,
    pub works: ListingCoverage,
    pub overall_ratio: f64,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub username: String,
    pub url: String,
    pub joined: String,
    pub works: u64,
    pub series: u64,
    pub bookmarks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmarks_scraped: Option<u64>,
    pub collections: u64,
    pub gifts: u64,
    pub top_fandoms: Vec<TagCount>,
    pub top_characters: Vec<TagCount>,
    pub top_relationships: Vec<TagCount>,
    pub total_words_read: u64,
    pub total_words_written: u64,
    pub total_kudos: u64,
    pub total_hits: u64,
    pub most_popular_work: Option<WorkRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_quick_data: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageReport>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scraped_at: String,
}

impl AggregateResult {
    pub fn stamped(mut self, scraped_at: String) -> Self {
        self.scraped_at = scraped_at;
        self
    }
}

/// The structured error object emitted in place of statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub error: String,
}
