use super::types::{
    AggregateResult, BookmarkRecord, ProfileCounters, TOP_N, TagFrequencyTable, WorkRecord,
};

/// Fold parsed records and dashboard counters into the final statistics.
///
/// Fandom and relationship rankings come from bookmarks (what the user
/// reads); when bookmarks contribute nothing they fall back to the user's
/// own works. Characters always come from works.
pub fn aggregate(
    username: &str,
    url: &str,
    works: &[WorkRecord],
    bookmarks: &[BookmarkRecord],
    counters: &ProfileCounters,
) -> AggregateResult {
    let fandoms = fold_with_fallback(
        bookmarks.iter().map(|b| &b.fandoms),
        works.iter().map(|w| &w.fandoms),
    );
    let relationships = fold_with_fallback(
        bookmarks.iter().map(|b| &b.relationships),
        works.iter().map(|w| &w.relationships),
    );
    let characters = fold(works.iter().map(|w| &w.characters));

    AggregateResult {
        username: username.to_string(),
        url: url.to_string(),
        joined: counters.joined.clone(),
        works: counters.works,
        series: counters.series,
        bookmarks: counters.bookmarks,
        bookmarks_scraped: Some(bookmarks.len() as u64),
        collections: counters.collections,
        gifts: counters.gifts,
        top_fandoms: fandoms.top(TOP_N),
        top_characters: characters.top(TOP_N),
        top_relationships: relationships.top(TOP_N),
        total_words_read: bookmarks.iter().map(|b| b.word_count).sum(),
        total_words_written: works.iter().map(|w| w.word_count).sum(),
        total_kudos: works.iter().map(|w| w.kudos).sum(),
        total_hits: works.iter().map(|w| w.hits).sum(),
        most_popular_work: most_popular_work(works).cloned(),
        is_quick_data: None,
        coverage: None,
        scraped_at: String::new(),
    }
}

/// Counters-only result: every item-derived field is zero or empty and the
/// result is flagged as partial.
pub fn quick_result(username: &str, url: &str, counters: &ProfileCounters) -> AggregateResult {
    AggregateResult {
        bookmarks_scraped: None,
        is_quick_data: Some(true),
        ..aggregate(username, url, &[], &[], counters)
    }
}

/// Highest kudos; the earliest work wins a tie.
pub fn most_popular_work(works: &[WorkRecord]) -> Option<&WorkRecord> {
    works.iter().fold(None, |best: Option<&WorkRecord>, work| match best {
        Some(current) if current.kudos >= work.kudos => Some(current),
        _ => Some(work),
    })
}

pub fn fold<'a>(tag_lists: impl Iterator<Item = &'a Vec<String>>) -> TagFrequencyTable {
    let mut table = TagFrequencyTable::new();
    for tags in tag_lists {
        table.extend(tags);
    }
    table
}

fn fold_with_fallback<'a>(
    primary: impl Iterator<Item = &'a Vec<String>>,
    fallback: impl Iterator<Item = &'a Vec<String>>,
) -> TagFrequencyTable {
    let table = fold(primary);
    if table.is_empty() { fold(fallback) } else { table }
}
