use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::types::{BookmarkRecord, WorkRecord};

/// Selectors for one listing blurb, parsed once per page.
struct BlurbSelectors {
    item: Selector,
    title: Selector,
    words: Selector,
    kudos: Selector,
    hits: Selector,
    fandoms: Selector,
    relationships: Selector,
    characters: Selector,
}

impl BlurbSelectors {
    fn new(item: &str) -> Option<Self> {
        Some(Self {
            item: Selector::parse(item).ok()?,
            title: Selector::parse("h4.heading a").ok()?,
            words: Selector::parse("dd.words").ok()?,
            kudos: Selector::parse("dd.kudos a").ok()?,
            hits: Selector::parse("dd.hits").ok()?,
            fandoms: Selector::parse(".fandoms a.tag").ok()?,
            relationships: Selector::parse("li.relationships a.tag").ok()?,
            characters: Selector::parse("li.characters a.tag").ok()?,
        })
    }
}

/// A blurb that cannot become a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemDefect {
    MissingTitle,
    MalformedNumber(&'static str),
}

pub fn parse_work_listing(body: &str) -> Vec<WorkRecord> {
    parse_listing(body, "li.work.blurb", parse_work)
}

pub fn parse_bookmark_listing(body: &str) -> Vec<BookmarkRecord> {
    parse_listing(body, "li.bookmark.blurb", parse_bookmark)
}

fn parse_listing<T>(
    body: &str,
    item: &str,
    parse_item: fn(ElementRef<'_>, &BlurbSelectors) -> Result<T, ItemDefect>,
) -> Vec<T> {
    let Some(selectors) = BlurbSelectors::new(item) else {
        return Vec::new();
    };
    let doc = Html::parse_document(body);

    doc.select(&selectors.item)
        .enumerate()
        .filter_map(|(idx, el)| match parse_item(el, &selectors) {
            Ok(record) => Some(record),
            Err(defect) => {
                debug!(item, position = idx, ?defect, "dropping listing item");
                None
            }
        })
        .collect()
}

fn parse_work(el: ElementRef<'_>, sel: &BlurbSelectors) -> Result<WorkRecord, ItemDefect> {
    Ok(WorkRecord {
        title: title(el, sel)?,
        word_count: count_field(el, &sel.words, "words")?,
        kudos: count_field(el, &sel.kudos, "kudos")?,
        hits: count_field(el, &sel.hits, "hits")?,
        fandoms: tag_texts(el, &sel.fandoms),
        relationships: tag_texts(el, &sel.relationships),
        characters: tag_texts(el, &sel.characters),
    })
}

fn parse_bookmark(el: ElementRef<'_>, sel: &BlurbSelectors) -> Result<BookmarkRecord, ItemDefect> {
    Ok(BookmarkRecord {
        title: title(el, sel)?,
        word_count: count_field(el, &sel.words, "words")?,
        fandoms: tag_texts(el, &sel.fandoms),
        relationships: tag_texts(el, &sel.relationships),
    })
}

fn title(el: ElementRef<'_>, sel: &BlurbSelectors) -> Result<String, ItemDefect> {
    el.select(&sel.title)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
        .ok_or(ItemDefect::MissingTitle)
}

/// An absent stat counts as zero; a present one that is not a number
/// disqualifies the item.
fn count_field(
    el: ElementRef<'_>,
    selector: &Selector,
    field: &'static str,
) -> Result<u64, ItemDefect> {
    match el.select(selector).next() {
        None => Ok(0),
        Some(node) => parse_count(&element_text(node)).ok_or(ItemDefect::MalformedNumber(field)),
    }
}

fn tag_texts(el: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    el.select(selector)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Visible text of an element with whitespace collapsed. Inline markup does
/// not introduce spaces: `Foo<i>bar</i>` reads as `Foobar`.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<String>())
}

pub(crate) fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an integer that may carry thousands separators ("12,345").
pub fn parse_count(text: &str) -> Option<u64> {
    let digits = text
        .chars()
        .filter(|ch| *ch != ',' && !ch.is_whitespace())
        .collect::<String>();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::fixtures::{WorkFixture, bookmark_item, listing_page, work_item};

    #[test]
    fn parses_work_blurb_fields() {
        let page = listing_page(&[work_item(&WorkFixture {
            title: Some("The Long Road"),
            words: Some("12,345"),
            kudos: Some("1,002"),
            hits: Some("20,000"),
            fandoms: &["Star Wars", "Andor (TV)"],
            relationships: &["Cassian/Jyn"],
            characters: &["Cassian Andor", "Jyn Erso"],
        })]);

        let works = parse_work_listing(&page);
        assert_eq!(works.len(), 1);
        let work = &works[0];
        assert_eq!(work.title, "The Long Road");
        assert_eq!(work.word_count, 12_345);
        assert_eq!(work.kudos, 1_002);
        assert_eq!(work.hits, 20_000);
        assert_eq!(work.fandoms, vec!["Star Wars", "Andor (TV)"]);
        assert_eq!(work.relationships, vec!["Cassian/Jyn"]);
        assert_eq!(work.characters, vec!["Cassian Andor", "Jyn Erso"]);
    }

    #[test]
    fn missing_word_count_defaults_to_zero() {
        let page = listing_page(&[bookmark_item(Some("No Stats"), None, &["F"], &[])]);
        let bookmarks = parse_bookmark_listing(&page);
        assert_eq!(bookmarks.len(), 1);
        assert_eq!(bookmarks[0].word_count, 0);
    }

    #[test]
    fn missing_title_drops_only_that_item() {
        let page = listing_page(&[
            bookmark_item(Some("First"), Some("10"), &[], &[]),
            bookmark_item(None, Some("20"), &[], &[]),
            bookmark_item(Some("Third"), Some("30"), &[], &[]),
        ]);
        let titles = parse_bookmark_listing(&page)
            .into_iter()
            .map(|b| b.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["First", "Third"]);
    }

    #[test]
    fn malformed_number_drops_the_item() {
        let page = listing_page(&[
            work_item(&WorkFixture {
                title: Some("Broken"),
                kudos: Some("lots"),
                ..WorkFixture::default()
            }),
            work_item(&WorkFixture {
                title: Some("Fine"),
                ..WorkFixture::default()
            }),
        ]);
        let works = parse_work_listing(&page);
        assert_eq!(works.len(), 1);
        assert_eq!(works[0].title, "Fine");
    }

    #[test]
    fn listing_kinds_do_not_cross_match() {
        let page = listing_page(&[
            work_item(&WorkFixture::default()),
            bookmark_item(Some("B"), Some("5"), &[], &[]),
        ]);
        assert_eq!(parse_work_listing(&page).len(), 1);
        assert_eq!(parse_bookmark_listing(&page).len(), 1);
    }

    #[test]
    fn document_order_is_preserved() {
        let items = (1..=5)
            .map(|i| {
                let title = format!("Work {i}");
                work_item(&WorkFixture {
                    title: Some(&title),
                    ..WorkFixture::default()
                })
            })
            .collect::<Vec<_>>();
        let titles = parse_work_listing(&listing_page(&items))
            .into_iter()
            .map(|w| w.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, (1..=5).map(|i| format!("Work {i}")).collect::<Vec<_>>());
    }

    #[test]
    fn garbage_input_yields_nothing() {
        assert!(parse_work_listing("").is_empty());
        assert!(parse_bookmark_listing("<html><p>Retry later</p></html>").is_empty());
    }

    #[test]
    fn inline_markup_in_titles_is_not_spaced() {
        let page = listing_page(&[bookmark_item(
            Some("Foo<i>bar</i> and <b>Baz</b>"),
            Some("10"),
            &["F"],
            &[],
        )]);
        let bookmarks = parse_bookmark_listing(&page);
        assert_eq!(bookmarks[0].title, "Foobar and Baz");
    }

    #[test]
    fn parse_count_strips_separators() {
        assert_eq!(parse_count("1,234,567"), Some(1_234_567));
        assert_eq!(parse_count(" 42 "), Some(42));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count("1.5"), None);
    }
}
