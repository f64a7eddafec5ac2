use ao3_stats::app::testing::fixtures::{
    WorkFixture, bookmark_item, dashboard_page, listing_page, work_item,
};
use ao3_stats::app::testing::{Reply, ScriptedSessions, TEST_BASE_URL, fast_config};
use ao3_stats::app::types::ListingKind;
use ao3_stats::{ProfileUrls, ScrapeConfig, Scraper, StatsError};

const PROFILE_PAGE: &str = r#"<html><body><div class="user home profile">
<dl class="meta"><dt>My pseuds:</dt><dd>reader</dd><dt>I joined on:</dt><dd>2014-08-19</dd></dl>
</div></body></html>"#;

fn urls(username: &str) -> ProfileUrls {
    ProfileUrls::new(TEST_BASE_URL, username).unwrap()
}

fn listing_url(username: &str, kind: ListingKind, page: u32) -> String {
    urls(username).listing(kind, page).to_string()
}

fn script_profile(sessions: &ScriptedSessions, username: &str, dashboard_links: &[&str]) {
    let urls = urls(username);
    sessions.push(urls.dashboard(), Reply::ok(dashboard_page(dashboard_links)));
    sessions.push(urls.profile(), Reply::ok(PROFILE_PAGE));
}

fn bookmark_page(fandoms: &[&str], count: usize, words: &str) -> String {
    let items = (0..count)
        .map(|i| {
            let title = format!("Bookmark {i}");
            bookmark_item(Some(&title), Some(words), fandoms, &["A/B"])
        })
        .collect::<Vec<_>>();
    listing_page(&items)
}

#[tokio::test]
async fn unknown_user_short_circuits_before_listings() {
    let sessions = ScriptedSessions::new();
    let urls = urls("ghost_user_404");
    sessions.push(urls.dashboard(), Reply::status(404));

    let scraper = Scraper::new(sessions.clone(), fast_config());
    let err = scraper.full("ghost_user_404").await.unwrap_err();

    assert!(matches!(err, StatsError::NotFound { .. }));
    assert_eq!(err.to_string(), "User 'ghost_user_404' not found");
    assert_eq!(sessions.requests(), vec![urls.dashboard().to_string()]);
}

#[tokio::test]
async fn unreachable_dashboard_is_a_run_level_error() {
    let sessions = ScriptedSessions::new();
    sessions.push(urls("busy").dashboard(), Reply::Transport("timed out".into()));

    let scraper = Scraper::new(sessions.clone(), fast_config());
    let err = scraper.quick("busy").await.unwrap_err();

    assert!(matches!(err, StatsError::DashboardUnreachable { .. }));
    assert!(
        sessions
            .requests()
            .iter()
            .all(|url| !url.contains("works") && !url.contains("bookmarks"))
    );
}

#[tokio::test]
async fn challenge_page_is_not_reported_as_an_empty_profile() {
    let sessions = ScriptedSessions::new();
    let urls = urls("reader");
    let challenge = "<html><body><h1>Just a moment...</h1></body></html>";
    sessions.push(urls.dashboard(), Reply::ok(challenge));
    sessions.push(urls.profile(), Reply::ok(challenge));

    let scraper = Scraper::new(sessions.clone(), fast_config());
    let err = scraper.full("reader").await.unwrap_err();

    assert!(matches!(err, StatsError::DashboardUnreachable { .. }));
    assert!(err.to_string().contains("reader"));
    assert_eq!(sessions.requests(), vec![urls.dashboard().to_string()]);

    let err = scraper.quick("reader").await.unwrap_err();
    assert!(matches!(err, StatsError::DashboardUnreachable { .. }));
}

#[tokio::test]
async fn quick_mode_reads_counters_only() {
    let sessions = ScriptedSessions::new();
    script_profile(
        &sessions,
        "reader",
        &["Works (3)", "Bookmarks (120)", "Series (1)", "Gifts (2)"],
    );

    let scraper = Scraper::new(sessions.clone(), fast_config());
    let result = scraper.quick("reader").await.unwrap();

    assert_eq!(result.works, 3);
    assert_eq!(result.bookmarks, 120);
    assert_eq!(result.series, 1);
    assert_eq!(result.gifts, 2);
    assert_eq!(result.joined, "2014-08-19");
    assert_eq!(result.is_quick_data, Some(true));
    assert!(result.coverage.is_none());
    assert_eq!(sessions.requests().len(), 2);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["isQuickData"], true);
    assert_eq!(json["totalWordsRead"], 0);
    assert!(json["mostPopularWork"].is_null());
    assert!(json.get("bookmarksScraped").is_none());
}

#[tokio::test]
async fn full_mode_aggregates_both_listings() {
    let sessions = ScriptedSessions::new();
    script_profile(&sessions, "reader", &["Works (3)", "Bookmarks (45)"]);

    // Three bookmark pages; page 2 needs the retry pass.
    sessions.push(
        listing_url("reader", ListingKind::Bookmarks, 1),
        Reply::ok(bookmark_page(&["Good Omens"], 20, "1,000")),
    );
    sessions.push_all(
        listing_url("reader", ListingKind::Bookmarks, 2),
        [
            Reply::status(503),
            Reply::status(503),
            Reply::ok(bookmark_page(&["Good Omens", "Supernatural"], 20, "500")),
        ],
    );
    sessions.push(
        listing_url("reader", ListingKind::Bookmarks, 3),
        Reply::ok(bookmark_page(&["Supernatural"], 5, "10")),
    );

    let works = [
        work_item(&WorkFixture {
            title: Some("Small"),
            words: Some("2,000"),
            kudos: Some("5"),
            hits: Some("50"),
            characters: &["Crowley"],
            ..WorkFixture::default()
        }),
        work_item(&WorkFixture {
            title: Some("Big"),
            words: Some("30,000"),
            kudos: Some("20"),
            hits: Some("1,000"),
            characters: &["Crowley", "Aziraphale"],
            ..WorkFixture::default()
        }),
        work_item(&WorkFixture {
            title: Some("Also Big"),
            words: None,
            kudos: Some("20"),
            hits: Some("900"),
            ..WorkFixture::default()
        }),
    ];
    sessions.push(
        listing_url("reader", ListingKind::Works, 1),
        Reply::ok(listing_page(&works)),
    );

    let scraper = Scraper::new(sessions.clone(), fast_config());
    let result = scraper.full("reader").await.unwrap();

    assert_eq!(result.bookmarks, 45);
    assert_eq!(result.bookmarks_scraped, Some(45));
    assert_eq!(result.total_words_read, 20 * 1_000 + 20 * 500 + 5 * 10);
    assert_eq!(result.total_words_written, 32_000);
    assert_eq!(result.total_kudos, 45);
    assert_eq!(result.total_hits, 1_950);

    assert_eq!(result.top_fandoms[0].name, "Good Omens");
    assert_eq!(result.top_fandoms[0].count, 40);
    assert_eq!(result.top_fandoms[1].name, "Supernatural");
    assert_eq!(result.top_fandoms[1].count, 25);
    assert_eq!(result.top_relationships[0].count, 45);
    assert_eq!(result.top_characters[0].name, "Crowley");
    assert_eq!(result.top_characters[0].count, 2);

    let popular = result.most_popular_work.as_ref().unwrap();
    assert_eq!(popular.title, "Big");

    let coverage = result.coverage.as_ref().unwrap();
    assert_eq!(coverage.bookmarks.expected_pages, 3);
    assert_eq!(coverage.bookmarks.fetched_pages, 3);
    assert_eq!(coverage.works.expected_pages, 1);
    assert_eq!(coverage.overall_ratio, 1.0);
    assert!(!coverage.degraded);
    assert!(!result.scraped_at.is_empty());

    let json = serde_json::to_value(&result).unwrap();
    for key in [
        "username",
        "url",
        "joined",
        "works",
        "series",
        "bookmarks",
        "bookmarksScraped",
        "collections",
        "gifts",
        "topFandoms",
        "topCharacters",
        "topRelationships",
        "totalWordsRead",
        "totalWordsWritten",
        "totalKudos",
        "totalHits",
        "mostPopularWork",
    ] {
        assert!(json.get(key).is_some(), "missing key {key}");
    }
    assert_eq!(json["url"], "https://archive.test/users/reader");
    assert_eq!(json["mostPopularWork"]["words"], 30_000);
}

#[tokio::test]
async fn fandoms_fall_back_to_works_without_bookmarks() {
    let sessions = ScriptedSessions::new();
    script_profile(&sessions, "writer", &["Works (2)", "Bookmarks (0)"]);
    let works = [
        work_item(&WorkFixture {
            title: Some("One"),
            fandoms: &["Hannibal (TV)"],
            relationships: &["Hannibal/Will"],
            ..WorkFixture::default()
        }),
        work_item(&WorkFixture {
            title: Some("Two"),
            fandoms: &["Hannibal (TV)", "Bones"],
            ..WorkFixture::default()
        }),
    ];
    sessions.push(
        listing_url("writer", ListingKind::Works, 1),
        Reply::ok(listing_page(&works)),
    );

    let scraper = Scraper::new(sessions.clone(), fast_config());
    let result = scraper.full("writer").await.unwrap();

    assert_eq!(result.bookmarks_scraped, Some(0));
    assert_eq!(result.top_fandoms[0].name, "Hannibal (TV)");
    assert_eq!(result.top_fandoms[0].count, 2);
    assert_eq!(result.top_relationships[0].name, "Hannibal/Will");
    assert!(
        sessions
            .requests()
            .iter()
            .all(|url| !url.contains("/bookmarks"))
    );
}

#[tokio::test]
async fn heavy_losses_produce_a_flagged_lower_bound() {
    let sessions = ScriptedSessions::new();
    script_profile(&sessions, "reader", &["Bookmarks (200)"]);
    for page in 1..=10 {
        let url = listing_url("reader", ListingKind::Bookmarks, page);
        if page <= 4 {
            sessions.push(&url, Reply::status(503));
        } else {
            sessions.push(&url, Reply::ok(bookmark_page(&["F"], 20, "1")));
        }
    }

    let scraper = Scraper::new(sessions.clone(), fast_config());
    let result = scraper.full("reader").await.unwrap();

    assert_eq!(result.bookmarks, 200);
    assert_eq!(result.bookmarks_scraped, Some(120));
    let coverage = result.coverage.unwrap();
    assert!(coverage.degraded);
    assert_eq!(coverage.bookmarks.fetched_pages, 6);
    assert!((coverage.bookmarks.ratio - 0.6).abs() < 1e-9);
    // Four failures exceed twice the one-page budget, so no retry pass.
    assert_eq!(
        sessions.request_count(listing_url("reader", ListingKind::Bookmarks, 1)),
        2
    );
}

#[tokio::test]
async fn scraper_sanitizes_its_config() {
    let config = ScrapeConfig {
        parallel_requests: 0,
        ..fast_config()
    };
    let scraper = Scraper::new(ScriptedSessions::new(), config);
    assert_eq!(scraper.config().parallel_requests, 1);
}
