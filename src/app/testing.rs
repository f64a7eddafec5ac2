//! Scripted sessions for exercising the fetch pipeline without a network.
//!
//! Replies are queued per URL. Each request pops the next reply; the final
//! reply for a URL repeats forever. Unscripted URLs fail at the transport
//! level. Every request is recorded in order.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::config::ScrapeConfig;
use super::error::Result;
use super::session::{HttpResponse, Session, SessionProvider, TransportError};

pub const TEST_BASE_URL: &str = "https://archive.test";

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    RateLimited(Duration),
    Transport(String),
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Status(200, body.into())
    }

    pub fn status(code: u16) -> Self {
        Reply::Status(code, String::new())
    }
}

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, VecDeque<Reply>>,
    requests: Vec<String>,
    sessions_created: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedSessions {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: impl AsRef<str>, reply: Reply) -> &Self {
        self.with_script(|script| {
            script
                .replies
                .entry(url.as_ref().to_string())
                .or_default()
                .push_back(reply);
        });
        self
    }

    pub fn push_all(&self, url: impl AsRef<str>, replies: impl IntoIterator<Item = Reply>) -> &Self {
        for reply in replies {
            self.push(url.as_ref(), reply);
        }
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.with_script(|script| script.requests.clone())
    }

    pub fn request_count(&self, url: impl AsRef<str>) -> usize {
        let url = url.as_ref();
        self.with_script(|script| script.requests.iter().filter(|r| *r == url).count())
    }

    pub fn sessions_created(&self) -> usize {
        self.with_script(|script| script.sessions_created)
    }

    fn next_reply(&self, url: &str) -> Option<Reply> {
        self.with_script(|script| {
            script.requests.push(url.to_string());
            let queue = script.replies.get_mut(url)?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        })
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut guard = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl SessionProvider for ScriptedSessions {
    type Session = ScriptedSession;

    fn session(&self) -> Result<ScriptedSession> {
        self.with_script(|script| script.sessions_created += 1);
        Ok(ScriptedSession {
            script: self.clone(),
        })
    }
}

pub struct ScriptedSession {
    script: ScriptedSessions,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn get(&self, url: &str) -> std::result::Result<HttpResponse, TransportError> {
        // Yield so concurrent workers interleave like real requests would.
        tokio::task::yield_now().await;
        match self.script.next_reply(url) {
            Some(Reply::Status(status, body)) => Ok(HttpResponse {
                status,
                body,
                retry_after: None,
            }),
            Some(Reply::RateLimited(wait)) => Ok(HttpResponse {
                status: 429,
                body: String::new(),
                retry_after: Some(wait),
            }),
            Some(Reply::Transport(message)) => Err(TransportError(message)),
            None => Err(TransportError(format!("unscripted url {url}"))),
        }
    }
}

/// Default tunables with every deliberate delay removed.
pub fn fast_config() -> ScrapeConfig {
    ScrapeConfig {
        base_url: TEST_BASE_URL.to_string(),
        retry_delay: Duration::ZERO,
        cooldown: Duration::ZERO,
        retry_gap: Duration::ZERO,
        ..ScrapeConfig::default()
    }
}

/// Minimal listing markup in the shape the archive serves.
pub mod fixtures {
    pub struct WorkFixture<'a> {
        pub title: Option<&'a str>,
        pub words: Option<&'a str>,
        pub kudos: Option<&'a str>,
        pub hits: Option<&'a str>,
        pub fandoms: &'a [&'a str],
        pub relationships: &'a [&'a str],
        pub characters: &'a [&'a str],
    }

    impl Default for WorkFixture<'_> {
        fn default() -> Self {
            Self {
                title: Some("Untitled"),
                words: Some("1,000"),
                kudos: Some("10"),
                hits: Some("100"),
                fandoms: &[],
                relationships: &[],
                characters: &[],
            }
        }
    }

    fn tags(class: &str, names: &[&str]) -> String {
        names
            .iter()
            .map(|name| format!(r#"<li class="{class}"><a class="tag" href="/tags/x">{name}</a></li>"#))
            .collect()
    }

    fn fandom_block(names: &[&str]) -> String {
        let links = names
            .iter()
            .map(|name| format!(r#"<a class="tag" href="/tags/x">{name}</a>"#))
            .collect::<Vec<_>>()
            .join(", ");
        format!(r#"<h5 class="fandoms heading"><span class="landmark">Fandoms:</span> {links}</h5>"#)
    }

    fn heading(title: Option<&str>) -> String {
        match title {
            Some(title) => format!(
                r#"<h4 class="heading"><a href="/works/1">{title}</a> by <a rel="author" href="/users/a">a</a></h4>"#
            ),
            None => r#"<h4 class="heading">Mystery</h4>"#.to_string(),
        }
    }

    fn dd(class: &str, value: Option<&str>, linked: bool) -> String {
        match (value, linked) {
            (Some(v), true) => format!(r#"<dt class="{class}">x:</dt><dd class="{class}"><a href="/x">{v}</a></dd>"#),
            (Some(v), false) => format!(r#"<dt class="{class}">x:</dt><dd class="{class}">{v}</dd>"#),
            (None, _) => String::new(),
        }
    }

    pub fn work_item(work: &WorkFixture<'_>) -> String {
        format!(
            r#"<li class="work blurb group" role="article"><div class="header module">{}{}</div><ul class="tags commas">{}{}</ul><dl class="stats">{}{}{}</dl></li>"#,
            heading(work.title),
            fandom_block(work.fandoms),
            tags("relationships", work.relationships),
            tags("characters", work.characters),
            dd("words", work.words, false),
            dd("kudos", work.kudos, true),
            dd("hits", work.hits, false),
        )
    }

    pub fn bookmark_item(
        title: Option<&str>,
        words: Option<&str>,
        fandoms: &[&str],
        relationships: &[&str],
    ) -> String {
        format!(
            r#"<li class="bookmark blurb group" role="article"><div class="header module">{}{}</div><ul class="tags commas">{}</ul><dl class="stats">{}</dl></li>"#,
            heading(title),
            fandom_block(fandoms),
            tags("relationships", relationships),
            dd("words", words, false),
        )
    }

    pub fn listing_page(items: &[String]) -> String {
        format!(
            r#"<html><body><div id="main"><ol class="index group">{}</ol></div></body></html>"#,
            items.concat()
        )
    }

    pub fn dashboard_page(links: &[&str]) -> String {
        let items = links
            .iter()
            .map(|text| format!(r#"<li><a href="/x">{text}</a></li>"#))
            .collect::<String>();
        format!(
            r#"<html><body><div id="dashboard" class="region"><ul class="navigation actions">{items}</ul></div></body></html>"#
        )
    }
}
