pub mod cli;
pub mod config;
pub mod crawl;
pub mod error;
pub mod local_index;
pub mod parse;
pub mod profile;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::ScrapeConfig;
pub use error::{Result, StatsError};
pub use runtime::{Scraper, run};
pub use session::{BrowserSessions, ProfileUrls, Session, SessionProvider};
pub use types::{AggregateResult, BookmarkRecord, ProfileCounters, WorkRecord};
