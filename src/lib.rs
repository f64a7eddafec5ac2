pub mod app;

pub use app::{
    AggregateResult, BrowserSessions, ProfileUrls, Result, ScrapeConfig, Scraper, Session,
    SessionProvider, StatsError,
};
