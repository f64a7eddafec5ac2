use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use super::config::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT, ScrapeConfig};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "ao3-stats",
    version,
    about = "Activity statistics for a public archive profile, printed as JSON"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pretty-print the JSON result.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Dashboard counters and joined date only.
    Quick {
        #[arg(value_name = "USERNAME")]
        username: String,

        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Counters plus paginated works and bookmarks.
    Full {
        #[arg(value_name = "USERNAME")]
        username: String,

        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Look a user up in a pre-built local index.
    Index {
        #[arg(value_name = "USERNAME")]
        username: String,

        #[arg(long, value_name = "DIR", env = "AO3_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,
    },
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    #[arg(long, value_name = "URL", env = "AO3_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, value_name = "UA", env = "AO3_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[arg(long, value_name = "SECS", env = "AO3_TIMEOUT_SECS", default_value_t = 20)]
    pub timeout_secs: u64,

    #[arg(long, value_name = "N", env = "AO3_MAX_PAGES", default_value_t = 50)]
    pub max_pages: u32,

    #[arg(long, value_name = "N", env = "AO3_PARALLEL_REQUESTS", default_value_t = 3)]
    pub parallel_requests: usize,

    #[arg(long, value_name = "MS", env = "AO3_RETRY_DELAY_MS", default_value_t = 2000)]
    pub retry_delay_ms: u64,

    #[arg(long, value_name = "N", env = "AO3_MAX_RETRIES", default_value_t = 2)]
    pub max_retries: u32,

    #[arg(long, value_name = "RATIO", env = "AO3_ACCEPTABLE_LOSS", default_value_t = 0.10)]
    pub acceptable_loss: f64,

    #[arg(long, value_name = "N", env = "AO3_PAGE_SIZE", default_value_t = 20)]
    pub page_size: u32,

    #[arg(long, value_name = "MS", env = "AO3_COOLDOWN_MS", default_value_t = 3000)]
    pub cooldown_ms: u64,

    #[arg(long, value_name = "MS", env = "AO3_RETRY_GAP_MS", default_value_t = 1000)]
    pub retry_gap_ms: u64,
}

impl From<&FetchArgs> for ScrapeConfig {
    fn from(args: &FetchArgs) -> Self {
        ScrapeConfig {
            base_url: args.base_url.clone(),
            user_agent: args.user_agent.clone(),
            timeout: Duration::from_secs(args.timeout_secs.max(1)),
            max_pages: args.max_pages,
            parallel_requests: args.parallel_requests,
            retry_delay: Duration::from_millis(args.retry_delay_ms),
            max_retries: args.max_retries,
            acceptable_loss: args.acceptable_loss,
            page_size: args.page_size,
            cooldown: Duration::from_millis(args.cooldown_ms),
            retry_gap: Duration::from_millis(args.retry_gap_ms),
        }
        .sanitized()
    }
}
