use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://archiveofourown.org";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Attempts for the dashboard and profile pages.
pub const PROFILE_ATTEMPTS: u32 = 3;

/// Upper bound on a server-provided `Retry-After`.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

const MAX_PARALLEL_REQUESTS: usize = 16;
const LOSS_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_pages: u32,
    pub parallel_requests: usize,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub acceptable_loss: f64,
    pub page_size: u32,
    pub cooldown: Duration,
    pub retry_gap: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(20),
            max_pages: 50,
            parallel_requests: 3,
            retry_delay: Duration::from_secs(2),
            max_retries: 2,
            acceptable_loss: 0.10,
            page_size: 20,
            cooldown: Duration::from_secs(3),
            retry_gap: Duration::from_secs(1),
        }
    }
}

/// How many pages a listing needs and how many of them may go missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    pub total_pages: u32,
    pub max_acceptable_failures: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Linear backoff used for 503 challenges: `delay × (attempt + 1)`.
    pub fn challenge_delay(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt.saturating_add(1))
    }
}

impl ScrapeConfig {
    /// Clamp user-provided values into a usable range.
    pub fn sanitized(mut self) -> Self {
        self.parallel_requests = sanitize_parallel_requests(self.parallel_requests);
        self.max_retries = self.max_retries.max(1);
        self.page_size = self.page_size.max(1);
        self.acceptable_loss = if self.acceptable_loss.is_finite() {
            self.acceptable_loss.clamp(0.0, 0.99)
        } else {
            0.0
        };
        self
    }

    pub fn plan(&self, total_items: u64) -> PagePlan {
        let pages = total_items.div_ceil(u64::from(self.page_size.max(1)));
        let total_pages = pages.min(u64::from(self.max_pages)) as u32;
        PagePlan {
            total_pages,
            max_acceptable_failures: self.max_acceptable_failures(total_pages),
        }
    }

    pub fn max_acceptable_failures(&self, total_pages: u32) -> usize {
        // 30 × 0.1 is 3.0000000000000004 in binary floating point.
        let raw = f64::from(total_pages) * self.acceptable_loss - LOSS_EPSILON;
        raw.ceil().max(0.0) as usize
    }

    pub fn coverage_is_degraded(&self, ratio: f64) -> bool {
        ratio + LOSS_EPSILON < 1.0 - self.acceptable_loss
    }

    pub fn page_retry(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.max_retries.max(1),
            retry_delay: self.retry_delay,
        }
    }

    pub fn profile_retry(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: PROFILE_ATTEMPTS,
            retry_delay: self.retry_delay,
        }
    }
}

fn sanitize_parallel_requests(value: usize) -> usize {
    value.clamp(1, MAX_PARALLEL_REQUESTS)
}
