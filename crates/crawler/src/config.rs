use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{CrawlerError, Result};

pub const DEFAULT_BASE_URL: &str = "https://music.163.com";
pub const DEFAULT_REFERER: &str = "https://music.163.com/";

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Client identity and fetch behaviour shared by every request of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub base_url: String,
    pub user_agents: Vec<String>,
    pub referer: String,
    /// Session cookies sent with page fetches, in order.
    pub cookies: Vec<(String, String)>,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub timeout: Duration,
    pub lyric_timeout: Duration,
    pub image_timeout: Duration,
    /// Encoding label every page body is decoded with, whatever the
    /// response headers declare.
    pub encoding: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            referer: DEFAULT_REFERER.to_string(),
            cookies: Vec::new(),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
            lyric_timeout: Duration::from_secs(5),
            image_timeout: Duration::from_secs(10),
            encoding: "utf-8".to_string(),
        }
    }
}

impl CrawlerConfig {
    /// Defaults overlaid with `SPIDER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("SPIDER_BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(cookies) = std::env::var("SPIDER_COOKIES") {
            config.cookies = parse_cookie_pairs(&cookies);
        }

        if let Ok(attempts) = std::env::var("SPIDER_MAX_ATTEMPTS") {
            config.max_attempts = attempts
                .parse()
                .map_err(|_| CrawlerError::Config(format!("SPIDER_MAX_ATTEMPTS: {}", attempts)))?;
        }

        if let Ok(encoding) = std::env::var("SPIDER_ENCODING") {
            config.encoding = encoding;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CrawlerError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.user_agents.is_empty() {
            return Err(CrawlerError::Config("user agent pool is empty".to_string()));
        }
        lookup_encoding(&self.encoding)?;
        Ok(())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Renders the session cookies as a `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Resolves a WHATWG encoding label such as `utf-8` or `gbk`.
pub fn lookup_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| CrawlerError::Config(format!("unknown encoding: {}", label)))
}

/// Parses `name=value; name=value` into ordered pairs, skipping malformed parts.
pub fn parse_cookie_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|part| {
            let (name, value) = part.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Halts the crawl once both counters are strictly above their thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopCondition {
    pub artist_threshold: usize,
    pub song_threshold: usize,
}

impl Default for StopCondition {
    fn default() -> Self {
        Self {
            artist_threshold: 100,
            song_threshold: 2000,
        }
    }
}

impl StopCondition {
    pub fn is_met(&self, artists: usize, songs: usize) -> bool {
        artists > self.artist_threshold && songs > self.song_threshold
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOptions {
    pub category_ids: Vec<u32>,
    pub category_delay: Duration,
    pub song_cap: usize,
    pub stop: StopCondition,
    pub output_dir: PathBuf,
    pub download_images: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            category_ids: vec![1001, 1002, 1003, 2001, 2002, 2003, 6001, 6002, 6003],
            category_delay: Duration::from_millis(200),
            song_cap: 30,
            stop: StopCondition::default(),
            output_dir: PathBuf::from("output"),
            download_images: true,
        }
    }
}

impl CrawlOptions {
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_categories(mut self, category_ids: Vec<u32>) -> Self {
        self.category_ids = category_ids;
        self
    }

    pub fn with_stop(mut self, artist_threshold: usize, song_threshold: usize) -> Self {
        self.stop = StopCondition {
            artist_threshold,
            song_threshold,
        };
        self
    }

    pub fn with_category_delay(mut self, delay: Duration) -> Self {
        self.category_delay = delay;
        self
    }

    pub fn without_images(mut self) -> Self {
        self.download_images = false;
        self
    }
}
