use bytes::Bytes;
use reqwest::{header, Client as ReqwestClient, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::{lookup_encoding, CrawlerConfig, CrawlerError, Result};

const FALLBACK_USER_AGENT: &str = "Mozilla/5.0";

/// A single outgoing GET, fully resolved by the [`FetchContext`].
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub user_agent: String,
    pub referer: String,
    pub cookie: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TextResponse {
    pub status: StatusCode,
    /// Body decoded with the requested encoding. Only populated for `200 OK`.
    pub body: String,
}

/// The network seam under the fetcher. Errors mean the request never
/// produced a status line (connect failure, timeout, broken body).
pub trait Transport: Send + Sync {
    fn get_text(
        &self,
        request: FetchRequest,
        encoding: &str,
    ) -> impl Future<Output = Result<TextResponse>> + Send;

    fn get_bytes(&self, request: FetchRequest) -> impl Future<Output = Result<Bytes>> + Send;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client })
    }

    fn build(&self, request: &FetchRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .get(request.url.as_str())
            .timeout(request.timeout)
            .header(header::USER_AGENT, &request.user_agent)
            .header(header::REFERER, &request.referer);

        if let Some(cookie) = &request.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        builder
    }
}

impl Transport for ReqwestTransport {
    async fn get_text(&self, request: FetchRequest, encoding: &str) -> Result<TextResponse> {
        let response = self.build(&request).send().await?;
        let status = response.status();

        let body = if status == StatusCode::OK {
            let bytes = response.bytes().await?;
            decode_body(&bytes, encoding)?
        } else {
            String::new()
        };

        Ok(TextResponse { status, body })
    }

    async fn get_bytes(&self, request: FetchRequest) -> Result<Bytes> {
        let response = self.build(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?)
    }
}

/// Decodes with `label` regardless of any charset in `Content-Type`.
fn decode_body(bytes: &[u8], label: &str) -> Result<String> {
    let encoding = lookup_encoding(label)?;
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        debug!("Body is not valid {}, replaced malformed sequences", encoding.name());
    }
    Ok(text.into_owned())
}

/// Session state shared by every fetch of a crawl: identity pool, cookies,
/// retry policy and the underlying transport.
#[derive(Debug)]
pub struct FetchContext<T = ReqwestTransport> {
    transport: T,
    config: Arc<CrawlerConfig>,
    cookie_header: Option<String>,
}

impl FetchContext<ReqwestTransport> {
    pub fn new(config: Arc<CrawlerConfig>) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> FetchContext<T> {
    pub fn with_transport(config: Arc<CrawlerConfig>, transport: T) -> Self {
        let cookie_header = config.cookie_header();
        Self {
            transport,
            config,
            cookie_header,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches a page as text. `None` covers both a definitive 404 and an
    /// exhausted retry budget.
    pub async fn fetch(&self, url: &Url) -> Option<String> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let request = self.request(url, self.cookie_header.clone(), self.config.timeout);

            match self.transport.get_text(request, &self.config.encoding).await {
                Ok(response) if response.status == StatusCode::NOT_FOUND => {
                    debug!("{} returned 404, not retrying", url);
                    return None;
                }
                Ok(response) if response.status == StatusCode::OK => {
                    debug!("Fetched {} ({} chars)", url, response.body.len());
                    return Some(response.body);
                }
                Ok(response) => {
                    debug!(
                        "Unexpected status {} from {} (attempt {}/{})",
                        response.status, url, attempt, max_attempts
                    );
                }
                Err(e) => {
                    warn!(
                        "Request to {} failed (attempt {}/{}): {}",
                        url, attempt, max_attempts, e
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        warn!("Giving up on {} after {} attempts", url, max_attempts);
        None
    }

    /// Single attempt without session cookies, used for the lyric API.
    pub async fn fetch_api_text(&self, url: &Url) -> Result<String> {
        let request = self.request(url, None, self.config.lyric_timeout);
        let response = self.transport.get_text(request, "utf-8").await?;

        if response.status != StatusCode::OK {
            return Err(CrawlerError::Status(response.status.as_u16()));
        }
        Ok(response.body)
    }

    /// Single attempt binary download, used for images.
    pub async fn fetch_bytes(&self, url: &Url) -> Result<Bytes> {
        let request = self.request(url, None, self.config.image_timeout);
        self.transport.get_bytes(request).await
    }

    fn request(&self, url: &Url, cookie: Option<String>, timeout: Duration) -> FetchRequest {
        FetchRequest {
            url: url.clone(),
            user_agent: self.random_user_agent().to_string(),
            referer: self.config.referer.clone(),
            cookie,
            timeout,
        }
    }

    fn random_user_agent(&self) -> &str {
        let pool = &self.config.user_agents;
        if pool.is_empty() {
            return FALLBACK_USER_AGENT;
        }
        &pool[fastrand::usize(..pool.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        seen: Mutex<Vec<FetchRequest>>,
    }

    impl Transport for RecordingTransport {
        async fn get_text(&self, request: FetchRequest, _encoding: &str) -> Result<TextResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(TextResponse {
                status: StatusCode::OK,
                body: "ok".to_string(),
            })
        }

        async fn get_bytes(&self, request: FetchRequest) -> Result<Bytes> {
            self.seen.lock().unwrap().push(request);
            Ok(Bytes::from_static(b"img"))
        }
    }

    #[tokio::test]
    async fn test_page_fetch_carries_identity_and_cookies() {
        let config = CrawlerConfig::default().with_cookie("MUSIC_U", "token");
        let ctx = FetchContext::with_transport(Arc::new(config), RecordingTransport::default());
        let url = Url::parse("https://music.163.com/song?id=1").unwrap();

        assert_eq!(ctx.fetch(&url).await.as_deref(), Some("ok"));
        ctx.fetch_api_text(&url).await.unwrap();
        ctx.fetch_bytes(&url).await.unwrap();

        let seen = ctx.transport().seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].cookie.as_deref(), Some("MUSIC_U=token"));
        assert_eq!(seen[0].referer, "https://music.163.com/");
        assert!(seen[1].cookie.is_none());
        assert!(seen[2].cookie.is_none());
        assert_eq!(seen[1].timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_decode_body_uses_requested_encoding() {
        let gbk = [0xD6, 0xD0, 0xCE, 0xC4];
        assert_eq!(decode_body(&gbk, "gbk").unwrap(), "中文");
        assert_eq!(decode_body("周杰伦".as_bytes(), "utf-8").unwrap(), "周杰伦");
        assert!(decode_body(b"x", "no-such-charset").is_err());
    }

    #[tokio::test]
    async fn test_user_agent_drawn_from_pool() {
        let config = Arc::new(CrawlerConfig::default());
        let pool: HashSet<String> = config.user_agents.iter().cloned().collect();
        let ctx = FetchContext::with_transport(config, RecordingTransport::default());
        let url = Url::parse("https://music.163.com/").unwrap();

        for _ in 0..20 {
            ctx.fetch(&url).await;
        }

        let seen = ctx.transport().seen.lock().unwrap();
        assert!(seen.iter().all(|r| pool.contains(&r.user_agent)));
    }
}
