//! Page fetching with an ordered chain of strategies.
//!
//! `HttpFetcher` is a cookie-keeping reqwest session that retries transient
//! failures. `BrowserFetcher` shells out to a headless browser for sites that
//! block plain HTTP clients. `FetchChain` tries each in order and returns the
//! first page that comes back.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::sleep;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const RETRY_STATUSES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(header::REFERER, header::HeaderValue::from_static("https://codeforces.com/"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, header::HeaderValue::from_static("1"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, max_retries: 3, backoff: Duration::from_millis(600) })
    }

    /// Visit a page once to pick up session cookies. Failures are ignored.
    pub async fn warm_up(&self, url: &str) {
        if let Err(e) = self.client.get(url).send().await {
            tracing::debug!(url, error = %e, "warm-up request failed");
        }
    }

    /// Delay before retry number `attempt` (1-based).
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.pow(attempt.saturating_sub(1))
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            let outcome = self.client.get(url).send().await;
            let retryable = match &outcome {
                Ok(resp) => RETRY_STATUSES.contains(&resp.status()),
                Err(e) => e.is_timeout() || e.is_connect(),
            };
            if retryable && attempt < self.max_retries {
                attempt += 1;
                let delay = self.backoff_for(attempt);
                tracing::debug!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying fetch");
                sleep(delay).await;
                continue;
            }
            let resp = outcome?.error_for_status()?;
            return Ok(resp.text().await?);
        }
    }
}

#[async_trait]
impl FetchStrategy for HttpFetcher {
    fn name(&self) -> &'static str { "http" }

    async fn fetch(&self, url: &str) -> Result<String> {
        self.get_text(url).await
    }
}

/// Runs `<program> <args...> <url>` and returns its stdout as the page HTML,
/// e.g. `chromium --headless --dump-dom`.
pub struct BrowserFetcher {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl BrowserFetcher {
    pub fn from_command_line(cmd: &str, timeout: Duration) -> Result<Self> {
        let mut parts = cmd.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| anyhow!("empty browser command"))?;
        Ok(Self { program, args: parts.collect(), timeout })
    }
}

#[async_trait]
impl FetchStrategy for BrowserFetcher {
    fn name(&self) -> &'static str { "browser" }

    async fn fetch(&self, url: &str) -> Result<String> {
        let run = Command::new(&self.program).args(&self.args).arg(url).kill_on_drop(true).output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| anyhow!("browser timed out after {:?}", self.timeout))?
            .with_context(|| format!("running {}", self.program))?;
        if !output.status.success() {
            bail!("browser exited with {}", output.status);
        }
        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            bail!("browser returned an empty page");
        }
        Ok(html)
    }
}

#[derive(Default)]
pub struct FetchChain {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl FetchChain {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, strategy: impl FetchStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// First successful page, trying at most `limit` strategies in order.
    pub async fn fetch_with(&self, url: &str, limit: usize) -> Option<String> {
        for strategy in self.strategies.iter().take(limit) {
            match strategy.fetch(url).await {
                Ok(html) => {
                    tracing::debug!(url, strategy = strategy.name(), "fetched");
                    return Some(html);
                }
                Err(e) => tracing::warn!(url, strategy = strategy.name(), error = %e, "fetch failed"),
            }
        }
        None
    }

    pub async fn fetch(&self, url: &str) -> Option<String> {
        self.fetch_with(url, self.strategies.len()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Canned {
        name: &'static str,
        page: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FetchStrategy for Canned {
        fn name(&self) -> &'static str { self.name }
        async fn fetch(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.page.map(str::to_string).ok_or_else(|| anyhow!("blocked"))
        }
    }

    fn canned(name: &'static str, page: Option<&'static str>) -> (Canned, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Canned { name, page, calls: calls.clone() }, calls)
    }

    #[tokio::test]
    async fn falls_back_in_order() {
        let (first, first_calls) = canned("http", None);
        let (second, second_calls) = canned("browser", Some("<html>ok</html>"));
        let chain = FetchChain::new().with(first).with(second);
        assert_eq!(chain.fetch("https://x").await.as_deref(), Some("<html>ok</html>"));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn limit_skips_later_strategies() {
        let (first, _) = canned("http", None);
        let (second, second_calls) = canned("browser", Some("page"));
        let chain = FetchChain::new().with(first).with(second);
        assert!(chain.fetch_with("https://x", 1).await.is_none());
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn backoff_doubles() {
        let f = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        assert_eq!(f.backoff_for(1), Duration::from_millis(600));
        assert_eq!(f.backoff_for(3), Duration::from_millis(2400));
    }

    #[test]
    fn browser_command_is_split() {
        let b = BrowserFetcher::from_command_line("chromium --headless --dump-dom", Duration::from_secs(30)).unwrap();
        assert_eq!(b.program, "chromium");
        assert_eq!(b.args, vec!["--headless", "--dump-dom"]);
        assert!(BrowserFetcher::from_command_line("  ", Duration::from_secs(1)).is_err());
    }
}
