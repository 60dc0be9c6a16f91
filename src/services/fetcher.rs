//! Headless browser page loading with block-page detection.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use regex::Regex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::services::extractor::Document;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const VIEWPORT_WIDTH: u32 = 1920;
const VIEWPORT_HEIGHT: u32 = 1080;
const HEADING_POLL: Duration = Duration::from_millis(250);
const BODY_PREFIX_CHARS: usize = 1000;

/// Phrases that identify a throttling or block page instead of product content,
/// each matched as whole words.
const BLOCK_PHRASES: [(&str, &str); 5] = [
    ("too many requests", r"\btoo\s+many\s+requests\b"),
    ("blocked", r"\bblocked\b"),
    ("access denied", r"\baccess\s+denied\b"),
    ("rate limit", r"\brate[\s-]+limit(?:ed|ing)?\b"),
    ("please try again later", r"\bplease\s+try\s+again\s+later\b"),
];

/// Reported when the bare status code is the only block marker.
const STATUS_PHRASE: &str = "429";

static BLOCK_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    BLOCK_PHRASES
        .iter()
        .map(|(phrase, pattern)| {
            let regex = Regex::new(&format!("(?i){}", pattern)).expect("valid block phrase regex");
            (*phrase, regex)
        })
        .collect()
});

/// A standalone 429, not part of a count like "1,429" or a rating like "4.29".
static STATUS_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\d.,])429(?:$|[^\d.,])").expect("valid status code regex"));

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    pub title: Option<String>,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub headless: bool,
    pub chrome_executable: Option<String>,
    pub render_timeout: Duration,
    pub navigation_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            render_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(60),
        }
    }
}

/// Launches a fresh Chromium for every page so no state leaks between fetches.
pub struct ChromiumFetcher {
    config: FetcherConfig,
}

impl ChromiumFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>), FetchError> {
        let mut builder = BrowserConfig::builder()
            .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
            .viewport(Viewport {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
                ..Default::default()
            })
            .request_timeout(self.config.navigation_timeout)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", USER_AGENT));

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder.build().map_err(FetchError::Launch)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::Launch(e.to_string()))?;

        let handle = tokio::spawn(async move { while handler.next().await.is_some() {} });
        Ok((browser, handle))
    }

    async fn load(&self, page: &Page, url: &str) -> Result<FetchedPage, FetchError> {
        page.set_user_agent(SetUserAgentOverrideParams::new(USER_AGENT))
            .await?;
        let headers = Headers::new(serde_json::json!({
            "Accept-Language": "en-US,en;q=0.9,es;q=0.8",
            "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            "Upgrade-Insecure-Requests": "1",
        }));
        page.execute(SetExtraHttpHeadersParams::new(headers)).await?;

        timeout(self.config.navigation_timeout, page.goto(url))
            .await
            .map_err(|_| FetchError::Timeout {
                stage: "navigation",
                after: self.config.navigation_timeout,
            })?
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        let rendered = timeout(self.config.render_timeout, wait_for_heading(page))
            .await
            .is_ok();

        let html = page.content().await?;
        let title = page.get_title().await.ok().flatten();

        if let Some(phrase) = detect_block(&html, url) {
            return Err(FetchError::RateLimited(phrase.to_string()));
        }
        if !rendered {
            return Err(FetchError::Timeout {
                stage: "render",
                after: self.config.render_timeout,
            });
        }

        Ok(FetchedPage {
            url: url.to_string(),
            html,
            title,
        })
    }
}

#[async_trait]
impl PageFetcher for ChromiumFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let started = std::time::Instant::now();
        let (mut browser, handler) = self.launch().await?;

        let result = match browser.new_page("about:blank").await {
            Ok(page) => {
                let outcome = self.load(&page, url).await;
                if let Err(e) = page.close().await {
                    debug!(url, error = %e, "Page close error");
                }
                outcome
            }
            Err(e) => Err(FetchError::from(e)),
        };

        if let Err(e) = browser.close().await {
            warn!(url, error = %e, "Browser close error");
        }
        if let Err(e) = browser.wait().await {
            debug!(url, error = %e, "Browser process wait error");
        }
        handler.abort();

        match &result {
            Ok(page) => info!(
                url,
                bytes = page.html.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Page fetched"
            ),
            Err(e) => warn!(
                url,
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Page fetch failed"
            ),
        }

        result
    }
}

async fn wait_for_heading(page: &Page) {
    loop {
        if page.find_element("h1").await.is_ok() {
            return;
        }
        tokio::time::sleep(HEADING_POLL).await;
    }
}

/// The block phrase in `text`, matched as whole words.
pub fn block_phrase(text: &str) -> Option<&'static str> {
    BLOCK_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(phrase, _)| *phrase)
}

/// Block marker in a title or heading, where a bare status code also counts.
pub fn headline_block(text: &str) -> Option<&'static str> {
    block_phrase(text).or_else(|| STATUS_CODE.is_match(text).then_some(STATUS_PHRASE))
}

/// The block marker found in the page title, main heading or start of the body.
pub fn detect_block(html: &str, url: &str) -> Option<&'static str> {
    let doc = Document::parse(html, url);
    let title = doc
        .select("title")
        .first()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();
    let body_prefix: String = doc.text().chars().take(BODY_PREFIX_CHARS).collect();

    let found = [title.as_str(), doc.heading()]
        .into_iter()
        .find_map(headline_block)
        .or_else(|| block_phrase(&body_prefix));
    found
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Rate limited by source site (matched \"{0}\")")]
    RateLimited(String),

    #[error("Timed out after {after:?} during {stage}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Browser error: {0}")]
    Browser(#[from] CdpError),
}
