//! Chromium-backed browser sessions using chromiumoxide.

use super::{BrowserSession, ElementHandle, SessionFactory};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How often `wait_for_selector` re-queries the page.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Settle time after a scroll so lazy-loaded content can attach.
const SCROLL_SETTLE: Duration = Duration::from_millis(500);

/// User agent presented to scraped sites.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (iPad; CPU OS 12_2 like Mac OS X) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Mobile/15E148";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. CHARTWATCH_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("CHARTWATCH_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.chartwatch/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".chartwatch/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".chartwatch/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".chartwatch/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".chartwatch/chromium/chrome-linux64/chrome"),
                home.join(".chartwatch/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    if let Ok(path) = which::which("google-chrome") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium-browser") {
        return Some(path);
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A launched headless Chromium instance that hands out page sessions.
pub struct ChromiumBrowser {
    browser: Browser,
}

impl ChromiumBrowser {
    /// Launch Chromium with the engine's standard flags.
    pub async fn launch(headless: bool) -> Result<Self> {
        Self::launch_with_user_agent(headless, DEFAULT_USER_AGENT).await
    }

    /// Launch Chromium with a custom user agent.
    pub async fn launch_with_user_agent(headless: bool, user_agent: &str) -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set CHARTWATCH_CHROMIUM_PATH or install Chrome.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-default-apps")
            .arg("--no-default-browser-check")
            .arg("--incognito")
            .arg(format!("--user-agent={user_agent}"));
        if headless {
            builder = builder.arg("--headless=new");
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self { browser })
    }
}

#[async_trait]
impl SessionFactory for ChromiumBrowser {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        Ok(Box::new(ChromiumSession { page }))
    }
}

/// A single Chromium page.
pub struct ChromiumSession {
    page: Page,
}

impl ChromiumSession {
    /// Re-resolve a positional handle against the live DOM.
    async fn resolve(&self, handle: &ElementHandle) -> Result<Element> {
        let mut hops = handle.path.iter();
        let (first_selector, first_index) = hops.next().context("empty element handle")?;

        let mut element = self
            .page
            .find_elements(first_selector.as_str())
            .await
            .with_context(|| format!("query failed: {first_selector}"))?
            .into_iter()
            .nth(*first_index)
            .with_context(|| format!("stale element handle: {first_selector}[{first_index}]"))?;

        for (selector, index) in hops {
            element = element
                .find_elements(selector.as_str())
                .await
                .with_context(|| format!("query failed: {selector}"))?
                .into_iter()
                .nth(*index)
                .with_context(|| format!("stale element handle: {selector}[{index}]"))?;
        }
        Ok(element)
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()> {
        let result = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout_ms: u64) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Ok(elements) = self.page.find_elements(selector).await {
                if !elements.is_empty() {
                    return Ok(true);
                }
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
        let count = self
            .page
            .find_elements(selector)
            .await
            .with_context(|| format!("query failed: {selector}"))?
            .len();
        Ok((0..count).map(|i| ElementHandle::root(selector, i)).collect())
    }

    async fn query_within(
        &mut self,
        root: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>> {
        let parent = self.resolve(root).await?;
        let count = parent
            .find_elements(selector)
            .await
            .with_context(|| format!("query failed: {selector}"))?
            .len();
        Ok((0..count).map(|i| root.child(selector, i)).collect())
    }

    async fn element_text(&mut self, handle: &ElementHandle) -> Result<String> {
        let element = self.resolve(handle).await?;
        let text = element
            .inner_text()
            .await
            .context("failed to read element text")?;
        Ok(text.unwrap_or_default())
    }

    async fn element_attribute(
        &mut self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>> {
        let element = self.resolve(handle).await?;
        element
            .attribute(name)
            .await
            .with_context(|| format!("failed to read attribute: {name}"))
    }

    async fn scroll(&mut self) -> Result<()> {
        self.page
            .evaluate("window.scrollBy(0, window.innerHeight)")
            .await
            .context("scroll failed")?;
        tokio::time::sleep(SCROLL_SETTLE).await;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.page
            .save_screenshot(params, path)
            .await
            .with_context(|| format!("failed to save screenshot: {}", path.display()))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_query_and_read() {
        let browser = ChromiumBrowser::launch(true)
            .await
            .expect("failed to launch browser");
        let mut session = browser
            .new_session()
            .await
            .expect("failed to create session");

        session
            .navigate(
                "data:text/html,<ul><li><a href='/a'>Alpha</a></li><li><a href='/b'>Beta</a></li></ul>",
                10_000,
            )
            .await
            .expect("navigation failed");

        assert!(session.wait_for_selector("li", 5_000).await.unwrap());

        let items = session.query_all("li").await.unwrap();
        assert_eq!(items.len(), 2);

        let links = session.query_within(&items[1], "a").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(session.element_text(&links[0]).await.unwrap(), "Beta");
        assert_eq!(
            session
                .element_attribute(&links[0], "href")
                .await
                .unwrap()
                .as_deref(),
            Some("/b")
        );

        session.close().await.expect("close failed");
    }
}
