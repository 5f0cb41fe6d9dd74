//! Browser/page capability seam.
//!
//! The archival engine drives one shared, stateful page context that can
//! only be pointed at one URL at a time. Everything it needs from the
//! automation engine is captured by [`PageDriver`]; the production
//! implementation wraps a headless Chromium over CDP, and tests
//! substitute fakes.

use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::page::Page;
use futures_util::StreamExt as _;

/// Narrow view of the browser the archival engine depends on.
///
/// Navigation, waiting, and script execution are blocking from the
/// caller's perspective; there is no overlap between operations.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Point the shared page context at `url` and start loading it.
    async fn navigate(&self, url: &str) -> anyhow::Result<()>;

    /// Wait until an element matching `selector` is present, polling up
    /// to `timeout`. Exceeding the timeout is an error the caller may
    /// treat as recoverable.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> anyhow::Result<()>;

    /// URL the page context is currently pointed at.
    async fn current_url(&self) -> anyhow::Result<String>;

    /// Evaluate a script expression in the page and return its value.
    async fn execute_script(&self, js: &str) -> anyhow::Result<serde_json::Value>;

    /// Render the current page as print output.
    async fn print_to_pdf(&self) -> anyhow::Result<Vec<u8>>;

    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> anyhow::Result<()>;

    /// Type `text` into the first element matching `selector`.
    async fn type_into(&self, selector: &str, text: &str) -> anyhow::Result<()>;

    /// Whether any element matches `selector` right now.
    async fn exists(&self, selector: &str) -> anyhow::Result<bool>;

    /// Full rendered markup of the current document.
    async fn page_markup(&self) -> anyhow::Result<String>;
}

/// Headless-Chromium implementation of [`PageDriver`].
///
/// Owns the browser process and a single page reused for every
/// navigation in a run.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
}

impl ChromiumDriver {
    /// Launch a headless browser and open the single shared page.
    pub async fn launch() -> anyhow::Result<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--headless=new")
            .arg("--incognito")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--mute-audio")
            .arg("--hide-scrollbars")
            .build()
            .map_err(|err| anyhow::anyhow!("build browser config: {err}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("launch headless browser")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(?err, "browser handler event error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("open shared page")?;

        Ok(Self { browser, page })
    }

    /// Close the page and the browser process. Errors are logged, not
    /// propagated; shutdown runs on both success and failure paths.
    pub async fn shutdown(mut self) {
        if let Err(err) = self.page.close().await {
            tracing::warn!(?err, "close shared page");
        }
        if let Err(err) = self.browser.close().await {
            tracing::warn!(?err, "close browser");
        } else {
            tracing::info!("browser shut down");
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigate to {url}"))?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> anyhow::Result<()> {
        let poll = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for `{selector}`"))?;
        Ok(())
    }

    async fn current_url(&self) -> anyhow::Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("read current url")?
            .ok_or_else(|| anyhow::anyhow!("page has no url"))?;
        Ok(url)
    }

    async fn execute_script(&self, js: &str) -> anyhow::Result<serde_json::Value> {
        let result = self.page.evaluate(js).await.context("evaluate script")?;
        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    async fn print_to_pdf(&self) -> anyhow::Result<Vec<u8>> {
        // A4 portrait with background graphics, honoring CSS page sizes.
        let params = PrintToPdfParams {
            landscape: Some(false),
            display_header_footer: Some(false),
            print_background: Some(true),
            prefer_css_page_size: Some(true),
            scale: Some(1.0),
            paper_width: Some(8.27),
            paper_height: Some(11.69),
            ..Default::default()
        };

        let bytes = self.page.pdf(params).await.context("print page to pdf")?;
        Ok(bytes)
    }

    async fn click(&self, selector: &str) -> anyhow::Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("find `{selector}`"))?;
        element
            .click()
            .await
            .with_context(|| format!("click `{selector}`"))?;
        Ok(())
    }

    async fn type_into(&self, selector: &str, text: &str) -> anyhow::Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("find `{selector}`"))?;
        element
            .click()
            .await
            .with_context(|| format!("focus `{selector}`"))?;
        element
            .type_str(text)
            .await
            .with_context(|| format!("type into `{selector}`"))?;
        Ok(())
    }

    async fn exists(&self, selector: &str) -> anyhow::Result<bool> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn page_markup(&self) -> anyhow::Result<String> {
        self.page.content().await.context("read page markup")
    }
}
